pub mod model;
pub mod stats;
pub mod util;
