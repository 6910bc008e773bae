pub mod numeric_deserialization_ops;
pub mod speed_ops;
pub mod time_ops;
