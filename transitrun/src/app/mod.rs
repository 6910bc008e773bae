mod app_error;
pub mod input_ops;
pub mod output_ops;
mod run_time_app;

pub use app_error::AppError;
pub use run_time_app::{RunTimeApp, RunTimeOperation};
