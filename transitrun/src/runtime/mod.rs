mod generator;
mod loader;
mod processor;
mod run_time_error;
pub mod run_time_filter;
mod speed_calculator;
mod state;

pub use generator::{PreviousAssignment, RunTimeGenerator, TripHistorySource, VehicleState};
pub use loader::{LoaderSummary, RunTimeLoader};
pub use processor::{RunTimeExit, RunTimeProcessor, RunTimeProcessorResult};
pub use run_time_error::RunTimeError;
pub use speed_calculator::SpeedCalculator;
pub use state::{Phase, RunTimeState};
