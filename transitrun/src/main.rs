use clap::Parser;
use transitrun::app::{AppError, RunTimeApp};

fn main() -> Result<(), AppError> {
    env_logger::init();
    let args = RunTimeApp::parse();
    args.op.run()
}
