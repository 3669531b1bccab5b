use clap::Parser;
use pipewright::cli::{self, Args};
use pipewright::core::{AppError, DefaultErrorReporter, ErrorReporter};
use pipewright::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match logging::init(&args) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: logging disabled: {:#}", err);
            None
        }
    };

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let reporter = DefaultErrorReporter::new();
            match err.downcast::<AppError>() {
                Ok(app_error) => reporter.report_error(&app_error),
                Err(other) => reporter.report_error(&AppError::from(other)),
            }
            ExitCode::FAILURE
        }
    }
}
