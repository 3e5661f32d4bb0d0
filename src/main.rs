//! Command-line entry point for the GloPM registry client

use glopm::cli::{Args, Runner};
use glopm::concurrency::CancelFlag;
use glopm::error::RegistryError;
use glopm::logging::Logger;
use std::process::ExitCode;

/// First Ctrl-C stops new batch items from starting; a second one aborts.
async fn wait_for_abort(cancel: CancelFlag, output: Logger) {
    if tokio::signal::ctrl_c().await.is_err() {
        return std::future::pending().await;
    }
    cancel.cancel();
    output.warning("Interrupted: no new work will be started. Press Ctrl-C again to abort.");

    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_args();
    let output = args.session_options().logger();
    let cancel = CancelFlag::new();

    let run = Runner::new(args).with_cancel(cancel.clone()).run();
    // Dropping the command future mid-download removes its partial file.
    let result = tokio::select! {
        result = run => result,
        _ = wait_for_abort(cancel, output.clone()) => Err(RegistryError::Cancelled),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(RegistryError::Cancelled) => {
            output.error("Aborted");
            ExitCode::from(130)
        }
        Err(e) => {
            output.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
