use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use crate::cli::args::Cli;
use crate::cli::commands::{exit_code_for, run::run_job_command, EXIT_OK};
use crate::error::GuardError;
use crate::logging;
use crate::types::Outcome;
use crate::util::time::describe_duration;

pub mod args;
pub mod commands;

/// Parses the command line, runs the guarded job and maps the result to an exit status.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let sink = logging::init(cli.verbose);

    match run_job_command(&cli, &sink) {
        Ok(outcome) => {
            report_outcome(&outcome);
            ExitCode::from(EXIT_OK)
        }
        Err(err) => {
            let deferred = err
                .downcast_ref::<GuardError>()
                .map(GuardError::is_deferral)
                .unwrap_or(false);
            if deferred {
                warn!("{:#}. EXITING.", err);
            } else {
                error!("{:#}", err);
            }
            info!("## BACKUP ABORTED #######################");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn report_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Completed => info!("## BACKUP COMPLETE ######################"),
        Outcome::CompletedWithWarnings => {
            warn!("## BACKUP COMPLETE (WITH WARNINGS) ######")
        }
        Outcome::NotDue {
            elapsed, threshold, ..
        } => info!(
            "Last run is only {} ago (min. is {}). Nothing to do.",
            describe_duration(*elapsed),
            describe_duration(*threshold)
        ),
    }
}
