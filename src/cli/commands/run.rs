use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::backup::rsnapshot::Rsnapshot;
use crate::backup::{run_backup, RunContext};
use crate::cli::args::Cli;
use crate::config::load::{build_config, load_guard_settings, load_rsnapshot_config};
use crate::logging::LogSink;
use crate::system::LinuxHost;
use crate::types::Outcome;

pub fn run_job_command(cli: &Cli, sink: &LogSink) -> Result<Outcome> {
    let settings = load_guard_settings(cli.settings.as_deref()).context("load guard settings")?;

    info!("Configpath: {}", cli.config.display());
    let rsnapshot = load_rsnapshot_config(&cli.config)
        .with_context(|| format!("load rsnapshot config {}", cli.config.display()))?;
    match rsnapshot.logfile.as_deref() {
        Some(path) => {
            if let Err(err) = sink.attach(path) {
                warn!("cannot open logfile {}: {}", path.display(), err);
            }
        }
        None => warn!("No logfile entry in settings file. Is this intended?"),
    }

    let config = build_config(&cli.config, rsnapshot, settings)?;
    info!("## STARTING BACKUP ######################");

    let host = LinuxHost;
    let tool = Rsnapshot::from_config(&config);
    let ctx = RunContext {
        processes: &host,
        system: &host,
        tool: &tool,
    };
    Ok(run_backup(&config, cli.command.job(), &ctx)?)
}
