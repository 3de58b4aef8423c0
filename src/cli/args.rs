use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load::DEFAULT_RSNAPSHOT_CONFIG;
use crate::types::{Job, DEFAULT_HOURLY_INTERVALS};

#[derive(Parser, Debug)]
#[command(
    name = "rsnapshot-once",
    version,
    about = "Run an rsnapshot interval at most once per dwell period and roll back interrupted runs"
)]
pub struct Cli {
    /// rsnapshot config file, passed through to rsnapshot
    #[arg(short = 'c', long = "config", value_name = "CFGFILE", default_value = DEFAULT_RSNAPSHOT_CONFIG)]
    pub config: PathBuf,

    /// Guard settings (YAML)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[arg(long, short = 'v')]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Not supported; always rejected
    Sync,
    Hourly {
        /// Hourly runs per day (2-24)
        #[arg(value_name = "N")]
        per_day: Option<u32>,
    },
    Daily,
    Weekly,
    Monthly,
}

impl Command {
    pub fn job(self) -> Job {
        match self {
            Command::Sync => Job::Sync,
            Command::Hourly { per_day } => Job::Hourly {
                per_day: per_day.unwrap_or(DEFAULT_HOURLY_INTERVALS),
            },
            Command::Daily => Job::Daily,
            Command::Weekly => Job::Weekly,
            Command::Monthly => Job::Monthly,
        }
    }
}
