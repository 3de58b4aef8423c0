use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Config(ConfigError),
    #[error("rsnapshot is configured to use sync_first; this is not supported")]
    UnsupportedSyncFirst,
    #[error("sync is not supported as command")]
    UnsupportedSync,
    #[error("no valid snapshot_root entry in {0}")]
    MissingSnapshotRoot(PathBuf),
    #[error("process {0} still running")]
    ActiveOtherInstance(u32),
    #[error("refusing to delete {path}: {reason}")]
    RotationSafetyViolation { path: PathBuf, reason: String },
    #[error("could not rename {from} to {to}: target already exists")]
    RotationCollision { from: PathBuf, to: PathBuf },
    #[error("computer uptime is {minutes} minutes, need at least {required}")]
    UptimeTooLow { minutes: i64, required: i64 },
    #[error("computer wakeup time is {minutes} minutes, need at least {required}")]
    ResumeTooRecent { minutes: i64, required: i64 },
    #[error("invalid interval {0} for hourly; must be between 2 and 24")]
    InvalidHourlyInterval(u32),
    #[error("rsnapshot reported an error in its configuration")]
    ConfigurationError,
    #[error("rsnapshot exited with fatal error code {0}")]
    FatalRunError(i32),
    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(String),
    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    pub fn message(msg: impl Into<String>) -> Self {
        GuardError::Message(msg.into())
    }

    /// The machine is not settled yet; the job may run on a later invocation.
    pub fn is_deferral(&self) -> bool {
        matches!(
            self,
            GuardError::UptimeTooLow { .. } | GuardError::ResumeTooRecent { .. }
        )
    }
}

impl From<ConfigError> for GuardError {
    fn from(err: ConfigError) -> Self {
        GuardError::Config(err)
    }
}
