use std::path::PathBuf;

use chrono::Duration;
use serde::Deserialize;

pub const DEFAULT_RSNAPSHOT_BINARY: &str = "/usr/local/bin/rsnapshot";
pub const DEFAULT_ERROR_MARKER: &str = "rsnapshot encountered an error";
pub const DEFAULT_MIN_UPTIME_MINUTES: i64 = 15;
pub const DEFAULT_MIN_RESUME_MINUTES: i64 = 15;

/// Keys this guard reads from an rsnapshot config (and its includes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RsnapshotSettings {
    pub snapshot_root: Option<PathBuf>,
    pub logfile: Option<PathBuf>,
    pub sync_first: bool,
}

/// Optional YAML file tuning the guard itself.
#[derive(Debug, Deserialize, Clone)]
pub struct GuardSettings {
    #[serde(default = "default_binary", rename = "rsnapshotBinary")]
    pub rsnapshot_binary: PathBuf,
    #[serde(default = "default_min_uptime", rename = "minUptimeMinutes")]
    pub min_uptime_minutes: i64,
    #[serde(default = "default_min_resume", rename = "minResumeMinutes")]
    pub min_resume_minutes: i64,
    #[serde(default = "default_error_marker", rename = "errorMarker")]
    pub error_marker: String,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            rsnapshot_binary: default_binary(),
            min_uptime_minutes: default_min_uptime(),
            min_resume_minutes: default_min_resume(),
            error_marker: default_error_marker(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub min_uptime: Duration,
    pub min_since_resume: Duration,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            min_uptime: Duration::minutes(DEFAULT_MIN_UPTIME_MINUTES),
            min_since_resume: Duration::minutes(DEFAULT_MIN_RESUME_MINUTES),
        }
    }
}

/// Everything one invocation needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// rsnapshot config path, passed through to the tool as given.
    pub config_file: PathBuf,
    pub snapshot_root: PathBuf,
    pub log_file: Option<PathBuf>,
    pub tool_path: PathBuf,
    pub error_marker: String,
    pub readiness: Readiness,
}

fn default_binary() -> PathBuf {
    PathBuf::from(DEFAULT_RSNAPSHOT_BINARY)
}

fn default_min_uptime() -> i64 {
    DEFAULT_MIN_UPTIME_MINUTES
}

fn default_min_resume() -> i64 {
    DEFAULT_MIN_RESUME_MINUTES
}

fn default_error_marker() -> String {
    DEFAULT_ERROR_MARKER.to_string()
}
