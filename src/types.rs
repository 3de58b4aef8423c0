use std::fmt;

use chrono::{DateTime, Duration, Local};

pub const DEFAULT_HOURLY_INTERVALS: u32 = 6;

/// An rsnapshot interval this guard can be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Sync,
    Hourly { per_day: u32 },
    Daily,
    Weekly,
    Monthly,
}

impl Job {
    pub fn as_str(&self) -> &'static str {
        match self {
            Job::Sync => "sync",
            Job::Hourly { .. } => "hourly",
            Job::Daily => "daily",
            Job::Weekly => "weekly",
            Job::Monthly => "monthly",
        }
    }

    /// Name of the newest generation directory, e.g. `daily.0`.
    pub fn newest_generation(&self) -> String {
        format!("{}.0", self.as_str())
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of an invocation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    CompletedWithWarnings,
    NotDue {
        last_run: DateTime<Local>,
        elapsed: Duration,
        threshold: Duration,
    },
}
