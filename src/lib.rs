//! Guards periodic rsnapshot runs: one instance at a time, rollback of a
//! generation left half-written by a crashed run, and a minimum dwell between
//! completed runs of each interval.

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod system;
pub mod types;
pub mod util;

pub use backup::{run_backup, RunContext};
pub use config::model::GuardConfig;
pub use error::{GuardError, Result};
pub use types::{Job, Outcome};
