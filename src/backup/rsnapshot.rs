use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{error, info, warn};

use crate::backup::lock;
use crate::config::model::GuardConfig;
use crate::error::{GuardError, Result};
use crate::types::{Job, Outcome};
use crate::util::command::{describe_command, run_captured, CapturedOutput};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_WARNING: i32 = 2;

/// The external backup engine.
pub trait BackupTool {
    fn run(&self, config_file: &Path, job: Job) -> Result<CapturedOutput>;
}

#[derive(Debug, Clone)]
pub struct Rsnapshot {
    binary: PathBuf,
}

impl Rsnapshot {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            binary: config.tool_path.clone(),
        }
    }
}

impl BackupTool for Rsnapshot {
    fn run(&self, config_file: &Path, job: Job) -> Result<CapturedOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-c").arg(config_file).arg(job.as_str());
        info!("NOW RUNNING JOB: {}", describe_command(&cmd));
        run_captured(&mut cmd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Completed,
    CompletedWithWarnings,
    ConfigurationError,
    Fatal(i32),
}

/// The error marker wins over any exit code; a process killed by a signal is fatal.
pub fn classify(captured: &CapturedOutput, error_marker: &str) -> Verdict {
    if captured.output.lines().any(|line| line.contains(error_marker)) {
        return Verdict::ConfigurationError;
    }
    match captured.code.unwrap_or(EXIT_FATAL) {
        EXIT_SUCCESS => Verdict::Completed,
        EXIT_WARNING => Verdict::CompletedWithWarnings,
        code => Verdict::Fatal(code),
    }
}

/// Holds the lock around one tool run. A fatal exit leaves the lock behind on
/// purpose so the next invocation rolls the half-written generation back.
pub fn run_job(
    config: &GuardConfig,
    job: Job,
    lock_path: &Path,
    tool: &dyn BackupTool,
) -> Result<Outcome> {
    let pid = std::process::id();
    info!(
        "Writing rsnapshot-once pidfile (PID {}) to {}",
        pid,
        lock_path.display()
    );
    lock::acquire(lock_path, pid)?;

    let captured = match tool.run(&config.config_file, job) {
        Ok(captured) => captured,
        Err(err) => {
            // The tool could not be started, so no generation was touched.
            lock::release(lock_path)?;
            return Err(err);
        }
    };
    for line in captured.output.lines() {
        info!(" captured output: {}", line);
    }

    match classify(&captured, &config.error_marker) {
        Verdict::ConfigurationError => {
            error!("Exiting rsnapshot-once, because error in rsnapshot config detected.");
            remove_lock(lock_path)?;
            Err(GuardError::ConfigurationError)
        }
        Verdict::Fatal(code) => {
            error!(
                "No clean exit (code {}). Backup aborted. Cleanup necessary on next run (DIRTY EXIT).",
                code
            );
            Err(GuardError::FatalRunError(code))
        }
        Verdict::CompletedWithWarnings => {
            match &config.log_file {
                Some(log) => warn!(
                    "Rsnapshot encountered warnings, this is worth a look at {}",
                    log.display()
                ),
                None => warn!("Rsnapshot encountered warnings, this is worth a look at its output"),
            }
            remove_lock(lock_path)?;
            Ok(Outcome::CompletedWithWarnings)
        }
        Verdict::Completed => {
            remove_lock(lock_path)?;
            Ok(Outcome::Completed)
        }
    }
}

fn remove_lock(lock_path: &Path) -> Result<()> {
    info!(
        "Removing rsnapshot-once pidfile at {} (CLEAN EXIT).",
        lock_path.display()
    );
    lock::release(lock_path)
}
