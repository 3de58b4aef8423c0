use tracing::{error, info, warn};

use crate::backup::lock::LockState;
use crate::backup::rsnapshot::BackupTool;
use crate::config::model::GuardConfig;
use crate::error::{GuardError, Result};
use crate::system::{ProcessTable, SystemState};
use crate::types::{Job, Outcome};

pub mod lock;
pub mod rotation;
pub mod rsnapshot;
pub mod schedule;

/// The collaborators one invocation talks to.
pub struct RunContext<'a> {
    pub processes: &'a dyn ProcessTable,
    pub system: &'a dyn SystemState,
    pub tool: &'a dyn BackupTool,
}

/// Runs `job` once if it is safe and due.
///
/// Order: lock inspection, rollback of an interrupted run, readiness guards,
/// dwell check, then the tool itself.
pub fn run_backup(config: &GuardConfig, job: Job, ctx: &RunContext<'_>) -> Result<Outcome> {
    let threshold = schedule::threshold(job)?;
    let lock_path = lock::lock_path(&config.snapshot_root);

    info!(
        "Checking rsnapshot-once pidfile at {} ...",
        lock_path.display()
    );
    match lock::inspect(&lock_path, ctx.processes)? {
        LockState::NoLock => info!("Does not exist. Last backup was clean."),
        LockState::ActiveOtherInstance(pid) => {
            error!("Process {} still running. Aborting", pid);
            return Err(GuardError::ActiveOtherInstance(pid));
        }
        LockState::Stale(pid) => {
            match pid {
                Some(pid) => warn!(
                    "PID file exists but process {} is not running. Script crashed before",
                    pid
                ),
                None => warn!("PID file exists but holds no valid PID. Script crashed before"),
            }
            let report = rotation::recover(&config.snapshot_root, job.as_str())?;
            info!(
                "Rollback done: removed {:?}, renamed {} generation(s)",
                report.removed,
                report.renamed.len()
            );
            // Generations are consistent again; the lock must not outlive the rollback.
            lock::release(&lock_path)?;
        }
    }

    schedule::check_readiness(ctx.system, &config.readiness)?;

    let newest = config.snapshot_root.join(job.newest_generation());
    match schedule::last_run(&newest)? {
        None => info!("No backup exists for job {} at {}", job, newest.display()),
        Some(last_run) => {
            let now = ctx.system.now();
            schedule::log_dwell(job, last_run, now, threshold);
            if !schedule::is_due(now, last_run, threshold) {
                info!("Job does NOT need to run.");
                return Ok(Outcome::NotDue {
                    last_run,
                    elapsed: now - last_run,
                    threshold,
                });
            }
        }
    }

    rsnapshot::run_job(config, job, &lock_path, ctx.tool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::lock::tests::FakeProcesses;
    use crate::backup::schedule::tests::FakeSystem;
    use crate::config::model::{Readiness, DEFAULT_ERROR_MARKER};
    use crate::util::command::CapturedOutput;
    use chrono::{DateTime, Duration, Local};
    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Stands in for rsnapshot: optionally creates `<job>.0`, then reports a fixed result.
    struct StubTool {
        root: PathBuf,
        code: i32,
        output: String,
        creates_newest: bool,
        calls: RefCell<Vec<String>>,
    }

    impl StubTool {
        fn new(root: &Path, code: i32, output: &str) -> Self {
            Self {
                root: root.to_path_buf(),
                code,
                output: output.to_string(),
                creates_newest: true,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl BackupTool for StubTool {
        fn run(&self, config_file: &Path, job: Job) -> Result<CapturedOutput> {
            assert!(
                lock::lock_path(&self.root).exists(),
                "lock must be held while the tool runs"
            );
            self.calls
                .borrow_mut()
                .push(format!("-c {} {}", config_file.display(), job));
            if self.creates_newest {
                fs::create_dir_all(self.root.join(job.newest_generation())).expect("mkdir");
            }
            Ok(CapturedOutput {
                code: Some(self.code),
                output: self.output.clone(),
            })
        }
    }

    fn config_for(root: &Path) -> GuardConfig {
        GuardConfig {
            config_file: PathBuf::from("/etc/rsnapshot.conf"),
            snapshot_root: root.to_path_buf(),
            log_file: None,
            tool_path: PathBuf::from("/usr/local/bin/rsnapshot"),
            error_marker: DEFAULT_ERROR_MARKER.to_string(),
            readiness: Readiness::default(),
        }
    }

    fn make_generation(root: &Path, name: &str) {
        fs::create_dir_all(root.join(name)).expect("mkdir");
        fs::write(root.join(name).join("origin"), name).expect("write");
    }

    fn mtime(path: &Path) -> DateTime<Local> {
        DateTime::<Local>::from(fs::metadata(path).expect("stat").modified().expect("mtime"))
    }

    fn names(root: &Path) -> Vec<String> {
        let mut out: Vec<String> = fs::read_dir(root)
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn fresh_root_runs_the_job() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        let tool = StubTool::new(root, 0, "done\n");
        let system = FakeSystem::settled(Local::now());
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let outcome = run_backup(&config_for(root), Job::Daily, &ctx).expect("run");
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(tool.calls(), vec!["-c /etc/rsnapshot.conf daily"]);
        assert!(!lock::lock_path(root).exists());
        assert!(root.join("daily.0").is_dir());
    }

    #[test]
    fn stale_lock_rolls_back_before_scheduling() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        for name in ["daily.0", "daily.1", "daily.2"] {
            make_generation(root, name);
        }
        let previous = mtime(&root.join("daily.1"));
        fs::write(lock::lock_path(root), "31337").expect("write lock");

        let tool = StubTool::new(root, 0, "");
        let system = FakeSystem::settled(previous + Duration::hours(1));
        let processes = FakeProcesses::with(&[1]);
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let outcome = run_backup(&config_for(root), Job::Daily, &ctx).expect("run");
        assert_eq!(
            outcome,
            Outcome::NotDue {
                last_run: previous,
                elapsed: Duration::hours(1),
                threshold: Duration::hours(23),
            }
        );
        assert!(tool.calls().is_empty());
        assert_eq!(names(root), vec!["daily.0", "daily.1"]);
        assert_eq!(
            fs::read_to_string(root.join("daily.0").join("origin")).expect("read"),
            "daily.1"
        );
        assert_eq!(
            fs::read_to_string(root.join("daily.1").join("origin")).expect("read"),
            "daily.2"
        );
    }

    #[test]
    fn stale_lock_then_due_runs_against_recovered_newest() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        for name in ["daily.0", "daily.1", "daily.2"] {
            make_generation(root, name);
        }
        let previous = mtime(&root.join("daily.1"));
        fs::write(lock::lock_path(root), "31337").expect("write lock");

        let mut tool = StubTool::new(root, 0, "");
        tool.creates_newest = false;
        let system = FakeSystem::settled(previous + Duration::hours(24));
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let outcome = run_backup(&config_for(root), Job::Daily, &ctx).expect("run");
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(tool.calls().len(), 1);
        assert_eq!(names(root), vec!["daily.0", "daily.1"]);
    }

    #[test]
    fn live_owner_aborts_without_touching_generations() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        for name in ["daily.0", "daily.1"] {
            make_generation(root, name);
        }
        fs::write(lock::lock_path(root), "4242").expect("write lock");

        let tool = StubTool::new(root, 0, "");
        let system = FakeSystem::settled(Local::now() + Duration::days(2));
        let processes = FakeProcesses::with(&[4242]);
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let err = run_backup(&config_for(root), Job::Daily, &ctx).unwrap_err();
        assert!(matches!(err, GuardError::ActiveOtherInstance(4242)));
        assert!(tool.calls().is_empty());
        assert_eq!(names(root), vec![".rsnapshot-once.pid", "daily.0", "daily.1"]);
        assert_eq!(
            fs::read_to_string(root.join("daily.0").join("origin")).expect("read"),
            "daily.0"
        );
        assert_eq!(
            fs::read_to_string(lock::lock_path(root)).expect("read"),
            "4242"
        );
    }

    #[test]
    fn unsafe_newest_generation_aborts_before_the_tool_runs() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        fs::write(root.join("daily.0"), "not a snapshot").expect("write");
        make_generation(root, "daily.1");
        fs::write(lock::lock_path(root), "31337").expect("write lock");

        let tool = StubTool::new(root, 0, "");
        let system = FakeSystem::settled(Local::now() + Duration::days(2));
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let err = run_backup(&config_for(root), Job::Daily, &ctx).unwrap_err();
        assert!(matches!(err, GuardError::RotationSafetyViolation { .. }));
        assert!(tool.calls().is_empty());
        assert_eq!(names(root), vec![".rsnapshot-once.pid", "daily.0", "daily.1"]);
        assert_eq!(
            fs::read_to_string(lock::lock_path(root)).expect("read"),
            "31337"
        );
        assert_eq!(
            fs::read_to_string(root.join("daily.1").join("origin")).expect("read"),
            "daily.1"
        );
    }

    #[test]
    fn marker_with_clean_exit_is_a_configuration_error() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        let tool = StubTool::new(
            root,
            0,
            "ERROR: snapshot_root /x/ - no such directory\nrsnapshot encountered an error! The program was invoked with these options:\n",
        );
        let system = FakeSystem::settled(Local::now());
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let err = run_backup(&config_for(root), Job::Weekly, &ctx).unwrap_err();
        assert!(matches!(err, GuardError::ConfigurationError));
        assert!(!lock::lock_path(root).exists());
    }

    #[test]
    fn fatal_exit_keeps_the_lock_for_the_next_run() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        let tool = StubTool::new(root, 1, "ERROR: rsync returned status 23\n");
        let system = FakeSystem::settled(Local::now());
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let err = run_backup(&config_for(root), Job::Daily, &ctx).unwrap_err();
        assert!(matches!(err, GuardError::FatalRunError(1)));
        let lock_path = lock::lock_path(root);
        assert!(lock_path.exists());
        assert_eq!(
            fs::read_to_string(&lock_path).expect("read"),
            std::process::id().to_string()
        );

        // Once this process is gone the lock reads as stale and the half-written
        // daily.0 is rolled back.
        let after = FakeProcesses::none();
        assert_eq!(
            lock::inspect(&lock_path, &after).expect("inspect"),
            LockState::Stale(Some(std::process::id()))
        );
    }

    #[test]
    fn warnings_still_complete() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        let tool = StubTool::new(root, 2, "WARNING: some files vanished\n");
        let system = FakeSystem::settled(Local::now());
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let outcome = run_backup(&config_for(root), Job::Monthly, &ctx).expect("run");
        assert_eq!(outcome, Outcome::CompletedWithWarnings);
        assert!(!lock::lock_path(root).exists());
    }

    #[test]
    fn low_uptime_rejects_any_job() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        make_generation(root, "daily.0");
        let tool = StubTool::new(root, 0, "");
        let mut system = FakeSystem::settled(Local::now() + Duration::days(30));
        system.uptime = Duration::minutes(10);
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        for job in [Job::Hourly { per_day: 6 }, Job::Daily, Job::Weekly, Job::Monthly] {
            let err = run_backup(&config_for(root), job, &ctx).unwrap_err();
            assert!(matches!(err, GuardError::UptimeTooLow { .. }), "{job}: {err}");
        }
        assert!(tool.calls().is_empty());
    }

    #[test]
    fn not_due_is_not_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        make_generation(root, "weekly.0");
        let last = mtime(&root.join("weekly.0"));
        let tool = StubTool::new(root, 0, "");
        let system = FakeSystem::settled(last + Duration::hours(156));
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let outcome = run_backup(&config_for(root), Job::Weekly, &ctx).expect("run");
        assert!(matches!(outcome, Outcome::NotDue { .. }));
        assert!(tool.calls().is_empty());
        assert!(!lock::lock_path(root).exists());
    }

    #[test]
    fn invalid_hourly_interval_touches_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        make_generation(root, "hourly.0");
        fs::write(lock::lock_path(root), "31337").expect("write lock");
        let tool = StubTool::new(root, 0, "");
        let system = FakeSystem::settled(Local::now());
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };

        let err = run_backup(&config_for(root), Job::Hourly { per_day: 25 }, &ctx).unwrap_err();
        assert!(matches!(err, GuardError::InvalidHourlyInterval(25)));
        assert!(root.join("hourly.0").is_dir());
        assert!(lock::lock_path(root).exists());
    }

    #[test]
    fn sync_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let tool = StubTool::new(dir.path(), 0, "");
        let system = FakeSystem::settled(Local::now());
        let processes = FakeProcesses::none();
        let ctx = RunContext {
            processes: &processes,
            system: &system,
            tool: &tool,
        };
        let err = run_backup(&config_for(dir.path()), Job::Sync, &ctx).unwrap_err();
        assert!(matches!(err, GuardError::UnsupportedSync));
    }
}
