use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::Path;

use chrono::{DateTime, Duration, Local};
use tracing::{info, warn};

use crate::config::model::Readiness;
use crate::error::{GuardError, Result};
use crate::system::SystemState;
use crate::types::Job;
use crate::util::time::describe_duration;

pub const HOURLY_INTERVALS: RangeInclusive<u32> = 2..=24;

/// Minimum dwell between two completed runs of `job`.
pub fn threshold(job: Job) -> Result<Duration> {
    match job {
        Job::Sync => Err(GuardError::UnsupportedSync),
        Job::Hourly { per_day } => {
            if !HOURLY_INTERVALS.contains(&per_day) {
                return Err(GuardError::InvalidHourlyInterval(per_day));
            }
            let day_ms: i64 = 24 * 60 * 60 * 1000;
            Ok(Duration::milliseconds(day_ms / i64::from(per_day)) - Duration::minutes(5))
        }
        Job::Daily => Ok(Duration::hours(23)),
        Job::Weekly => Ok(Duration::hours(6 * 24 + 12)),
        Job::Monthly => Ok(Duration::days(29)),
    }
}

/// Uptime and wakeup guards. Both must pass before any job is considered.
pub fn check_readiness(system: &dyn SystemState, readiness: &Readiness) -> Result<()> {
    info!(
        "Checking delays (minimum {} minutes since startup, {} since wakeup) ...",
        readiness.min_uptime.num_minutes(),
        readiness.min_since_resume.num_minutes()
    );
    let uptime = system.uptime()?;
    if uptime < readiness.min_uptime {
        info!(
            "- Computer uptime is {} minutes. NOT ENOUGH.",
            uptime.num_minutes()
        );
        return Err(GuardError::UptimeTooLow {
            minutes: uptime.num_minutes(),
            required: readiness.min_uptime.num_minutes(),
        });
    }
    info!(
        "- Computer uptime is {} minutes. THAT'S OKAY.",
        uptime.num_minutes()
    );

    let Some(resumed) = system.last_resume()? else {
        return Ok(());
    };
    let since = system.now() - resumed;
    if since < readiness.min_since_resume {
        info!(
            "- Computer wakeup time is {} minutes. NOT ENOUGH.",
            since.num_minutes()
        );
        return Err(GuardError::ResumeTooRecent {
            minutes: since.num_minutes(),
            required: readiness.min_since_resume.num_minutes(),
        });
    }
    info!(
        "- Computer wakeup time is {} minutes. THAT'S OKAY.",
        since.num_minutes()
    );
    Ok(())
}

/// Modification time of the newest generation; `None` when the job never ran.
pub fn last_run(newest: &Path) -> Result<Option<DateTime<Local>>> {
    let meta = match fs::metadata(newest) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(GuardError::message(format!(
                "stat {}: {}",
                newest.display(),
                err
            )))
        }
    };
    if !meta.is_dir() {
        warn!("{} is not a directory; treating job as never run", newest.display());
        return Ok(None);
    }
    let modified = meta
        .modified()
        .map_err(|e| GuardError::message(format!("mtime {}: {}", newest.display(), e)))?;
    Ok(Some(DateTime::<Local>::from(modified)))
}

/// Strictly more than `threshold` must have passed; equality is not due.
pub fn is_due(now: DateTime<Local>, last_run: DateTime<Local>, threshold: Duration) -> bool {
    now - last_run > threshold
}

pub fn log_dwell(job: Job, last_run: DateTime<Local>, now: DateTime<Local>, threshold: Duration) {
    let elapsed = now - last_run;
    if elapsed < Duration::zero() {
        warn!(
            "Last {} backup is {} in the future; check the system clock",
            job,
            describe_duration(-elapsed)
        );
    }
    info!(
        "Last {} backup was at {}, {} ago (min. is {})",
        job,
        last_run.format("%Y-%m-%d %H:%M:%S"),
        describe_duration(elapsed),
        describe_duration(threshold)
    );
}
