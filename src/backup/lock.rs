use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{GuardError, Result};
use crate::system::ProcessTable;

pub const LOCK_FILE_NAME: &str = ".rsnapshot-once.pid";

/// What an existing lock file says about the previous invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    NoLock,
    ActiveOtherInstance(u32),
    /// The owner is gone without cleaning up. `None` when the file holds no valid pid.
    Stale(Option<u32>),
}

pub fn lock_path(snapshot_root: &Path) -> PathBuf {
    snapshot_root.join(LOCK_FILE_NAME)
}

pub fn inspect(path: &Path, processes: &dyn ProcessTable) -> Result<LockState> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LockState::NoLock),
        Err(err) => {
            return Err(GuardError::message(format!(
                "read {}: {}",
                path.display(),
                err
            )))
        }
    };
    match text.trim().parse::<u32>() {
        Ok(pid) if processes.exists(pid) => Ok(LockState::ActiveOtherInstance(pid)),
        Ok(pid) => Ok(LockState::Stale(Some(pid))),
        Err(_) => Ok(LockState::Stale(None)),
    }
}

/// Creates the lock file holding `pid`. The create is exclusive: a lock written by
/// anyone else in the meantime wins and this call reports them as the active owner.
pub fn acquire(path: &Path, pid: u32) -> Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut f) => {
            write!(f, "{}", pid)
                .and_then(|_| f.sync_all())
                .map_err(|e| GuardError::message(format!("write {}: {}", path.display(), e)))?;
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            let holder = fs::read_to_string(path)
                .ok()
                .and_then(|text| text.trim().parse::<u32>().ok());
            match holder {
                Some(holder) if holder == pid => Ok(()),
                Some(holder) => Err(GuardError::ActiveOtherInstance(holder)),
                None => Err(GuardError::message(format!(
                    "lock {} appeared while starting and holds no pid",
                    path.display()
                ))),
            }
        }
        Err(err) => Err(GuardError::message(format!(
            "failed to lock {}: {}",
            path.display(),
            err
        ))),
    }
}

pub fn release(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(GuardError::message(format!(
            "remove {}: {}",
            path.display(),
            err
        ))),
    }
}
