use std::path::Path;

use chrono::{DateTime, Duration, Local};

use crate::error::Result;

pub mod journal;
pub mod uptime;

/// Answers whether a process id is currently alive.
pub trait ProcessTable {
    fn exists(&self, pid: u32) -> bool;
}

/// Clock and boot-state readings used by the readiness guards.
pub trait SystemState {
    fn now(&self) -> DateTime<Local>;
    fn uptime(&self) -> Result<Duration>;
    /// Most recent resume from suspend during the current boot, if any.
    fn last_resume(&self) -> Result<Option<DateTime<Local>>>;
}

/// The running Linux host: `/proc` and the systemd journal.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxHost;

impl ProcessTable for LinuxHost {
    fn exists(&self, pid: u32) -> bool {
        pid != 0 && Path::new("/proc").join(pid.to_string()).exists()
    }
}

impl SystemState for LinuxHost {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn uptime(&self) -> Result<Duration> {
        uptime::read_uptime()
    }

    fn last_resume(&self) -> Result<Option<DateTime<Local>>> {
        journal::last_resume()
    }
}
