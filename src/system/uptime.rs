use std::fs;

use chrono::Duration;

use crate::error::{GuardError, Result};

const PROC_UPTIME: &str = "/proc/uptime";

pub fn read_uptime() -> Result<Duration> {
    let contents = fs::read_to_string(PROC_UPTIME)
        .map_err(|e| GuardError::message(format!("read {}: {}", PROC_UPTIME, e)))?;
    parse_uptime(&contents)
}

/// Parses the first field of `/proc/uptime` (seconds since boot, fractional).
pub fn parse_uptime(contents: &str) -> Result<Duration> {
    let field = contents
        .split_whitespace()
        .next()
        .ok_or_else(|| GuardError::message(format!("{} is empty", PROC_UPTIME)))?;
    let seconds: f64 = field
        .parse()
        .map_err(|e| GuardError::message(format!("parse {} {:?}: {}", PROC_UPTIME, field, e)))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(GuardError::message(format!(
            "{} reports invalid uptime {}",
            PROC_UPTIME, field
        )));
    }
    Ok(Duration::milliseconds((seconds * 1000.0).round() as i64))
}
