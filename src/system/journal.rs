use std::io;
use std::process::{Command, Output};

use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;

const SLEEP_IDENTIFIER: &str = "systemd-sleep";
const RESUMED_MESSAGE: &str = "System resumed.";

#[derive(Debug, Deserialize)]
struct JournalEntry {
    #[serde(rename = "MESSAGE", default)]
    message: Option<serde_json::Value>,
    #[serde(rename = "__REALTIME_TIMESTAMP", default)]
    realtime_usec: Option<String>,
}

/// Looks up the latest `systemd-sleep` resume message of the current boot.
/// A host without journalctl, or a journal that cannot be read, has no resume event.
pub fn last_resume() -> Result<Option<DateTime<Local>>> {
    let output = Command::new("journalctl")
        .arg("--boot")
        .arg("--identifier")
        .arg(SLEEP_IDENTIFIER)
        .arg("--output")
        .arg("json")
        .arg("--no-pager")
        .output();
    Ok(resume_from_output(output))
}

/// Never fails: whatever goes wrong running journalctl only disables the wakeup check.
fn resume_from_output(output: io::Result<Output>) -> Option<DateTime<Local>> {
    let output = match output {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("journalctl not found; skipping wakeup check");
            return None;
        }
        Err(err) => {
            warn!("journalctl: {}; skipping wakeup check", err);
            return None;
        }
    };
    if !output.status.success() {
        warn!(
            "journalctl failed with exit code {}; skipping wakeup check",
            output.status.code().unwrap_or(1)
        );
        return None;
    }
    parse_resume_entries(&String::from_utf8_lossy(&output.stdout))
}

/// Scans journalctl JSON lines (oldest first) for the last resume event.
pub fn parse_resume_entries(json_lines: &str) -> Option<DateTime<Local>> {
    let mut latest = None;
    for line in json_lines.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: JournalEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skip unreadable journal line: {}", err);
                continue;
            }
        };
        let is_resume = entry
            .message
            .as_ref()
            .and_then(|m| m.as_str())
            .map(|m| m.trim() == RESUMED_MESSAGE)
            .unwrap_or(false);
        if !is_resume {
            continue;
        }
        let Some(at) = entry
            .realtime_usec
            .as_deref()
            .and_then(|us| us.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_micros)
        else {
            continue;
        };
        latest = Some(at.with_timezone(&Local));
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(raw_status: i32, stdout: &str) -> io::Result<Output> {
        Ok(Output {
            status: ExitStatus::from_raw(raw_status),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        })
    }

    #[test]
    fn spawn_failures_skip_the_check() {
        for kind in [
            io::ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied,
            io::ErrorKind::OutOfMemory,
        ] {
            assert_eq!(resume_from_output(Err(io::Error::from(kind))), None);
        }
    }

    #[test]
    fn failed_journalctl_skips_the_check() {
        let lines = r#"{"MESSAGE":"System resumed.","__REALTIME_TIMESTAMP":"1700000000000000"}"#;
        assert_eq!(resume_from_output(output(1 << 8, lines)), None);
        assert_eq!(
            resume_from_output(output(0, lines)),
            Some(Local.timestamp_opt(1_700_000_000, 0).unwrap())
        );
    }

    #[test]
    fn picks_latest_resume_message() {
        let lines = r#"
{"MESSAGE":"Entering sleep state 'suspend'...","__REALTIME_TIMESTAMP":"1700000000000000"}
{"MESSAGE":"System resumed.","__REALTIME_TIMESTAMP":"1700000600000000"}
{"MESSAGE":"Entering sleep state 'suspend'...","__REALTIME_TIMESTAMP":"1700003600000000"}
{"MESSAGE":"System resumed.","__REALTIME_TIMESTAMP":"1700007200000000"}
{"MESSAGE":"Some other message","__REALTIME_TIMESTAMP":"1700007300000000"}
"#;
        let resumed = parse_resume_entries(lines).expect("resume");
        assert_eq!(resumed, Local.timestamp_opt(1_700_007_200, 0).unwrap());
    }

    #[test]
    fn no_resume_message_means_none() {
        let lines = r#"{"MESSAGE":"Entering sleep state 'suspend'...","__REALTIME_TIMESTAMP":"1700000000000000"}"#;
        assert_eq!(parse_resume_entries(lines), None);
        assert_eq!(parse_resume_entries(""), None);
    }

    #[test]
    fn binary_messages_and_bad_lines_are_skipped() {
        let lines = r#"
not json
{"MESSAGE":[83,121,115],"__REALTIME_TIMESTAMP":"1700000000000000"}
{"MESSAGE":"System resumed.","__REALTIME_TIMESTAMP":"garbage"}
{"MESSAGE":"System resumed.","__REALTIME_TIMESTAMP":"1700000000000000"}
"#;
        let resumed = parse_resume_entries(lines).expect("resume");
        assert_eq!(resumed, Local.timestamp_opt(1_700_000_000, 0).unwrap());
    }
}
