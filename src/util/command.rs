use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};

use crate::error::{GuardError, Result};

/// Exit status and interleaved stdout/stderr of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub output: String,
}

pub fn describe_command(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Runs `cmd` to completion with stdout and stderr sharing one anonymous file,
/// so the captured text keeps the order the tool wrote it in.
pub fn run_captured(cmd: &mut Command) -> Result<CapturedOutput> {
    let program = cmd.get_program().to_string_lossy().to_string();
    let mut sink = tempfile::tempfile()
        .map_err(|e| GuardError::message(format!("capture file for {}: {}", program, e)))?;
    let stderr = sink
        .try_clone()
        .map_err(|e| GuardError::message(format!("capture file for {}: {}", program, e)))?;
    let stdout = sink
        .try_clone()
        .map_err(|e| GuardError::message(format!("capture file for {}: {}", program, e)))?;
    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .status()
        .map_err(|e| GuardError::message(format!("{}: {}", program, e)))?;

    let mut raw = Vec::new();
    sink.seek(SeekFrom::Start(0))
        .and_then(|_| sink.read_to_end(&mut raw))
        .map_err(|e| GuardError::message(format!("read output of {}: {}", program, e)))?;
    Ok(CapturedOutput {
        code: status.code(),
        output: String::from_utf8_lossy(&raw).into_owned(),
    })
}
