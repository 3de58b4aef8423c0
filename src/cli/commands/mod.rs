pub mod run;

use crate::error::GuardError;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_ALREADY_RUNNING: u8 = 3;
pub const EXIT_ROTATION: u8 = 4;
pub const EXIT_TOOL_CONFIG: u8 = 5;
pub const EXIT_TOOL_FATAL: u8 = 6;
/// sysexits EX_TEMPFAIL: the host is not ready yet, try again later.
pub const EXIT_NOT_READY: u8 = 75;

pub fn exit_code_for_guard_error(err: &GuardError) -> u8 {
    match err {
        GuardError::Config(_)
        | GuardError::UnsupportedSync
        | GuardError::UnsupportedSyncFirst
        | GuardError::MissingSnapshotRoot(_)
        | GuardError::InvalidHourlyInterval(_) => EXIT_CONFIG,
        GuardError::ActiveOtherInstance(_) => EXIT_ALREADY_RUNNING,
        GuardError::RotationSafetyViolation { .. } | GuardError::RotationCollision { .. } => {
            EXIT_ROTATION
        }
        GuardError::ConfigurationError => EXIT_TOOL_CONFIG,
        GuardError::FatalRunError(_) => EXIT_TOOL_FATAL,
        GuardError::UptimeTooLow { .. } | GuardError::ResumeTooRecent { .. } => EXIT_NOT_READY,
        GuardError::Message(_) | GuardError::Io(_) => EXIT_FAILURE,
    }
}

pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<GuardError>() {
        Some(guard) => exit_code_for_guard_error(guard),
        None => EXIT_FAILURE,
    }
}
