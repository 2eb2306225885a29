//! Error types for holdfast.
//!
//! Uses thiserror for derive macros. Contention outcomes (a lease held by
//! someone else, a task already running) are not errors; they are reported
//! through the outcome enums of the lease and task modules.

use crate::exit_codes;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for holdfast operations.
#[derive(Error, Debug)]
pub enum HoldfastError {
    /// Invalid arguments, names, or configuration.
    #[error("{0}")]
    UserError(String),

    /// Storage could not be read or written.
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// A persisted record exists but does not parse.
    #[error("corrupt state in '{}': {message}", path.display())]
    CorruptState { path: PathBuf, message: String },

    /// A work function terminated abnormally.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl HoldfastError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            HoldfastError::UserError(_) => exit_codes::USER_ERROR,
            HoldfastError::IoFailure(_) => exit_codes::IO_FAILURE,
            HoldfastError::CorruptState { .. } => exit_codes::CORRUPT_STATE,
            HoldfastError::TaskFailed(_) => exit_codes::USER_ERROR,
        }
    }

    /// Build an `IoFailure` naming the path involved.
    pub(crate) fn io(action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        HoldfastError::IoFailure(format!("failed to {} '{}': {}", action, path.display(), err))
    }
}

/// Result type alias for holdfast operations.
pub type Result<T> = std::result::Result<T, HoldfastError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = HoldfastError::UserError("bad name".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn io_failure_has_correct_exit_code() {
        let err = HoldfastError::IoFailure("disk full".to_string());
        assert_eq!(err.exit_code(), exit_codes::IO_FAILURE);
    }

    #[test]
    fn corrupt_state_has_correct_exit_code() {
        let err = HoldfastError::CorruptState {
            path: PathBuf::from("tasks/build.json"),
            message: "expected value".to_string(),
        };
        assert_eq!(err.exit_code(), exit_codes::CORRUPT_STATE);
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = HoldfastError::CorruptState {
            path: PathBuf::from("tasks/build.json"),
            message: "EOF while parsing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt state in 'tasks/build.json': EOF while parsing"
        );

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = HoldfastError::io("write", Path::new("leases/ws.json"), io_err);
        assert_eq!(
            err.to_string(),
            "I/O failure: failed to write 'leases/ws.json': denied"
        );
    }
}
