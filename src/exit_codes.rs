//! Exit code constants for the holdfast CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid names, task failure)
//! - 2: Storage I/O failure
//! - 3: Corrupt persisted state
//! - 4: Contention (task already running, lease held, not holder, not completed)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid names or configuration.
pub const USER_ERROR: i32 = 1;

/// Storage could not be read or written.
pub const IO_FAILURE: i32 = 2;

/// A persisted record failed to parse.
pub const CORRUPT_STATE: i32 = 3;

/// The request was refused because another caller holds the task or lease.
pub const CONTENTION: i32 = 4;
