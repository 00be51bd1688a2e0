//! Process exit codes
//!
//! Stage outcomes map onto distinct codes so a calling scheduler can tell a
//! failed stage from a cancelled one.

/// Stage succeeded, or a non-stage command completed
pub const SUCCESS: i32 = 0;

/// Stage failed, or the command could not run
pub const ERROR: i32 = 1;

/// Stage was cancelled
pub const CANCELLED: i32 = 2;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
