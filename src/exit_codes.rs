//! Exit code constants for the clusterops CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: Task not found
//! - 3: Lock conflict
//! - 4: Store failure
//! - 5: Task finished without success

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, id allocation failure.
pub const USER_ERROR: i32 = 1;

/// The requested task does not exist.
pub const NOT_FOUND: i32 = 2;

/// An entity lock could not be acquired.
pub const LOCK_CONFLICT: i32 = 3;

/// The task store could not be read or written.
pub const STORE_FAILURE: i32 = 4;

/// An executed task ended as failed or timed out.
pub const TASK_FAILED: i32 = 5;
