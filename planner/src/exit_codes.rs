//! Stable exit codes for planner CLI commands.

/// Command succeeded; for `planner run`, the plan completed.
pub const OK: i32 = 0;
/// Invalid config, input document, or any other error.
pub const INVALID: i32 = 1;
/// `planner run` finished with a failed plan.
pub const FAILED: i32 = 2;
