//! Stable exit codes for `hugo-pipeline` commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config, git or filesystem failure.
pub const FAILED: i32 = 1;
/// The theme does not provide something the pipeline depends on (example site).
pub const PRECONDITION: i32 = 2;
