//! Process exit codes of the `bagit` binary.

pub const SUCCESS: i32 = 0;
pub const VALIDATION_FAILED: i32 = 1; // Bag violates its profile or checksums
pub const CONFIG_ERROR: i32 = 2; // Bad arguments, unreadable profile or I/O failure
