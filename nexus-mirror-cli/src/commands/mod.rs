//! CLI command implementations.

pub mod common;
pub mod list;
pub mod sync;

/// Every asset present and verified.
pub const EXIT_COMPLETE: u8 = 0;
/// Startup failed; nothing was downloaded.
pub const EXIT_FATAL: u8 = 1;
/// The run finished but the mirror is incomplete.
pub const EXIT_INCOMPLETE: u8 = 2;
