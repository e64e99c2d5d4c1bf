//! Shared utilities (hex formatting, data file discovery).

#[cfg(feature = "cli")]
pub mod fs;
pub mod hex;
