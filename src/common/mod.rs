//! Shared utilities used by both binaries.

pub mod logger;
pub mod time;
