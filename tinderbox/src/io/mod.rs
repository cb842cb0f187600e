//! I/O helpers for the build loop.

pub mod clock;
pub mod config;
pub mod executor;
pub mod log_sink;
pub mod mail;
pub mod process;
