//! Unattended tinderbox build slave.
//!
//! Repeatedly runs a fixed sequence of build steps as external processes,
//! captures their output in a single log, classifies the outcome and mails a
//! tinderbox report, then sleeps and starts over. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure logic (step and status types, command resolution,
//!   report rendering). No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (config files, the build log, child processes,
//!   SMTP, the clock). Behind traits where tests need to substitute them.
//!
//! Orchestration modules ([`build`], [`scheduler`]) coordinate the two to
//! implement a run and the endless loop around it.

pub mod build;
pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
