//! Step executor abstraction.
//!
//! The [`StepExecutor`] trait decouples the build runner from process
//! spawning. Tests use scripted executors that write predetermined output to
//! the log without spawning anything.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::core::types::CommandSpec;
use crate::error::Result;
use crate::io::log_sink::{LogSink, MARKER};
use crate::io::process::{
    ProcessError, SPAWN_FAILED_EXIT_CODE, UNKNOWN_EXIT_CODE, run_with_timeout,
};

/// One command invocation.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    pub command: &'a CommandSpec,
    /// Working directory of the run at the time this step starts.
    pub workdir: &'a Path,
    pub timeout: Duration,
}

/// Runs one resolved command and reports its exit code.
///
/// Implementations announce the command in the log before running it and
/// send every diagnostic to the log. Only log I/O failures are errors; a
/// command that fails, hangs or cannot start yields a non-zero code.
pub trait StepExecutor {
    fn execute(&self, request: &StepRequest<'_>, log: &mut LogSink) -> Result<i32>;
}

/// Executor that spawns the command as a child process.
pub struct ProcessExecutor;

impl StepExecutor for ProcessExecutor {
    #[instrument(
        skip_all,
        fields(
            program = request.command.program(),
            timeout_secs = request.timeout.as_secs()
        )
    )]
    fn execute(&self, request: &StepRequest<'_>, log: &mut LogSink) -> Result<i32> {
        log.announce(request.command)?;
        info!(
            command = %request.command,
            workdir = %request.workdir.display(),
            "running step command"
        );

        let mut cmd = Command::new(request.command.program());
        cmd.args(request.command.args()).current_dir(request.workdir);
        let (stdout, stderr) = log.child_stdio()?;

        match run_with_timeout(cmd, stdout, stderr, request.timeout) {
            Ok(exit) if exit.timed_out => {
                log.line(&format!(
                    "{MARKER} timed out after {} seconds",
                    request.timeout.as_secs()
                ))?;
                let code = exit.code();
                // A killed process should never look successful.
                Ok(if code == 0 { UNKNOWN_EXIT_CODE } else { code })
            }
            Ok(exit) => Ok(exit.code()),
            Err(ProcessError::Spawn(e)) => {
                warn!(err = %e, "step command could not start");
                log.line(&format!("{MARKER} failed to start: {e}"))?;
                Ok(SPAWN_FAILED_EXIT_CODE)
            }
            Err(err @ ProcessError::Wait(_)) => {
                warn!(err = %err, "lost track of step command");
                log.line(&format!("{MARKER} {err}"))?;
                Ok(UNKNOWN_EXIT_CODE)
            }
        }
    }
}
