//! Helpers for running child processes with a wall-clock timeout.

use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Exit code reported when a command cannot be started (as a shell would).
pub const SPAWN_FAILED_EXIT_CODE: i32 = 127;

/// Exit code for a process that ended without a code or signal.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("spawn command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("wait for command: {0}")]
    Wait(#[source] std::io::Error),
}

/// How a child process ended.
#[derive(Debug, Clone, Copy)]
pub struct ProcessExit {
    pub status: ExitStatus,
    pub timed_out: bool,
}

impl ProcessExit {
    /// Numeric exit code; signal deaths map to the negated signal number.
    pub fn code(&self) -> i32 {
        exit_code(self.status)
    }
}

/// Spawn `cmd` with the given output handles and wait at most `timeout`.
///
/// On timeout the child is killed and reaped; the returned status is the
/// kill status with `timed_out` set.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
pub fn run_with_timeout(
    mut cmd: Command,
    stdout: Stdio,
    stderr: Stdio,
    timeout: Duration,
) -> Result<ProcessExit, ProcessError> {
    cmd.stdin(Stdio::null()).stdout(stdout).stderr(stderr);

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(ProcessError::Spawn(e));
        }
    };

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).map_err(ProcessError::Wait)? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            if let Err(e) = child.kill() {
                // The child may have exited between the timeout and the kill.
                warn!(err = %e, "kill after timeout failed");
            }
            child.wait().map_err(ProcessError::Wait)?
        }
    };

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(ProcessExit { status, timed_out })
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    UNKNOWN_EXIT_CODE
}
