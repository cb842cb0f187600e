//! Test-only collaborators: temp base directory, scripted executor, recording
//! transport, fake clock.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::build::BuildPlan;
use crate::core::resolver::CommandOverrides;
use crate::core::types::StepName;
use crate::error::Result;
use crate::io::clock::Clock;
use crate::io::config::DEFAULT_STEP_TIMEOUT_SECS;
use crate::io::executor::{StepExecutor, StepRequest};
use crate::io::log_sink::LogSink;
use crate::io::mail::{ReportTransport, TransportError};

/// Plan rooted at `base_dir` with default commands and `tbox.log` inside it.
pub fn plan_in(base_dir: &Path, steps: Vec<StepName>) -> BuildPlan {
    BuildPlan {
        base_dir: base_dir.to_path_buf(),
        log_path: base_dir.join("tbox.log"),
        steps,
        commands: CommandOverrides::default(),
        step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
        checkout_dir: PathBuf::from("m2crypto"),
    }
}

/// Temporary base directory for a run, removed on drop.
///
/// The path is canonicalized so it matches what `pwd` prints in a child.
#[derive(Debug)]
pub struct TempBase {
    _dir: TempDir,
    path: PathBuf,
}

impl TempBase {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp base dir");
        let path = dir.path().canonicalize().expect("canonicalize temp base dir");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// [`plan_in`] rooted at this directory.
    pub fn plan(&self, steps: Vec<StepName>) -> BuildPlan {
        plan_in(&self.path, steps)
    }
}

impl Default for TempBase {
    fn default() -> Self {
        Self::new()
    }
}

/// Predetermined result for one executed step.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub exit_code: i32,
    pub output: String,
}

impl ScriptedStep {
    pub fn ok(output: &str) -> Self {
        Self::exit(0, output)
    }

    pub fn exit(exit_code: i32, output: &str) -> Self {
        Self {
            exit_code,
            output: output.to_string(),
        }
    }
}

/// One recorded executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub command: Vec<String>,
    pub workdir: PathBuf,
}

/// Executor that replays scripted steps in order. Once the script runs out
/// every further step succeeds silently.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    script: RefCell<VecDeque<ScriptedStep>>,
    calls: RefCell<Vec<ExecCall>>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<ScriptedStep>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn all_ok() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ExecCall> {
        self.calls.borrow().clone()
    }
}

impl StepExecutor for ScriptedExecutor {
    fn execute(&self, request: &StepRequest<'_>, log: &mut LogSink) -> Result<i32> {
        log.announce(request.command)?;
        self.calls.borrow_mut().push(ExecCall {
            command: request.command.tokens().to_vec(),
            workdir: request.workdir.to_path_buf(),
        });
        let step = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ScriptedStep::ok(""));
        log.write_raw(step.output.as_bytes())?;
        Ok(step.exit_code)
    }
}

/// A report handed to [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReport {
    pub from: String,
    pub to: String,
    pub message: Vec<u8>,
}

impl SentReport {
    /// Message decoded for assertions; invalid UTF-8 becomes U+FFFD.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.message).into_owned()
    }
}

/// Transport that records reports instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: RefCell<Vec<SentReport>>,
    failures_left: Cell<u32>,
}

impl RecordingTransport {
    /// Fail the next `count` sends with an envelope error.
    pub fn failing(count: u32) -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            failures_left: Cell::new(count),
        }
    }

    pub fn sent(&self) -> Vec<SentReport> {
        self.sent.borrow().clone()
    }
}

impl ReportTransport for RecordingTransport {
    fn send(&self, from: &str, to: &str, message: &[u8]) -> Result<(), TransportError> {
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(TransportError::Envelope("scripted failure".to_string()));
        }
        self.sent.borrow_mut().push(SentReport {
            from: from.to_string(),
            to: to.to_string(),
            message: message.to_vec(),
        });
        Ok(())
    }
}

/// Deterministic clock. Each `now()` returns the current instant and then
/// advances it by the tick (one second unless changed); `sleep` advances it
/// by the requested duration and records it.
#[derive(Debug)]
pub struct FakeClock {
    now: Cell<DateTime<Utc>>,
    tick_secs: Cell<i64>,
    sleeps: RefCell<Vec<Duration>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self {
            now: Cell::new(
                Utc.timestamp_opt(1_700_000_000, 0)
                    .single()
                    .expect("valid timestamp"),
            ),
            tick_secs: Cell::new(1),
            sleeps: RefCell::new(Vec::new()),
        }
    }
}

impl FakeClock {
    /// Change how far each `now()` call moves the clock; negative values
    /// simulate a wall clock stepping backwards.
    pub fn set_tick_secs(&self, secs: i64) {
        self.tick_secs.set(secs);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        let current = self.now.get();
        self.now
            .set(current + chrono::Duration::seconds(self.tick_secs.get()));
        current
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        let advance = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        self.now.set(self.now.get() + advance);
    }
}
