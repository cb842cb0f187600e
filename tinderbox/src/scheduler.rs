//! Outer build → report → sleep loop.
//!
//! The loop is an explicit state machine so tests can drive it one phase or
//! one cycle at a time with a fake clock. In production it never stops; the
//! only way out is killing the process.

use std::time::Duration;

use tracing::{error, info};

use crate::build::{BuildPlan, run_build};
use crate::core::report::{ReportIdentity, render_report};
use crate::core::types::{BuildResult, BuildStatus};
use crate::error::Result;
use crate::io::clock::Clock;
use crate::io::executor::StepExecutor;
use crate::io::log_sink::read_log;
use crate::io::mail::ReportTransport;

/// Compose the report for `result`, reading the log artifact back from disk.
pub fn compose(result: &BuildResult, identity: &ReportIdentity) -> Result<Vec<u8>> {
    let log = read_log(&result.log_path)?;
    Ok(render_report(result, identity, &log))
}

/// Where the scheduler is within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Build,
    Report(BuildResult),
    Sleep,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// 1-indexed cycle number.
    pub cycle: u64,
    /// `None` when the run could not produce a result (log I/O failure).
    pub status: Option<BuildStatus>,
    /// Whether the report was handed to the transport successfully.
    pub reported: bool,
}

pub struct Scheduler<'a, E, T, C> {
    plan: &'a BuildPlan,
    identity: &'a ReportIdentity,
    executor: &'a E,
    transport: &'a T,
    clock: &'a C,
    delay: Duration,
    phase: Phase,
    current: CycleOutcome,
}

impl<'a, E: StepExecutor, T: ReportTransport, C: Clock> Scheduler<'a, E, T, C> {
    pub fn new(
        plan: &'a BuildPlan,
        identity: &'a ReportIdentity,
        executor: &'a E,
        transport: &'a T,
        clock: &'a C,
        delay: Duration,
    ) -> Self {
        Self {
            plan,
            identity,
            executor,
            transport,
            clock,
            delay,
            phase: Phase::Build,
            current: CycleOutcome {
                cycle: 1,
                status: None,
                reported: false,
            },
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Execute the current phase and move to the next one.
    ///
    /// Returns the cycle summary when a sleep completes a cycle.
    pub fn advance(&mut self) -> Option<CycleOutcome> {
        match std::mem::replace(&mut self.phase, Phase::Sleep) {
            Phase::Build => {
                info!(cycle = self.current.cycle, "starting build");
                match run_build(self.plan, self.executor, self.clock) {
                    Ok(result) => {
                        self.current.status = Some(result.status);
                        self.phase = Phase::Report(result);
                    }
                    Err(err) => {
                        error!(err = %err, "build aborted, skipping report");
                    }
                }
                None
            }
            Phase::Report(result) => {
                match self.report(&result) {
                    Ok(()) => self.current.reported = true,
                    Err(err) => error!(err = %err, status = %result.status, "report not sent"),
                }
                None
            }
            Phase::Sleep => {
                info!(delay_secs = self.delay.as_secs(), "sleeping until next build");
                self.clock.sleep(self.delay);
                self.phase = Phase::Build;
                let next = CycleOutcome {
                    cycle: self.current.cycle + 1,
                    status: None,
                    reported: false,
                };
                Some(std::mem::replace(&mut self.current, next))
            }
        }
    }

    /// Run one full cycle: build, report, sleep.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        loop {
            if let Some(outcome) = self.advance() {
                return outcome;
            }
        }
    }

    /// Run `cycles` full cycles, handing each summary to `on_cycle`.
    pub fn run_cycles<F: FnMut(&CycleOutcome)>(&mut self, cycles: u64, mut on_cycle: F) {
        for _ in 0..cycles {
            let outcome = self.run_cycle();
            on_cycle(&outcome);
        }
    }

    /// Loop forever.
    pub fn run_forever<F: FnMut(&CycleOutcome)>(&mut self, mut on_cycle: F) -> ! {
        loop {
            let outcome = self.run_cycle();
            on_cycle(&outcome);
        }
    }

    fn report(&self, result: &BuildResult) -> Result<()> {
        let message = compose(result, self.identity)?;
        self.transport
            .send(&self.identity.from, &self.identity.to, &message)?;
        info!(status = %result.status, to = %self.identity.to, "report delivered");
        Ok(())
    }
}
