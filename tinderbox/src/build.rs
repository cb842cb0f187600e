//! Orchestration for a single build run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::core::resolver::{CommandOverrides, resolve};
use crate::core::types::{BuildResult, BuildStatus, StepName};
use crate::error::Result;
use crate::io::clock::Clock;
use crate::io::config::SlaveConfig;
use crate::io::executor::{StepExecutor, StepRequest};
use crate::io::log_sink::{LogSink, MARKER};
use crate::io::process::UNKNOWN_EXIT_CODE;

/// Everything a run needs, fixed before the loop starts.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Directory every run starts in.
    pub base_dir: PathBuf,
    pub log_path: PathBuf,
    pub steps: Vec<StepName>,
    pub commands: CommandOverrides,
    pub step_timeout: Duration,
    /// Project directory created by the checkout step, relative to `base_dir`.
    pub checkout_dir: PathBuf,
}

impl BuildPlan {
    pub fn from_config(config: &SlaveConfig, base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            log_path: base_dir.join(&config.build.log_file),
            steps: config.build.steps(),
            commands: config.commands.clone(),
            step_timeout: config.build.step_timeout(),
            checkout_dir: config.build.checkout_dir.clone(),
        }
    }
}

/// Exit code of the step that stopped a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepOutcome {
    step: StepName,
    exit_code: i32,
}

/// Run every step of `plan` in order, stopping at the first failure.
///
/// The working directory is per-run state: it starts at `plan.base_dir`,
/// moves into the checkout directory after a successful checkout, and is
/// discarded when the run ends. A checkout that exits 0 without leaving that
/// directory behind fails the run. Only log I/O failures are returned as errors.
#[instrument(skip_all, fields(steps = plan.steps.len()))]
pub fn run_build<E: StepExecutor, C: Clock>(
    plan: &BuildPlan,
    executor: &E,
    clock: &C,
) -> Result<BuildResult> {
    let start_time = clock.now();
    let mut log = LogSink::create(&plan.log_path)?;
    let mut workdir = plan.base_dir.clone();
    let mut failed: Option<StepOutcome> = None;

    for &step in &plan.steps {
        let command = match resolve(step, &plan.commands) {
            Ok(command) => command,
            Err(err) => {
                warn!(%step, err = %err, "step has no command");
                log.line(&format!("{MARKER} {err}"))?;
                failed = Some(StepOutcome {
                    step,
                    exit_code: UNKNOWN_EXIT_CODE,
                });
                break;
            }
        };

        info!(%step, workdir = %workdir.display(), "starting step");
        let exit_code = executor.execute(
            &StepRequest {
                command: &command,
                workdir: &workdir,
                timeout: plan.step_timeout,
            },
            &mut log,
        )?;

        if exit_code != 0 {
            log.line(&format!("{MARKER} error exit code = {exit_code}"))?;
            failed = Some(StepOutcome { step, exit_code });
            break;
        }
        if step.is_checkout() {
            let project = plan.base_dir.join(&plan.checkout_dir);
            if !project.is_dir() {
                warn!(path = %project.display(), "checkout directory missing");
                log.line(&format!(
                    "{MARKER} checkout directory {} missing",
                    project.display()
                ))?;
                failed = Some(StepOutcome {
                    step,
                    exit_code: UNKNOWN_EXIT_CODE,
                });
                break;
            }
            workdir = project;
        }
    }

    let status = match failed {
        Some(outcome) => {
            warn!(step = %outcome.step, exit_code = outcome.exit_code, "step failed, stopping run");
            BuildStatus::for_failed_step(outcome.step)
        }
        None => BuildStatus::Success,
    };

    let end_time = clock.now().max(start_time);
    let log_path = log.close()?;
    info!(%status, "build finished");

    Ok(BuildResult {
        log_path,
        start_time,
        end_time,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::log_sink::read_log;
    use crate::test_support::{FakeClock, ScriptedExecutor, ScriptedStep, TempBase, plan_in};
    use std::fs;

    #[test]
    fn all_zero_exits_is_success() {
        let base = TempBase::new();
        fs::create_dir(base.path().join("m2crypto")).expect("project dir");
        let plan = base.plan(StepName::ALL.to_vec());
        let executor = ScriptedExecutor::all_ok();
        let clock = FakeClock::default();

        let result = run_build(&plan, &executor, &clock).expect("build");

        assert_eq!(result.status, BuildStatus::Success);
        assert_eq!(executor.calls().len(), StepName::ALL.len());
        assert_eq!(result.log_path, plan.log_path);
    }

    #[test]
    fn failing_non_test_step_stops_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let plan = plan_in(
            temp.path(),
            vec![StepName::Uname, StepName::Cc, StepName::Build, StepName::Test],
        );
        let executor = ScriptedExecutor::new(vec![
            ScriptedStep::ok("Linux\n"),
            ScriptedStep::exit(2, "gcc: not found\n"),
        ]);

        let result = run_build(&plan, &executor, &FakeClock::default()).expect("build");

        assert_eq!(result.status, BuildStatus::BuildFailed);
        assert_eq!(executor.calls().len(), 2, "no step after cc may run");
        let log = read_log(&result.log_path).expect("read log");
        assert!(
            log.ends_with(b"*** gcc --version\ngcc: not found\n*** error exit code = 2\n"),
            "{}",
            String::from_utf8_lossy(&log)
        );
    }

    #[test]
    fn failing_test_step_is_test_failed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let plan = plan_in(temp.path(), vec![StepName::Build, StepName::Test]);
        let executor = ScriptedExecutor::new(vec![ScriptedStep::ok(""), ScriptedStep::exit(1, "")]);

        let result = run_build(&plan, &executor, &FakeClock::default()).expect("build");

        assert_eq!(result.status, BuildStatus::TestFailed);
    }

    #[test]
    fn checkout_moves_later_steps_into_project_dir() {
        let base = TempBase::new();
        let project = base.path().join("m2crypto");
        fs::create_dir(&project).expect("project dir");
        let plan = base.plan(vec![
            StepName::Uname,
            StepName::Checkout,
            StepName::Build,
            StepName::Test,
        ]);
        let executor = ScriptedExecutor::all_ok();

        run_build(&plan, &executor, &FakeClock::default()).expect("build");

        let workdirs: Vec<PathBuf> = executor.calls().into_iter().map(|c| c.workdir).collect();
        assert_eq!(
            workdirs,
            vec![
                base.path().to_path_buf(),
                base.path().to_path_buf(),
                project.clone(),
                project
            ]
        );
    }

    #[test]
    fn next_run_starts_from_base_dir_again() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("m2crypto")).expect("project dir");
        let plan = plan_in(temp.path(), vec![StepName::Checkout, StepName::Build]);
        let executor = ScriptedExecutor::all_ok();
        let clock = FakeClock::default();

        run_build(&plan, &executor, &clock).expect("first");
        run_build(&plan, &executor, &clock).expect("second");

        let calls = executor.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[2].workdir, temp.path());
        assert_eq!(calls[3].workdir, temp.path().join("m2crypto"));
    }

    #[test]
    fn failed_checkout_stops_before_build() {
        let temp = tempfile::tempdir().expect("tempdir");
        let plan = plan_in(temp.path(), vec![StepName::Checkout, StepName::Build]);
        let executor = ScriptedExecutor::new(vec![ScriptedStep::exit(1, "svn: E170013\n")]);

        let result = run_build(&plan, &executor, &FakeClock::default()).expect("build");

        assert_eq!(result.status, BuildStatus::BuildFailed);
        assert_eq!(executor.calls().len(), 1);
    }

    #[test]
    fn checkout_without_project_dir_fails_the_run() {
        let base = TempBase::new();
        let plan = base.plan(vec![StepName::Checkout, StepName::Build]);
        let executor = ScriptedExecutor::all_ok();

        let result = run_build(&plan, &executor, &FakeClock::default()).expect("build");

        assert_eq!(result.status, BuildStatus::BuildFailed);
        assert_eq!(executor.calls().len(), 1, "build must not run");
        let log = String::from_utf8(read_log(&result.log_path).expect("read log")).expect("utf-8");
        let expected = format!(
            "*** checkout directory {} missing\n",
            base.path().join("m2crypto").display()
        );
        assert!(log.ends_with(&expected), "{log}");
    }

    #[test]
    fn overrides_reach_the_executor() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut plan = plan_in(temp.path(), vec![StepName::Build]);
        plan.commands.set(StepName::Build, "make all");
        let executor = ScriptedExecutor::all_ok();

        run_build(&plan, &executor, &FakeClock::default()).expect("build");

        assert_eq!(executor.calls()[0].command, vec!["make", "all"]);
    }

    #[test]
    fn end_time_never_precedes_start_time() {
        let temp = tempfile::tempdir().expect("tempdir");
        let plan = plan_in(temp.path(), vec![StepName::Uname]);
        let clock = FakeClock::default();
        clock.set_tick_secs(-30);

        let result = run_build(&plan, &ScriptedExecutor::all_ok(), &clock).expect("build");

        assert!(result.start_time <= result.end_time);
    }

    #[test]
    fn unwritable_log_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut plan = plan_in(temp.path(), vec![StepName::Uname]);
        plan.log_path = temp.path().join("missing-dir/tbox.log");
        let executor = ScriptedExecutor::all_ok();

        let err = run_build(&plan, &executor, &FakeClock::default()).unwrap_err();

        assert!(matches!(err, crate::error::SlaveError::LogIo { .. }));
        assert!(executor.calls().is_empty());
    }
}
