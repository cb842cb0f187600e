//! Tinderbox build slave.
//!
//! Runs the configured build steps, mails a tinderbox report, sleeps, and
//! repeats until the process is killed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tinderbox::build::{BuildPlan, run_build};
use tinderbox::core::report::ReportIdentity;
use tinderbox::core::resolver::resolve;
use tinderbox::io::clock::SystemClock;
use tinderbox::io::config::{SlaveConfig, load_config, write_sample_config};
use tinderbox::io::executor::ProcessExecutor;
use tinderbox::io::mail::{ReportTransport, SmtpTransport, StdoutTransport};
use tinderbox::logging;
use tinderbox::scheduler::{Scheduler, compose};

#[derive(Parser)]
#[command(
    name = "tinderbox-slave",
    version,
    about = "Unattended build-and-report loop for a tinderbox dashboard"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a commented sample configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the configuration and print the resolved step commands.
    Check,
    /// Run one build and print its report instead of mailing it.
    Build,
    /// Build, report and sleep forever.
    Run {
        /// Print each report to stdout instead of mailing it.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Check => cmd_check(&cli.config),
        Command::Build => cmd_build(&cli.config),
        Command::Run { dry_run } => cmd_run(&cli.config, dry_run),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if write_sample_config(path, force).with_context(|| format!("write {}", path.display()))? {
        println!("wrote {}", path.display());
    } else {
        println!("{} exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let config = load(path)?;
    config.report_identity()?;
    for step in config.build.steps() {
        let command = resolve(step, &config.commands)?;
        println!("{step:<9} {command}");
    }
    println!("wait      {}s", config.build.wait().as_secs());
    println!("timeout   {}s", config.build.step_timeout().as_secs());
    match config.email.smtp_settings() {
        Ok(smtp) => println!("mail      {}:{} -> {}", smtp.server, smtp.port, config.email.to),
        Err(err) => println!("mail      disabled ({err})"),
    }
    Ok(())
}

fn cmd_build(path: &Path) -> Result<()> {
    let config = load(path)?;
    let identity = config.report_identity()?;
    let plan = BuildPlan::from_config(&config, &base_dir()?);
    let result = run_build(&plan, &ProcessExecutor, &SystemClock)?;
    let report = compose(&result, &identity)?;
    StdoutTransport.send(&identity.from, &identity.to, &report)?;
    Ok(())
}

fn cmd_run(path: &Path, dry_run: bool) -> Result<()> {
    let config = load(path)?;
    let identity = config.report_identity()?;
    let plan = BuildPlan::from_config(&config, &base_dir()?);
    // Read once; edits to the file take effect on restart only.
    let delay = config.build.wait();

    info!(
        steps = plan.steps.len(),
        delay_secs = delay.as_secs(),
        dry_run,
        "starting build loop"
    );
    if dry_run {
        run_loop(&plan, &identity, &StdoutTransport, delay)
    } else {
        let transport = SmtpTransport::new(config.email.smtp_settings()?);
        run_loop(&plan, &identity, &transport, delay)
    }
}

fn run_loop<T: ReportTransport>(
    plan: &BuildPlan,
    identity: &ReportIdentity,
    transport: &T,
    delay: Duration,
) -> ! {
    let executor = ProcessExecutor;
    let clock = SystemClock;
    let mut scheduler = Scheduler::new(plan, identity, &executor, transport, &clock, delay);
    scheduler.run_forever(|outcome| {
        info!(
            cycle = outcome.cycle,
            status = ?outcome.status,
            reported = outcome.reported,
            "cycle complete"
        );
    })
}

fn load(path: &Path) -> Result<SlaveConfig> {
    load_config(path).with_context(|| format!("load {}", path.display()))
}

fn base_dir() -> Result<PathBuf> {
    std::env::current_dir().context("resolve current directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["tinderbox-slave", "run"]);
        assert!(matches!(cli.command, Command::Run { dry_run: false }));
        assert_eq!(cli.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["tinderbox-slave", "run", "--dry-run", "-c", "slave.toml"]);
        assert!(matches!(cli.command, Command::Run { dry_run: true }));
        assert_eq!(cli.config, PathBuf::from("slave.toml"));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["tinderbox-slave", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }
}
