//! Shared deterministic types for the build loop.
//!
//! These types define stable contracts between the resolver, the build runner
//! and the report composer. They carry no I/O and serialize to the exact
//! strings the tinderbox dashboard expects.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named unit of work in a build run, in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Uname,
    Swig,
    Cc,
    Openssl,
    Python,
    /// Fetches the project sources. The only step allowed to move the run's
    /// working directory.
    #[serde(alias = "svn")]
    Checkout,
    Build,
    /// The designated test step; its failure classifies as `test_failed`.
    Test,
}

impl StepName {
    /// Every step, in the order a full run executes them.
    pub const ALL: [StepName; 8] = [
        StepName::Uname,
        StepName::Swig,
        StepName::Cc,
        StepName::Openssl,
        StepName::Python,
        StepName::Checkout,
        StepName::Build,
        StepName::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepName::Uname => "uname",
            StepName::Swig => "swig",
            StepName::Cc => "cc",
            StepName::Openssl => "openssl",
            StepName::Python => "python",
            StepName::Checkout => "checkout",
            StepName::Build => "build",
            StepName::Test => "test",
        }
    }

    pub fn is_test(self) -> bool {
        self == StepName::Test
    }

    pub fn is_checkout(self) -> bool {
        self == StepName::Checkout
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "svn" {
            return Ok(StepName::Checkout);
        }
        StepName::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown step `{s}`"))
    }
}

/// Program plus arguments for one step. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    tokens: Vec<String>,
}

impl CommandSpec {
    /// Build a command from explicit tokens. Returns `None` for an empty list.
    pub fn new<I, S>(tokens: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return None;
        }
        Some(Self { tokens })
    }

    /// Split a whitespace-delimited command line. No quoting is honoured.
    pub fn split(line: &str) -> Option<Self> {
        Self::new(line.split_whitespace())
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

/// Overall classification of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    BuildFailed,
    TestFailed,
}

impl BuildStatus {
    /// Status recorded when `step` is the first step to fail.
    pub fn for_failed_step(step: StepName) -> Self {
        if step.is_test() {
            BuildStatus::TestFailed
        } else {
            BuildStatus::BuildFailed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Success => "success",
            BuildStatus::BuildFailed => "build_failed",
            BuildStatus::TestFailed => "test_failed",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome of one full pass over the step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub log_path: PathBuf,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BuildStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_round_trip_through_from_str() {
        for step in StepName::ALL {
            assert_eq!(step.as_str().parse::<StepName>(), Ok(step));
        }
    }

    #[test]
    fn svn_is_an_alias_for_checkout() {
        assert_eq!("svn".parse::<StepName>(), Ok(StepName::Checkout));
        assert!("make".parse::<StepName>().is_err());
    }

    #[test]
    fn canonical_order_ends_with_checkout_build_test() {
        let tail: Vec<&str> = StepName::ALL[5..].iter().map(|s| s.as_str()).collect();
        assert_eq!(tail, vec!["checkout", "build", "test"]);
    }

    #[test]
    fn only_test_step_classifies_as_test_failed() {
        assert_eq!(
            BuildStatus::for_failed_step(StepName::Test),
            BuildStatus::TestFailed
        );
        for step in StepName::ALL.into_iter().filter(|s| !s.is_test()) {
            assert_eq!(BuildStatus::for_failed_step(step), BuildStatus::BuildFailed);
        }
    }

    #[test]
    fn command_spec_splits_on_any_whitespace() {
        let cmd = CommandSpec::split("  make \t all  -j4 ").expect("non-empty");
        assert_eq!(cmd.program(), "make");
        assert_eq!(cmd.args(), ["all".to_string(), "-j4".to_string()]);
        assert_eq!(cmd.to_string(), "make all -j4");
    }

    #[test]
    fn command_spec_rejects_blank_lines() {
        assert!(CommandSpec::split("   ").is_none());
        assert!(CommandSpec::new(Vec::<String>::new()).is_none());
    }

    #[test]
    fn status_strings_match_dashboard_values() {
        assert_eq!(BuildStatus::Success.to_string(), "success");
        assert_eq!(BuildStatus::BuildFailed.to_string(), "build_failed");
        assert_eq!(BuildStatus::TestFailed.to_string(), "test_failed");
    }
}
