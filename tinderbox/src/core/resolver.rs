//! Step name to command resolution.

use serde::{Deserialize, Serialize};

use crate::core::types::{CommandSpec, StepName};
use crate::error::{Result, SlaveError};

/// Built-in commands. They assume a unix-like host where the default build
/// options work and all prerequisites are on `PATH`.
const DEFAULT_COMMANDS: &[(StepName, &[&str])] = &[
    (StepName::Uname, &["uname", "-a"]),
    (StepName::Swig, &["swig", "-version"]),
    (StepName::Cc, &["gcc", "--version"]),
    (StepName::Openssl, &["openssl", "version"]),
    (StepName::Python, &["python", "--version"]),
    (
        StepName::Checkout,
        &[
            "svn",
            "co",
            "http://svn.osafoundation.org/m2crypto/trunk",
            "m2crypto",
        ],
    ),
    (
        StepName::Build,
        &["python", "setup.py", "clean", "--all", "build"],
    ),
    (StepName::Test, &["python", "setup.py", "test"]),
];

/// Per-step command overrides (`[commands]` table).
///
/// Each value is a whitespace-separated command line. Empty or blank values
/// count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandOverrides {
    pub uname: Option<String>,
    pub swig: Option<String>,
    pub cc: Option<String>,
    pub openssl: Option<String>,
    pub python: Option<String>,
    #[serde(alias = "svn")]
    pub checkout: Option<String>,
    pub build: Option<String>,
    pub test: Option<String>,
}

impl CommandOverrides {
    /// Non-blank override for `step`, if any.
    pub fn get(&self, step: StepName) -> Option<&str> {
        let value = match step {
            StepName::Uname => &self.uname,
            StepName::Swig => &self.swig,
            StepName::Cc => &self.cc,
            StepName::Openssl => &self.openssl,
            StepName::Python => &self.python,
            StepName::Checkout => &self.checkout,
            StepName::Build => &self.build,
            StepName::Test => &self.test,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn set(&mut self, step: StepName, command: impl Into<String>) {
        let slot = match step {
            StepName::Uname => &mut self.uname,
            StepName::Swig => &mut self.swig,
            StepName::Cc => &mut self.cc,
            StepName::Openssl => &mut self.openssl,
            StepName::Python => &mut self.python,
            StepName::Checkout => &mut self.checkout,
            StepName::Build => &mut self.build,
            StepName::Test => &mut self.test,
        };
        *slot = Some(command.into());
    }
}

/// Built-in command for `step`, if the default table has one.
pub fn default_command(step: StepName) -> Option<CommandSpec> {
    DEFAULT_COMMANDS
        .iter()
        .find(|(name, _)| *name == step)
        .and_then(|(_, tokens)| CommandSpec::new(tokens.iter().copied()))
}

/// Resolve the command for `step`: the configured override if present,
/// otherwise the built-in default.
pub fn resolve(step: StepName, overrides: &CommandOverrides) -> Result<CommandSpec> {
    if let Some(cmd) = overrides.get(step).and_then(CommandSpec::split) {
        return Ok(cmd);
    }
    default_command(step)
        .ok_or_else(|| SlaveError::Config(format!("no command configured for step `{step}`")))
}
