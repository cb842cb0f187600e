//! Slave configuration stored in `config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::report::ReportIdentity;
use crate::core::resolver::CommandOverrides;
use crate::core::types::StepName;
use crate::error::{Result, SlaveError};

pub const DEFAULT_WAIT_SECS: u64 = 3600;
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Commented starting point written by `tinderbox-slave init`.
pub const SAMPLE_CONFIG: &str = r#"# Tinderbox build slave configuration.
#
# Wait at least 6 minutes after the last build before starting the next one;
# the dashboard is shared infrastructure.

[build]
# Identify your build slave, for example "Ubuntu 24.04 x86_64".
name = "unnamed build slave"
# tree = "M2Crypto"
# wait = 3600
# step_timeout_secs = 120
# checkout_dir = "m2crypto"
# log_file = "tbox.log"
# steps = ["uname", "swig", "cc", "openssl", "python", "checkout", "build", "test"]

[commands]
# uname = "uname -a"
# swig = "swig -version"
# cc = "gcc --version"
# openssl = "openssl version"
# python = "python --version"
# checkout = "svn co http://svn.osafoundation.org/m2crypto/trunk m2crypto"
# build = "python setup.py clean --all build"
# test = "python setup.py test"

[email]
from = ""
to = ""
server = ""
# port = 587
user = ""
password = ""
"#;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlaveConfig {
    pub build: BuildConfig,
    pub commands: CommandOverrides,
    pub email: EmailConfig,
}

/// `[build]` table: identity and run shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Human-readable name of this build slave.
    pub name: String,
    /// Tree (project) name shown on the dashboard.
    pub tree: String,
    /// Seconds to sleep between runs. Kept raw so a malformed value can fall
    /// back to the default instead of rejecting the whole file.
    pub wait: Option<toml::Value>,
    pub step_timeout_secs: u64,
    /// Directory created by the checkout step, relative to the base directory.
    pub checkout_dir: PathBuf,
    pub log_file: PathBuf,
    pub steps: Option<Vec<StepName>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            tree: "M2Crypto".to_string(),
            wait: None,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            checkout_dir: PathBuf::from("m2crypto"),
            log_file: PathBuf::from("tbox.log"),
            steps: None,
        }
    }
}

impl BuildConfig {
    /// Inter-run delay. Absent, negative or non-numeric values yield the
    /// default.
    pub fn wait(&self) -> Duration {
        let secs = match &self.wait {
            None => DEFAULT_WAIT_SECS,
            Some(toml::Value::Integer(n)) if *n >= 0 => *n as u64,
            Some(toml::Value::String(s)) if s.trim().is_empty() => DEFAULT_WAIT_SECS,
            Some(toml::Value::String(s)) => match s.trim().parse::<u64>() {
                Ok(n) => n,
                Err(_) => {
                    warn!(wait = %s, default = DEFAULT_WAIT_SECS, "malformed wait, using default");
                    DEFAULT_WAIT_SECS
                }
            },
            Some(other) => {
                warn!(wait = %other, default = DEFAULT_WAIT_SECS, "malformed wait, using default");
                DEFAULT_WAIT_SECS
            }
        };
        Duration::from_secs(secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Steps to run, in order.
    pub fn steps(&self) -> Vec<StepName> {
        self.steps.clone().unwrap_or_else(|| StepName::ALL.to_vec())
    }
}

/// `[email]` table: report transport settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    pub from: String,
    pub to: String,
    pub server: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
}

/// Validated SMTP settings; every field is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl EmailConfig {
    /// Check that every field needed to send mail is set.
    pub fn smtp_settings(&self) -> Result<SmtpSettings> {
        let missing: Vec<&str> = [
            ("from", &self.from),
            ("to", &self.to),
            ("server", &self.server),
            ("user", &self.user),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();
        if !missing.is_empty() {
            return Err(SlaveError::Config(format!(
                "missing [email] fields: {}",
                missing.join(", ")
            )));
        }
        Ok(SmtpSettings {
            server: self.server.trim().to_string(),
            port: self.port.unwrap_or(DEFAULT_SMTP_PORT),
            user: self.user.clone(),
            password: self.password.clone(),
        })
    }
}

impl SlaveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.build.step_timeout_secs == 0 {
            return Err(SlaveError::Config(
                "build.step_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.build.log_file.as_os_str().is_empty() {
            return Err(SlaveError::Config("build.log_file must be set".to_string()));
        }
        if self.build.steps.as_ref().is_some_and(Vec::is_empty) {
            return Err(SlaveError::Config(
                "build.steps must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Identity stamped into reports. Requires `[build] name`.
    pub fn report_identity(&self) -> Result<ReportIdentity> {
        let build_name = self.build.name.trim();
        if build_name.is_empty() {
            return Err(SlaveError::Config("missing [build] name".to_string()));
        }
        Ok(ReportIdentity {
            from: self.email.from.trim().to_string(),
            to: self.email.to.trim().to_string(),
            tree: self.build.tree.clone(),
            build_name: build_name.to_string(),
        })
    }
}

/// Parse config from TOML text.
pub fn parse_config(contents: &str) -> Result<SlaveConfig> {
    let cfg: SlaveConfig =
        toml::from_str(contents).map_err(|e| SlaveError::Config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SlaveConfig::default()`.
pub fn load_config(path: &Path) -> Result<SlaveConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        return Ok(SlaveConfig::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| SlaveError::Config(format!("read {}: {e}", path.display())))?;
    parse_config(&contents).map_err(|e| match e {
        SlaveError::Config(msg) => SlaveError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Write [`SAMPLE_CONFIG`] unless the file exists and `force` is unset.
///
/// Returns whether the file was written.
pub fn write_sample_config(path: &Path, force: bool) -> std::io::Result<bool> {
    if !force && path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, SAMPLE_CONFIG)?;
    fs::rename(&tmp_path, path)?;
    Ok(true)
}
