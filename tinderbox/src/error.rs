//! Error types that may escape a run.
//!
//! Step failures and timeouts never appear here: they are absorbed into
//! [`BuildStatus`](crate::core::types::BuildStatus) by the build runner.

use std::path::PathBuf;

use crate::io::mail::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum SlaveError {
    /// Missing or malformed configuration, or a step without any command.
    #[error("configuration error: {0}")]
    Config(String),

    /// The build log could not be written or read back.
    #[error("log I/O error on {}: {source}", path.display())]
    LogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report could not be delivered.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SlaveError {
    pub fn log_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SlaveError::LogIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = SlaveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_io_display_names_the_path() {
        let err = SlaveError::log_io(
            "/tmp/tbox.log",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "log I/O error on /tmp/tbox.log: gone");
    }

    #[test]
    fn config_display() {
        let err = SlaveError::Config("missing [build] name".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: missing [build] name"
        );
    }
}
