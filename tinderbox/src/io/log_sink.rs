//! Append-only build log (`tbox.log`).
//!
//! The log is the product artifact of a run and is embedded verbatim in the
//! report. Child processes write into the same open file, so their output
//! lands between our `***` lines in emission order.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::debug;

use crate::core::types::CommandSpec;
use crate::error::{Result, SlaveError};

/// Marker prefix for lines written by the slave itself.
pub const MARKER: &str = "***";

#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Truncate or create the log at `path` and open it for appending.
    pub fn create(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "opening build log");
        File::create(path).map_err(|e| SlaveError::log_io(path, e))?;
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| SlaveError::log_io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line written by the slave (a newline is added).
    pub fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.file, "{text}").map_err(|e| SlaveError::log_io(&self.path, e))
    }

    /// Announce the command about to run: `*** <token> <token> …`.
    pub fn announce(&mut self, command: &CommandSpec) -> Result<()> {
        self.line(&format!("{MARKER} {command}"))
    }

    /// Append raw bytes without adding a newline.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .map_err(|e| SlaveError::log_io(&self.path, e))
    }

    /// Handles for a child's stdout and stderr that write into this log.
    pub fn child_stdio(&mut self) -> Result<(Stdio, Stdio)> {
        self.file
            .flush()
            .map_err(|e| SlaveError::log_io(&self.path, e))?;
        let stdout = self
            .file
            .try_clone()
            .map_err(|e| SlaveError::log_io(&self.path, e))?;
        let stderr = self
            .file
            .try_clone()
            .map_err(|e| SlaveError::log_io(&self.path, e))?;
        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }

    /// Flush to disk and return the artifact path.
    pub fn close(mut self) -> Result<PathBuf> {
        self.file
            .flush()
            .and_then(|()| self.file.sync_all())
            .map_err(|e| SlaveError::log_io(&self.path, e))?;
        debug!(path = %self.path.display(), "closed build log");
        Ok(self.path)
    }
}

/// Read a closed log back for the report. Bytes are returned as written;
/// child output need not be UTF-8.
pub fn read_log(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| SlaveError::log_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_truncates_previous_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tbox.log");
        fs::write(&path, "stale output\n").expect("seed");

        let mut sink = LogSink::create(&path).expect("create");
        sink.line("fresh").expect("line");
        let closed = sink.close().expect("close");

        assert_eq!(closed, path);
        assert_eq!(read_log(&path).expect("read"), b"fresh\n");
    }

    #[test]
    fn announce_joins_tokens() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tbox.log");
        let mut sink = LogSink::create(&path).expect("create");
        let cmd = CommandSpec::split("python setup.py test").expect("cmd");
        sink.announce(&cmd).expect("announce");
        sink.write_raw(b"ok").expect("raw");
        sink.close().expect("close");

        assert_eq!(
            read_log(&path).expect("read"),
            b"*** python setup.py test\nok"
        );
    }

    #[test]
    fn raw_bytes_survive_the_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tbox.log");
        let mut sink = LogSink::create(&path).expect("create");
        sink.write_raw(b"caf\xe9\n").expect("raw");
        sink.close().expect("close");

        assert_eq!(read_log(&path).expect("read"), b"caf\xe9\n");
    }

    #[test]
    fn create_in_missing_directory_is_log_io_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = LogSink::create(&temp.path().join("nope/tbox.log")).unwrap_err();
        assert!(matches!(err, SlaveError::LogIo { .. }));
    }

    #[test]
    fn read_missing_log_is_log_io_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_log(&temp.path().join("gone.log")).unwrap_err();
        assert!(matches!(err, SlaveError::LogIo { .. }));
    }
}
