//! Tinderbox report rendering.
//!
//! Field labels and their order are parsed by the dashboard; keep them
//! byte-stable.

use crate::core::types::BuildResult;

/// Tag telling the dashboard how to highlight errors in the log.
pub const ERROR_PARSER: &str = "unix";

/// Static identity fields stamped into every report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportIdentity {
    pub from: String,
    pub to: String,
    pub tree: String,
    pub build_name: String,
}

/// Render the report header block followed by the log bytes, unmodified.
///
/// Step output is not required to be UTF-8, so the report is a byte buffer.
pub fn render_report(result: &BuildResult, identity: &ReportIdentity, log: &[u8]) -> Vec<u8> {
    let mut msg = String::with_capacity(512);
    msg.push_str(&format!("From: {}\n", identity.from));
    msg.push_str(&format!("To: {}\n", identity.to));
    msg.push_str(&format!("Subject: tree: {}\n", identity.tree));
    msg.push_str("\n\n");
    msg.push_str(&format!("tinderbox: tree: {}\n", identity.tree));
    msg.push_str(&format!(
        "tinderbox: starttime: {}\n",
        result.start_time.timestamp()
    ));
    msg.push_str(&format!(
        "tinderbox: timenow: {}\n",
        result.end_time.timestamp()
    ));
    msg.push_str(&format!("tinderbox: status: {}\n", result.status));
    msg.push_str(&format!("tinderbox: buildname: {}\n", identity.build_name));
    msg.push_str(&format!("tinderbox: errorparser: {ERROR_PARSER}\n"));
    msg.push_str("tinderbox: END\n");
    msg.push('\n');
    let mut report = msg.into_bytes();
    report.extend_from_slice(log);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BuildStatus;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn identity() -> ReportIdentity {
        ReportIdentity {
            from: "slave@example.org".to_string(),
            to: "tinderbox@example.org".to_string(),
            tree: "M2Crypto".to_string(),
            build_name: "Debian x86_64".to_string(),
        }
    }

    fn result(status: BuildStatus) -> BuildResult {
        BuildResult {
            log_path: PathBuf::from("tbox.log"),
            start_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            end_time: Utc.timestamp_opt(1_700_000_042, 0).unwrap(),
            status,
        }
    }

    #[test]
    fn renders_exact_layout() {
        let log = b"*** uname -a\nLinux box\n";
        let report = render_report(&result(BuildStatus::Success), &identity(), log);
        let expected = "From: slave@example.org\n\
                        To: tinderbox@example.org\n\
                        Subject: tree: M2Crypto\n\
                        \n\
                        \n\
                        tinderbox: tree: M2Crypto\n\
                        tinderbox: starttime: 1700000000\n\
                        tinderbox: timenow: 1700000042\n\
                        tinderbox: status: success\n\
                        tinderbox: buildname: Debian x86_64\n\
                        tinderbox: errorparser: unix\n\
                        tinderbox: END\n\
                        \n\
                        *** uname -a\n\
                        Linux box\n";
        assert_eq!(String::from_utf8(report).expect("utf-8"), expected);
    }

    #[test]
    fn log_is_appended_verbatim_after_blank_line() {
        let log = b"no trailing newline\r\n\tand tabs";
        let report = render_report(&result(BuildStatus::TestFailed), &identity(), log);
        assert!(report.ends_with(b"tinderbox: END\n\nno trailing newline\r\n\tand tabs"));
        let text = String::from_utf8_lossy(&report);
        assert!(text.contains("tinderbox: status: test_failed\n"));
    }

    #[test]
    fn non_utf8_log_bytes_pass_through() {
        let log = b"*** gcc --version\ncaf\xe9\n";
        let report = render_report(&result(BuildStatus::BuildFailed), &identity(), log);
        assert!(report.ends_with(b"tinderbox: END\n\n*** gcc --version\ncaf\xe9\n"));
    }
}
