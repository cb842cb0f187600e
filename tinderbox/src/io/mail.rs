//! Report delivery.
//!
//! [`SmtpTransport`] wraps the blocking `lettre` SMTP transport. The report
//! text already carries its own `From`/`To`/`Subject` headers, so it is sent
//! as a raw message with an explicit envelope.

use std::io::Write;

use lettre::address::{AddressError, Envelope};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Transport};
use tracing::{debug, info};

use crate::io::config::SmtpSettings;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// SMTP transport-level failure (connection, TLS, authentication, ...).
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The sender or recipient address could not be parsed.
    #[error("email address parse error: {0}")]
    Address(#[from] AddressError),

    /// The envelope could not be assembled.
    #[error("email envelope error: {0}")]
    Envelope(String),

    /// Writing the report to a local stream failed.
    #[error("report write error: {0}")]
    Io(#[from] std::io::Error),
}

/// Delivers a composed report. The message is raw bytes so the embedded log
/// reaches the dashboard unaltered.
pub trait ReportTransport {
    fn send(&self, from: &str, to: &str, message: &[u8]) -> Result<(), TransportError>;
}

/// Sends reports over SMTP with STARTTLS and login credentials.
pub struct SmtpTransport {
    settings: SmtpSettings,
}

impl SmtpTransport {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }
}

impl ReportTransport for SmtpTransport {
    fn send(&self, from: &str, to: &str, message: &[u8]) -> Result<(), TransportError> {
        let sender = from.parse::<Address>()?;
        let recipient = to.parse::<Address>()?;
        let envelope = Envelope::new(Some(sender), vec![recipient])
            .map_err(|e| TransportError::Envelope(e.to_string()))?;

        debug!(
            server = %self.settings.server,
            port = self.settings.port,
            "connecting to SMTP relay"
        );
        let mailer = lettre::SmtpTransport::starttls_relay(&self.settings.server)?
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.settings.user.clone(),
                self.settings.password.clone(),
            ))
            .build();
        mailer.send_raw(&envelope, &to_crlf(message))?;

        info!(to, bytes = message.len(), "report sent");
        Ok(())
    }
}

/// Writes reports to stdout instead of mailing them.
pub struct StdoutTransport;

impl ReportTransport for StdoutTransport {
    fn send(&self, _from: &str, _to: &str, message: &[u8]) -> Result<(), TransportError> {
        let mut out = std::io::stdout().lock();
        out.write_all(message)?;
        if !message.ends_with(b"\n") {
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Normalize line endings to CRLF as SMTP requires. Every other byte is
/// copied unchanged.
pub fn to_crlf(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 32);
    let mut prev = 0u8;
    for &byte in message {
        if byte == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(byte);
        prev = byte;
    }
    out
}
