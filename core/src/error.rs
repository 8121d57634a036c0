//! Error types for raven-tree.
//!
//! # Design
//! Failures before any I/O (URL, body, method) get their own variants so
//! callers can tell a bad `Options` value from a network problem. Transport
//! failures are split into `Timeout`, `Cancelled`, `Connection` and a
//! catch-all `Transport`; `is_timeout` / `is_transport` cover the common
//! branches.

use std::io;

use thiserror::Error;

/// Errors returned by `RavenTree::send_raven` and the response wrapper.
#[derive(Debug, Error)]
pub enum RavenError {
    /// The host or the path could not be parsed as a URL / URL reference.
    #[error("invalid url {input:?}: {reason}")]
    InvalidUrl { input: String, reason: String },

    /// The request body has no JSON representation.
    #[error("body encoding failed: {0}")]
    BodyEncoding(#[source] serde_json::Error),

    /// The outbound request could not be constructed (bad method, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The configured timeout or the context deadline was exceeded.
    #[error("request timeout: deadline exceeded")]
    Timeout,

    /// The context was cancelled before the exchange completed.
    #[error("request cancelled")]
    Cancelled,

    /// The remote end could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other failure reported by the underlying client.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body is not valid JSON for the requested type.
    #[error("body decoding failed: {0}")]
    BodyDecoding(#[source] serde_json::Error),
}

impl RavenError {
    pub(crate) fn invalid_url(input: &str, reason: impl ToString) -> Self {
        RavenError::InvalidUrl {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True when the error came from an exceeded timeout or deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RavenError::Timeout)
    }

    /// True for failures of the exchange itself, which a transport may retry.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RavenError::Timeout | RavenError::Connection(_) | RavenError::Transport(_)
        )
    }
}

impl From<ureq::Error> for RavenError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(_) => RavenError::Timeout,
            ureq::Error::Io(io_err) => from_io(io_err),
            ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
                RavenError::Connection(err.to_string())
            }
            ureq::Error::BadUri(reason) => RavenError::InvalidRequest(reason),
            ureq::Error::Http(http_err) => RavenError::InvalidRequest(http_err.to_string()),
            other => RavenError::Transport(other.to_string()),
        }
    }
}

fn from_io(err: io::Error) -> RavenError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => RavenError::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => RavenError::Connection(err.to_string()),
        _ => RavenError::Transport(err.to_string()),
    }
}
