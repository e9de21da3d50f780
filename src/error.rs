//! Crate-level error type.
//!
//! Every variant is fatal for the single request it belongs to. The
//! controller turns it into inline message content; nothing here is ever
//! retried.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    /// The backend answered with a non-2xx status.
    #[error("HTTP error! status: {status}")]
    Status { status: u16, url: String },

    /// The request could not be sent at all.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// The response carried no readable streaming body.
    #[error("response body is not readable")]
    MissingBody,

    /// The body failed after streaming had started.
    #[error("stream read failed: {0}")]
    Read(String),

    /// No bytes arrived within the configured idle window.
    #[error("no data received for {}s", .0.as_secs())]
    IdleTimeout(Duration),

    /// Bad or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// HTTP status code, when the failure was a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if let Some(status) = e.status() {
            StreamError::Status {
                status: status.as_u16(),
                url,
            }
        } else if e.is_body() || e.is_decode() {
            StreamError::Read(e.to_string())
        } else {
            StreamError::Connect {
                url,
                detail: e.to_string(),
            }
        }
    }
}
