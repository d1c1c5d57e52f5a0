//! Shared async runtime and HTTP error type.
//!
//! Requests run on async reqwest, but callers are plain rayon worker threads,
//! so every call is driven through [`SHARED_RUNTIME`] with `block_on`.

use std::sync::LazyLock;

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// HTTP-level failure with optional status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(s) => write!(f, "HTTP {s}: {}", self.message),
            None => write!(f, "HTTP error: {}", self.message),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Create HTTP error from reqwest error, without the request URL
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connection failed"
        } else if e.is_decode() {
            "invalid response body"
        } else if e.is_status() {
            "non-success status"
        } else {
            "request failed"
        };
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: kind.to_string(),
        }
    }

    /// Non-success status with the (truncated) response body as message
    pub fn from_status(status: u16, body: &str) -> Self {
        let message: String = body.chars().take(200).collect();
        Self {
            status: Some(status),
            message,
        }
    }

    /// Rate limited or server-side failure
    pub fn is_server_side(&self) -> bool {
        matches!(self.status, Some(429) | Some(500..=599))
    }
}
