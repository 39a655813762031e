//! Error types for Lookout.
//!
//! Library crates use [`LookoutError`] via `thiserror`.
//! App crates (lookout, mri-scanner) wrap this with `color-eyre`.

use std::path::PathBuf;

/// Top-level error type for all Lookout operations.
#[derive(Debug, thiserror::Error)]
pub enum LookoutError {
    /// Configuration loading or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Network/HTTP error while scraping or calling a remote API.
    #[error("network error: {0}")]
    Network(String),

    /// HTML, feed, or payload parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// LLM analysis error (request, API status, or response shape).
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Delivery to a notification channel failed.
    #[error("notification error ({channel}): {message}")]
    Notify { channel: String, message: String },

    /// Image decoding or model inference error.
    #[error("inference error: {0}")]
    Inference(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad target, invalid URL, etc.).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LookoutError>;

impl LookoutError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a notification error for `channel`.
    pub fn notify(channel: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Notify {
            channel: channel.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
