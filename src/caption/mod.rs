//! Captioning service boundary.
//!
//! This module separates *one attempt* at describing a file from the retry
//! policy wrapped around it:
//!
//! * [`CaptionBackend`]: a single call to whatever service produces text for a
//!   file. Implementations never retry and never touch the cache.
//! * [`CaptionClient`]: wraps a backend with a bounded number of attempts and
//!   turns exhausted retries into [`DescribeOutcome::Unavailable`].
//! * [`ollama`]: the HTTP backend for a local Ollama vision model.

pub mod client;
pub mod ollama;

use std::path::PathBuf;

use crate::cache::FileKey;

pub use client::{CaptionClient, DescribeOutcome, DEFAULT_MAX_ATTEMPTS};
pub use ollama::{OllamaBackend, OllamaConfig};

/// Errors from a single caption attempt.
#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    /// The input file could not be read.
    #[error("Failed to read {path}: {source}")]
    ReadInput {
        /// File that failed to read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The request never produced a response (connection, timeout, TLS).
    #[error("Request to captioning service failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("Captioning service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The response could not be interpreted.
    #[error("Malformed response from captioning service: {0}")]
    MalformedResponse(String),

    /// The service answered with an empty description.
    #[error("Captioning service returned an empty description")]
    EmptyDescription,
}

impl CaptionError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Everything except a missing or unreadable input file is retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::ReadInput { .. })
    }
}

/// One attempt at describing a file.
pub trait CaptionBackend: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Produce a description for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptionError`] for any failure of this single attempt.
    fn caption(&self, key: &FileKey) -> Result<String, CaptionError>;
}
