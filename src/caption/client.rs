//! Bounded-retry wrapper around a [`CaptionBackend`].

use std::sync::Arc;

use super::CaptionBackend;
use crate::cache::{Description, FileKey};

/// Attempts per file before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Result of asking the client for a description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeOutcome {
    /// The service produced a description.
    Described(Description),
    /// Every attempt failed, or the failure was not worth retrying.
    Unavailable {
        /// Number of backend calls made
        attempts: u32,
        /// Message of the last error
        last_error: String,
    },
}

impl DescribeOutcome {
    /// The description, if one was produced.
    #[must_use]
    pub fn into_description(self) -> Option<Description> {
        match self {
            Self::Described(d) => Some(d),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Client that retries transient caption failures up to a fixed bound.
#[derive(Clone)]
pub struct CaptionClient {
    backend: Arc<dyn CaptionBackend>,
    max_attempts: u32,
}

impl std::fmt::Debug for CaptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionClient")
            .field("backend", &self.backend.name())
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl CaptionClient {
    /// Wrap `backend`, allowing at most `max_attempts` calls per file
    /// (clamped to at least one).
    #[must_use]
    pub fn new(backend: Arc<dyn CaptionBackend>, max_attempts: u32) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Configured attempt bound.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Describe `key`, retrying transient failures.
    ///
    /// Never returns an error: running out of attempts is reported as
    /// [`DescribeOutcome::Unavailable`].
    pub fn describe(&self, key: &FileKey) -> DescribeOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.backend.caption(key) {
                Ok(text) => {
                    log::debug!(
                        "[{}] described {} on attempt {}",
                        self.backend.name(),
                        key,
                        attempts
                    );
                    return DescribeOutcome::Described(Description::new(text));
                }
                Err(e) => {
                    log::warn!(
                        "Attempt {}/{}: error describing {}: {}",
                        attempts,
                        self.max_attempts,
                        key,
                        e
                    );
                    if !e.is_transient() || attempts >= self.max_attempts {
                        return DescribeOutcome::Unavailable {
                            attempts,
                            last_error: e.to_string(),
                        };
                    }
                }
            }
        }
    }
}
