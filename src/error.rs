//! Exit codes and structured error output.

use serde::Serialize;

use crate::fetch::BatchStats;

/// Exit codes for capsearch.
///
/// - 0: Success (search completed, matches found)
/// - 1: General error (unexpected failure, missing data folder)
/// - 2: No matches (search completed, nothing matched)
/// - 3: Partial success (some files have no description or were not cached)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed and produced results.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Completed but nothing matched.
    NoMatches = 2,
    /// Completed, but some files could not be described or persisted.
    PartialSuccess = 3,
    /// Interrupted by Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "CS000",
            Self::GeneralError => "CS001",
            Self::NoMatches => "CS002",
            Self::PartialSuccess => "CS003",
            Self::Interrupted => "CS130",
        }
    }

    /// Exit code for a finished batch.
    ///
    /// Interruption wins, then any per-file failure, then whether anything
    /// was found.
    #[must_use]
    pub fn for_batch(stats: &BatchStats, found_any: bool) -> Self {
        if stats.interrupted > 0 {
            Self::Interrupted
        } else if stats.has_failures() {
            Self::PartialSuccess
        } else if found_any {
            Self::Success
        } else {
            Self::NoMatches
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "CS001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
