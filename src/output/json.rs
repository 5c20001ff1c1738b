//! JSON output for search and describe runs.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "query": "dragon",
//!   "matches": [
//!     { "key": "./data/a.png", "label": "a", "description": "A red dragon tattoo" }
//!   ],
//!   "unavailable": ["./data/broken.png"],
//!   "summary": {
//!     "requested": 2,
//!     "cache_hits": 1,
//!     "fetched": 0,
//!     "unpersisted": 0,
//!     "joined": 0,
//!     "unavailable": 1,
//!     "interrupted": 0,
//!     "duration_ms": 1234,
//!     "exit_code": 3,
//!     "exit_code_name": "CS003"
//!   },
//!   "generated_at": "2026-01-01T12:00:00Z"
//! }
//! ```

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ExitCode;
use crate::fetch::{BatchResult, BatchStats, ResolutionStatus};
use crate::output::display_label;
use crate::pipeline::SearchOutcome;

/// Batch counters in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Distinct keys requested
    pub requested: usize,
    /// Keys answered from the cache
    pub cache_hits: usize,
    /// Keys described and written to the cache
    pub fetched: usize,
    /// Keys described but not written to the cache
    pub unpersisted: usize,
    /// Keys that reused another worker's request
    pub joined: usize,
    /// Keys with no description after all attempts
    pub unavailable: usize,
    /// Keys skipped because of Ctrl+C
    pub interrupted: usize,
    /// Wall-clock time of the batch in milliseconds
    pub duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "CS000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from batch counters and an exit code.
    #[must_use]
    pub fn from_stats(stats: &BatchStats, exit_code: ExitCode) -> Self {
        Self {
            requested: stats.requested,
            cache_hits: stats.cache_hits,
            fetched: stats.fetched,
            unpersisted: stats.unpersisted,
            joined: stats.joined,
            unavailable: stats.unavailable,
            interrupted: stats.interrupted,
            duration_ms: stats.duration.as_millis() as u64,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// A matching file.
#[derive(Debug, Clone, Serialize)]
pub struct JsonMatch {
    /// Cache key (file path)
    pub key: String,
    /// Display label, see [`display_label`]
    pub label: String,
    /// Description that matched
    pub description: Option<String>,
}

/// Complete JSON output of a search.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSearchOutput {
    /// Query as given
    pub query: String,
    /// Matches in result order
    pub matches: Vec<JsonMatch>,
    /// Keys without a description
    pub unavailable: Vec<String>,
    /// Batch summary
    pub summary: JsonSummary,
    /// When this output was produced
    pub generated_at: DateTime<Utc>,
}

impl JsonSearchOutput {
    /// Build the output for a finished search.
    ///
    /// # Example
    ///
    /// ```
    /// use capsearch::error::ExitCode;
    /// use capsearch::fetch::BatchStats;
    /// use capsearch::output::json::JsonSearchOutput;
    /// use capsearch::pipeline::SearchOutcome;
    ///
    /// let outcome = SearchOutcome {
    ///     query: "red".to_string(),
    ///     matches: Vec::new(),
    ///     descriptions: Default::default(),
    ///     unavailable: Vec::new(),
    ///     stats: BatchStats::default(),
    /// };
    /// let output = JsonSearchOutput::new(&outcome, ExitCode::NoMatches);
    /// assert_eq!(output.summary.exit_code, 2);
    /// ```
    #[must_use]
    pub fn new(outcome: &SearchOutcome, exit_code: ExitCode) -> Self {
        Self {
            query: outcome.query.clone(),
            matches: outcome
                .matches
                .iter()
                .map(|key| JsonMatch {
                    key: key.to_string(),
                    label: display_label(key),
                    description: outcome.descriptions.get(key).map(|d| d.to_string()),
                })
                .collect(),
            unavailable: outcome.unavailable.iter().map(|k| k.to_string()).collect(),
            summary: JsonSummary::from_stats(&outcome.stats, exit_code),
            generated_at: Utc::now(),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// One file of a describe run.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDescribedFile {
    /// Cache key (file path)
    pub key: String,
    /// Description, or null when unavailable
    pub description: Option<String>,
    /// How the description was obtained
    pub status: ResolutionStatus,
}

/// Complete JSON output of a describe run.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDescribeOutput {
    /// Files in the order they were requested
    pub files: Vec<JsonDescribedFile>,
    /// Batch summary
    pub summary: JsonSummary,
    /// When this output was produced
    pub generated_at: DateTime<Utc>,
}

impl JsonDescribeOutput {
    /// Build the output for a finished batch, listing files in input order.
    #[must_use]
    pub fn new(batch: &BatchResult, exit_code: ExitCode) -> Self {
        let mut by_key: std::collections::HashMap<_, _> = batch
            .resolutions()
            .iter()
            .map(|r| (&r.key, r))
            .collect();

        let files = batch
            .input_order()
            .iter()
            .filter_map(|key| by_key.remove(key))
            .map(|r| JsonDescribedFile {
                key: r.key.to_string(),
                description: r.description.as_ref().map(|d| d.to_string()),
                status: r.status,
            })
            .collect();

        Self {
            files,
            summary: JsonSummary::from_stats(&batch.stats, exit_code),
            generated_at: Utc::now(),
        }
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

fn write_json<T: Serialize, W: Write>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
