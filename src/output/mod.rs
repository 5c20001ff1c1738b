//! Rendering of search and describe results for the command line.
//!
//! - [`text`] for people, colored with `yansi`
//! - [`json`] for scripting
//!
//! # Example
//!
//! ```no_run
//! use capsearch::config::Config;
//! use capsearch::error::ExitCode;
//! use capsearch::output::json::JsonSearchOutput;
//! use capsearch::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::from_config(&Config::default(), None).unwrap();
//! let outcome = pipeline.resolve_and_search(Vec::new(), "dragon");
//! let output = JsonSearchOutput::new(&outcome, ExitCode::for_batch(&outcome.stats, false));
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

use std::path::Path;

pub mod json;
pub mod text;

pub use json::{JsonDescribeOutput, JsonOutputError, JsonSearchOutput, JsonSummary};
pub use text::TextOutput;

use crate::cache::FileKey;

/// Human-facing label for a file.
///
/// A name shaped like `first_last_id.ext` becomes three lines
/// (`first`, `last`, `id`). Anything else is shown as its stem.
#[must_use]
pub fn display_label(key: &FileKey) -> String {
    label_for_path(key.as_path())
}

fn label_for_path(path: &Path) -> String {
    let stem = match path.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => return path.to_string_lossy().into_owned(),
    };

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() == 3 {
        parts.join("\n")
    } else {
        stem
    }
}
