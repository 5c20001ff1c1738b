//! Plain text output.
//!
//! Colors come from `yansi` and are switched off globally with
//! `yansi::disable()` when `--no-color` is given or stdout is not a terminal.

use std::collections::HashMap;
use std::io::{self, Write};

use yansi::Paint;

use crate::fetch::BatchResult;
use crate::output::display_label;
use crate::pipeline::SearchOutcome;

/// Marker printed in place of a missing description.
pub const UNAVAILABLE_MARKER: &str = "<unavailable>";

/// Text renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextOutput {
    show_descriptions: bool,
}

impl TextOutput {
    /// Create a renderer that lists matches with their labels only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print each match's description.
    #[must_use]
    pub fn with_descriptions(mut self, show: bool) -> Self {
        self.show_descriptions = show;
        self
    }

    /// Render a search result.
    ///
    /// Each match is printed as its path followed by its indented label.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_search<W: Write>(&self, outcome: &SearchOutcome, writer: &mut W) -> io::Result<()> {
        if outcome.matches.is_empty() {
            writeln!(writer, "No files found matching \"{}\".", outcome.query)?;
        }

        for key in &outcome.matches {
            writeln!(writer, "{}", key.as_str().green().bold())?;
            for line in display_label(key).lines() {
                writeln!(writer, "    {}", line)?;
            }
            if self.show_descriptions {
                if let Some(description) = outcome.descriptions.get(key) {
                    writeln!(writer, "    {}", description.as_str().dim())?;
                }
            }
        }

        if !outcome.unavailable.is_empty() {
            writeln!(
                writer,
                "{}",
                format!(
                    "{} file(s) have no description and were not searched",
                    outcome.unavailable.len()
                )
                .yellow()
            )?;
        }
        Ok(())
    }

    /// Render a describe run, one `path: description` line per file in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_describe<W: Write>(&self, batch: &BatchResult, writer: &mut W) -> io::Result<()> {
        let by_key: HashMap<_, _> = batch.resolutions().iter().map(|r| (&r.key, r)).collect();

        for key in batch.input_order() {
            let Some(resolution) = by_key.get(key) else {
                continue;
            };
            match &resolution.description {
                Some(description) => {
                    writeln!(writer, "{}: {}", key.as_str().bold(), description)?;
                }
                None => {
                    writeln!(writer, "{}: {}", key.as_str().bold(), UNAVAILABLE_MARKER.red())?;
                }
            }
        }
        Ok(())
    }

    /// Render cache statistics.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_cache_stats<W: Write>(
        &self,
        path: &std::path::Path,
        entries: usize,
        writer: &mut W,
    ) -> io::Result<()> {
        writeln!(writer, "Cache: {}", path.display())?;
        writeln!(writer, "Descriptions: {}", entries)
    }
}
