//! Substring search over resolved descriptions.
//!
//! A key matches when the query is a case-insensitive substring of its
//! description. Keys without a description never match, and an empty query
//! matches every key that has one.
//!
//! Results are returned in a deterministic [`ResultOrder`]. Sorting by key is
//! the default because completion order depends on thread scheduling.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::cache::{Description, FileKey};
use crate::fetch::BatchResult;

/// Ordering of search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResultOrder {
    /// Sorted by file key.
    #[default]
    Key,
    /// The order keys were requested in.
    Input,
    /// The order descriptions became available (cache hits first).
    Completion,
}

impl std::fmt::Display for ResultOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Input => write!(f, "input"),
            Self::Completion => write!(f, "completion"),
        }
    }
}

/// Keys in `mapping` whose description contains `query`, sorted by key.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use capsearch::cache::{Description, FileKey};
/// use capsearch::search::search;
///
/// let mut mapping = BTreeMap::new();
/// mapping.insert(FileKey::from("a.png"), Some(Description::new("a red dragon")));
/// mapping.insert(FileKey::from("b.png"), Some(Description::new("a blue bird")));
///
/// assert_eq!(search(&mapping, "RED"), vec![FileKey::from("a.png")]);
/// ```
#[must_use]
pub fn search(mapping: &BTreeMap<FileKey, Option<Description>>, query: &str) -> Vec<FileKey> {
    let needle = query.to_lowercase();
    mapping
        .iter()
        .filter(|(_, description)| matches(description.as_ref(), &needle))
        .map(|(key, _)| key.clone())
        .collect()
}

fn matches(description: Option<&Description>, lowered_query: &str) -> bool {
    description.is_some_and(|d| d.as_str().to_lowercase().contains(lowered_query))
}

/// Searchable view of a resolved batch that remembers both input and
/// completion order.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    /// Entries in completion order.
    entries: Vec<(FileKey, Option<Description>)>,
    /// Keys in request order.
    input_order: Vec<FileKey>,
}

impl SearchIndex {
    /// Build an index from entries given in completion order. Input order is
    /// taken to be the same.
    #[must_use]
    pub fn new(entries: Vec<(FileKey, Option<Description>)>) -> Self {
        let input_order = entries.iter().map(|(k, _)| k.clone()).collect();
        Self {
            entries,
            input_order,
        }
    }

    /// Build an index from a resolved batch.
    #[must_use]
    pub fn from_batch(batch: &BatchResult) -> Self {
        Self {
            entries: batch
                .resolutions()
                .iter()
                .map(|r| (r.key.clone(), r.description.clone()))
                .collect(),
            input_order: batch.input_order().to_vec(),
        }
    }

    /// Number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys whose description contains `query`, in the requested order.
    #[must_use]
    pub fn search(&self, query: &str, order: ResultOrder) -> Vec<FileKey> {
        let needle = query.to_lowercase();
        let hits = self
            .entries
            .iter()
            .filter(|(_, description)| matches(description.as_ref(), &needle))
            .map(|(key, _)| key);

        match order {
            ResultOrder::Completion => hits.cloned().collect(),
            ResultOrder::Key => {
                let mut keys: Vec<FileKey> = hits.cloned().collect();
                keys.sort();
                keys
            }
            ResultOrder::Input => {
                let position: std::collections::HashMap<&FileKey, usize> = self
                    .input_order
                    .iter()
                    .enumerate()
                    .map(|(i, k)| (k, i))
                    .collect();
                let mut keys: Vec<FileKey> = hits.cloned().collect();
                keys.sort_by_key(|k| position.get(k).copied().unwrap_or(usize::MAX));
                keys
            }
        }
    }
}
