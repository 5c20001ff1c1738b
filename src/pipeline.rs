//! Caller-facing entry point: resolve a set of files, then search them.
//!
//! # Example
//!
//! ```no_run
//! use capsearch::config::Config;
//! use capsearch::pipeline::Pipeline;
//! use capsearch::cache::FileKey;
//!
//! let pipeline = Pipeline::from_config(&Config::default(), None).unwrap();
//! let outcome = pipeline.resolve_and_search(vec![FileKey::from("./data/a.png")], "dragon");
//! for key in &outcome.matches {
//!     println!("{}", key);
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cache::{Description, DescriptionStore, FileKey};
use crate::caption::{CaptionClient, CaptionError, OllamaBackend};
use crate::config::Config;
use crate::fetch::{BatchResult, BatchStats, FetchConfig, FetchCoordinator, FetchError};
use crate::progress::ProgressCallback;
use crate::search::{ResultOrder, SearchIndex};

/// Errors from building or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The captioning client could not be created.
    #[error("Failed to create captioning client: {0}")]
    Caption(#[from] CaptionError),

    /// The fetch coordinator could not be created.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Ctrl+C was pressed before any work started.
    #[error("Interrupted")]
    Interrupted,
}

/// Result of [`Pipeline::resolve_and_search`].
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Query that was searched.
    pub query: String,
    /// Matching keys in the pipeline's result order.
    pub matches: Vec<FileKey>,
    /// Descriptions of the matching keys.
    pub descriptions: BTreeMap<FileKey, Description>,
    /// Keys that have no description, sorted. These can never match.
    pub unavailable: Vec<FileKey>,
    /// Fetch counters for the batch.
    pub stats: BatchStats,
}

/// Fetch coordinator plus result ordering.
#[derive(Debug)]
pub struct Pipeline {
    coordinator: FetchCoordinator,
    order: ResultOrder,
}

impl Pipeline {
    /// Wrap an existing coordinator.
    #[must_use]
    pub fn new(coordinator: FetchCoordinator, order: ResultOrder) -> Self {
        Self { coordinator, order }
    }

    /// Build the store, the Ollama client and the coordinator from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the worker pool cannot be built.
    pub fn from_config(
        config: &Config,
        shutdown_flag: Option<Arc<AtomicBool>>,
    ) -> Result<Self, PipelineError> {
        Self::from_config_with_progress(config, shutdown_flag, None)
    }

    /// Like [`Pipeline::from_config`], reporting describe progress to `progress`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the worker pool cannot be built.
    pub fn from_config_with_progress(
        config: &Config,
        shutdown_flag: Option<Arc<AtomicBool>>,
        progress: Option<Arc<dyn ProgressCallback>>,
    ) -> Result<Self, PipelineError> {
        let store = Arc::new(DescriptionStore::open(&config.cache_path));
        let backend = OllamaBackend::new(config.ollama())?;
        let client = CaptionClient::new(Arc::new(backend), config.max_attempts);

        let mut fetch_config = FetchConfig::default().with_jobs(config.jobs);
        if let Some(flag) = shutdown_flag {
            fetch_config = fetch_config.with_shutdown_flag(flag);
        }
        if let Some(progress) = progress {
            fetch_config = fetch_config.with_progress_callback(progress);
        }

        let coordinator = FetchCoordinator::new(store, client, fetch_config)?;
        Ok(Self::new(coordinator, config.order))
    }

    /// The underlying coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    /// Configured result order.
    #[must_use]
    pub fn order(&self) -> ResultOrder {
        self.order
    }

    /// Resolve descriptions for `keys` and return those matching `query`.
    ///
    /// Blocks until every key has resolved. Keys whose description could not
    /// be obtained are listed in [`SearchOutcome::unavailable`].
    pub fn resolve_and_search<I>(&self, keys: I, query: &str) -> SearchOutcome
    where
        I: IntoIterator<Item = FileKey>,
    {
        let batch = self.coordinator.resolve(keys);
        self.search_batch(&batch, query)
    }

    /// Search an already resolved batch.
    #[must_use]
    pub fn search_batch(&self, batch: &BatchResult, query: &str) -> SearchOutcome {
        let matches = SearchIndex::from_batch(batch).search(query, self.order);
        log::info!("{} of {} files match {:?}", matches.len(), batch.stats.requested, query);

        let mut all = batch.descriptions();
        let descriptions = matches
            .iter()
            .filter_map(|key| Some((key.clone(), all.remove(key)??)))
            .collect();

        SearchOutcome {
            query: query.to_string(),
            matches,
            descriptions,
            unavailable: batch.unavailable(),
            stats: batch.stats.clone(),
        }
    }
}
