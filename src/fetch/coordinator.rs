//! Batch resolution with in-flight deduplication.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::cache::{Description, DescriptionStore, FileKey};
use crate::caption::{CaptionClient, DescribeOutcome};
use crate::progress::{ProgressCallback, PHASE_DESCRIBE};

/// Default number of concurrent caption workers.
pub const DEFAULT_JOBS: usize = 4;

/// Configuration for a [`FetchCoordinator`].
#[derive(Clone)]
pub struct FetchConfig {
    /// Number of worker threads for caption calls.
    pub jobs: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchConfig")
            .field("jobs", &self.jobs)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_JOBS,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FetchConfig {
    /// Set the worker count (at least one).
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Errors constructing a coordinator.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The worker pool could not be created.
    #[error("Failed to build fetch worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// How a key's description was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Served from the store without a service call.
    Cached,
    /// Described by the service and committed to the store.
    Fetched,
    /// Described by the service, but the store write failed. The description
    /// is still returned; the key will be fetched again next time.
    Unpersisted,
    /// Another worker was already describing this key; its result was reused.
    Joined,
    /// The service gave no description after all attempts.
    Unavailable,
    /// Skipped because shutdown was requested.
    Interrupted,
}

/// Outcome for a single key in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The requested key.
    pub key: FileKey,
    /// Its description, absent when none could be obtained.
    pub description: Option<Description>,
    /// How the description was obtained.
    pub status: ResolutionStatus,
}

impl Resolution {
    fn new(key: FileKey, description: Option<Description>, status: ResolutionStatus) -> Self {
        Self {
            key,
            description,
            status,
        }
    }
}

/// Counters for a resolved batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Distinct keys requested
    pub requested: usize,
    /// Keys served from the store
    pub cache_hits: usize,
    /// Keys described and committed
    pub fetched: usize,
    /// Keys described but not committed
    pub unpersisted: usize,
    /// Keys that reused another worker's in-flight call
    pub joined: usize,
    /// Keys with no description after retries
    pub unavailable: usize,
    /// Keys skipped because of shutdown
    pub interrupted: usize,
    /// Wall-clock time for the batch
    pub duration: Duration,
}

impl BatchStats {
    /// Whether any key ended without a durable description.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.unavailable > 0 || self.unpersisted > 0 || self.interrupted > 0
    }
}

/// All resolutions for one batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    resolutions: Vec<Resolution>,
    input_order: Vec<FileKey>,
    /// Counters for the batch.
    pub stats: BatchStats,
}

impl BatchResult {
    /// Resolutions in completion order. Cache hits come first.
    #[must_use]
    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// Distinct keys in the order they were requested.
    #[must_use]
    pub fn input_order(&self) -> &[FileKey] {
        &self.input_order
    }

    /// Keys in completion order.
    #[must_use]
    pub fn completion_order(&self) -> Vec<FileKey> {
        self.resolutions.iter().map(|r| r.key.clone()).collect()
    }

    /// Key to description mapping, with `None` for keys that failed.
    #[must_use]
    pub fn descriptions(&self) -> BTreeMap<FileKey, Option<Description>> {
        self.resolutions
            .iter()
            .map(|r| (r.key.clone(), r.description.clone()))
            .collect()
    }

    /// Keys that ended without a description, sorted.
    #[must_use]
    pub fn unavailable(&self) -> Vec<FileKey> {
        let mut keys: Vec<FileKey> = self
            .resolutions
            .iter()
            .filter(|r| r.description.is_none())
            .map(|r| r.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Resolution for `key`, if it was part of the batch.
    #[must_use]
    pub fn get(&self, key: &FileKey) -> Option<&Resolution> {
        self.resolutions.iter().find(|r| &r.key == key)
    }
}

/// Result slot shared by the worker describing a key and any workers waiting on it.
#[derive(Default)]
struct InFlight {
    outcome: Mutex<Option<Option<Description>>>,
    ready: Condvar,
}

impl InFlight {
    fn publish(&self, description: Option<Description>) {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        *outcome = Some(description);
        self.ready.notify_all();
    }

    fn wait(&self) -> Option<Description> {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        while outcome.is_none() {
            outcome = self
                .ready
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
        outcome.as_ref().cloned().flatten()
    }
}

/// Ownership of a key's in-flight slot. Dropping it without [`Claim::finish`]
/// publishes an absent result so waiters never hang.
struct Claim<'a> {
    coordinator: &'a FetchCoordinator,
    key: FileKey,
    slot: Arc<InFlight>,
    released: bool,
}

impl Claim<'_> {
    fn finish(mut self, description: Option<Description>) {
        self.release(description);
    }

    fn release(&mut self, description: Option<Description>) {
        if self.released {
            return;
        }
        self.released = true;
        self.slot.publish(description);
        self.coordinator.in_flight().remove(&self.key);
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.release(None);
    }
}

enum Role<'a> {
    Leader(Claim<'a>),
    Joiner(Arc<InFlight>),
}

/// Resolves batches of keys against the store and the captioning service.
pub struct FetchCoordinator {
    store: Arc<DescriptionStore>,
    client: CaptionClient,
    config: FetchConfig,
    pool: rayon::ThreadPool,
    in_flight: Mutex<HashMap<FileKey, Arc<InFlight>>>,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("store", &self.store.path())
            .field("client", &self.client)
            .field("config", &self.config)
            .finish()
    }
}

impl FetchCoordinator {
    /// Create a coordinator with its own worker pool of `config.jobs` threads.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ThreadPool`] if the pool cannot be built.
    pub fn new(
        store: Arc<DescriptionStore>,
        client: CaptionClient,
        config: FetchConfig,
    ) -> Result<Self, FetchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs.max(1))
            .thread_name(|i| format!("capsearch-fetch-{i}"))
            .build()?;

        Ok(Self {
            store,
            client,
            config,
            pool,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<DescriptionStore> {
        &self.store
    }

    /// Resolve every key, serving cached descriptions and describing the rest.
    ///
    /// Duplicate keys are collapsed. Returns once every key has either a
    /// description or is recorded as absent.
    pub fn resolve<I>(&self, keys: I) -> BatchResult
    where
        I: IntoIterator<Item = FileKey>,
    {
        self.run(keys, false)
    }

    /// Describe every key again, ignoring and overwriting cached entries.
    pub fn refetch<I>(&self, keys: I) -> BatchResult
    where
        I: IntoIterator<Item = FileKey>,
    {
        self.run(keys, true)
    }

    fn run<I>(&self, keys: I, force: bool) -> BatchResult
    where
        I: IntoIterator<Item = FileKey>,
    {
        let start = Instant::now();

        let mut seen = HashSet::new();
        let input_order: Vec<FileKey> = keys
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .collect();

        let mut resolutions = Vec::with_capacity(input_order.len());
        let mut misses = Vec::new();
        for key in &input_order {
            match (!force).then(|| self.store.get(key)).flatten() {
                Some(description) => {
                    log::trace!("Cache hit: {}", key);
                    resolutions.push(Resolution::new(
                        key.clone(),
                        Some(description),
                        ResolutionStatus::Cached,
                    ));
                }
                None => {
                    log::trace!("Cache miss: {}", key);
                    misses.push(key.clone());
                }
            }
        }

        log::info!(
            "Resolving {} files: {} cached, {} to describe",
            input_order.len(),
            resolutions.len(),
            misses.len()
        );

        if !misses.is_empty() {
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_phase_start(PHASE_DESCRIBE, misses.len());
            }

            let (tx, rx) = mpsc::channel();
            let completed = AtomicUsize::new(0);
            self.pool.install(|| {
                misses.into_par_iter().for_each_with(tx, |tx, key| {
                    let resolution = self.fetch_one(key, force);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(done, resolution.key.as_str());
                    }
                    // The receiver outlives the pool call, so this cannot fail.
                    let _ = tx.send(resolution);
                });
            });
            resolutions.extend(rx);

            if let Some(ref callback) = self.config.progress_callback {
                callback.on_phase_end(PHASE_DESCRIBE);
            }
        }

        let mut stats = BatchStats {
            requested: input_order.len(),
            ..Default::default()
        };
        for resolution in &resolutions {
            match resolution.status {
                ResolutionStatus::Cached => stats.cache_hits += 1,
                ResolutionStatus::Fetched => stats.fetched += 1,
                ResolutionStatus::Unpersisted => stats.unpersisted += 1,
                ResolutionStatus::Joined => stats.joined += 1,
                ResolutionStatus::Unavailable => stats.unavailable += 1,
                ResolutionStatus::Interrupted => stats.interrupted += 1,
            }
        }
        stats.duration = start.elapsed();

        if stats.interrupted > 0 {
            log::info!(
                "Batch interrupted by shutdown signal: {} files skipped",
                stats.interrupted
            );
        }
        log::info!(
            "Resolved {} files in {:.2?} ({} cached, {} fetched, {} unavailable)",
            stats.requested,
            stats.duration,
            stats.cache_hits,
            stats.fetched + stats.unpersisted + stats.joined,
            stats.unavailable
        );

        BatchResult {
            resolutions,
            input_order,
            stats,
        }
    }

    /// Resolve a single cache miss on a worker thread.
    fn fetch_one(&self, key: FileKey, force: bool) -> Resolution {
        if self.config.is_shutdown_requested() {
            log::debug!("Shutdown requested, skipping {}", key);
            return Resolution::new(key, None, ResolutionStatus::Interrupted);
        }

        let claim = match self.claim(&key) {
            Role::Leader(claim) => claim,
            Role::Joiner(slot) => {
                log::trace!("Waiting on in-flight describe for {}", key);
                let description = slot.wait();
                let status = if description.is_some() {
                    ResolutionStatus::Joined
                } else {
                    ResolutionStatus::Unavailable
                };
                return Resolution::new(key, description, status);
            }
        };

        // Another batch may have committed this key since the partition step.
        if !force {
            if let Some(description) = self.store.get(&key) {
                claim.finish(Some(description.clone()));
                return Resolution::new(key, Some(description), ResolutionStatus::Cached);
            }
        }

        match self.client.describe(&key) {
            DescribeOutcome::Described(description) => {
                let status = match self.store.put(key.clone(), description.clone()) {
                    Ok(()) => ResolutionStatus::Fetched,
                    Err(e) => {
                        log::warn!("Description for {} was not saved to cache: {}", key, e);
                        ResolutionStatus::Unpersisted
                    }
                };
                claim.finish(Some(description.clone()));
                Resolution::new(key, Some(description), status)
            }
            DescribeOutcome::Unavailable {
                attempts,
                last_error,
            } => {
                log::warn!(
                    "No description available for {} after {} attempt(s): {}",
                    key,
                    attempts,
                    last_error
                );
                claim.finish(None);
                Resolution::new(key, None, ResolutionStatus::Unavailable)
            }
        }
    }

    fn claim(&self, key: &FileKey) -> Role<'_> {
        let mut in_flight = self.in_flight();
        if let Some(slot) = in_flight.get(key) {
            return Role::Joiner(Arc::clone(slot));
        }

        let slot = Arc::new(InFlight::default());
        in_flight.insert(key.clone(), Arc::clone(&slot));
        Role::Leader(Claim {
            coordinator: self,
            key: key.clone(),
            slot,
            released: false,
        })
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<FileKey, Arc<InFlight>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
