use capsearch::cache::{Description, DescriptionStore, FileKey};
use capsearch::caption::{CaptionBackend, CaptionClient, CaptionError};
use capsearch::fetch::{FetchConfig, FetchCoordinator, ResolutionStatus};
use capsearch::pipeline::Pipeline;
use capsearch::search::ResultOrder;
use capsearch::signal::ShutdownHandler;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

/// Backend that sleeps before answering, so concurrent requests overlap.
struct Slow {
    calls: AtomicU32,
    delay: Duration,
}

impl Slow {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CaptionBackend for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    fn caption(&self, key: &FileKey) -> Result<String, CaptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if key.as_str().contains("broken") {
            return Err(CaptionError::Transport("connection refused".to_string()));
        }
        Ok(format!("A red dragon in {}", key))
    }
}

fn coordinator(
    backend: Arc<Slow>,
    store: Arc<DescriptionStore>,
    jobs: usize,
) -> FetchCoordinator {
    FetchCoordinator::new(
        store,
        CaptionClient::new(backend, 3),
        FetchConfig::default().with_jobs(jobs),
    )
    .unwrap()
}

#[test]
fn test_concurrent_resolves_of_one_key_call_service_once() {
    let backend = Slow::new(Duration::from_millis(150));
    let store = Arc::new(DescriptionStore::in_memory());
    let coord = Arc::new(coordinator(backend.clone(), store, 4));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let coord = Arc::clone(&coord);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coord.resolve(vec![FileKey::from("shared.png")])
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(backend.calls(), 1);
    for batch in &results {
        let resolution = batch.get(&FileKey::from("shared.png")).unwrap();
        assert_eq!(
            resolution.description.as_ref().map(|d| d.as_str()),
            Some("A red dragon in shared.png")
        );
    }
    let fetched: usize = results.iter().map(|b| b.stats.fetched).sum();
    assert_eq!(fetched, 1);
}

#[test]
fn test_batch_is_concurrent() {
    let backend = Slow::new(Duration::from_millis(200));
    let store = Arc::new(DescriptionStore::in_memory());
    let coord = coordinator(backend.clone(), store, 4);

    let keys: Vec<FileKey> = (0..4).map(|i| FileKey::new(format!("{i}.png"))).collect();
    let batch = coord.resolve(keys);

    assert_eq!(backend.calls(), 4);
    assert_eq!(batch.stats.fetched, 4);
    // Four 200ms calls on four workers finish well under the sequential 800ms.
    assert!(batch.stats.duration < Duration::from_millis(700));
}

#[test]
fn test_resolved_keys_are_durable_across_coordinators() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let keys = vec![FileKey::from("a.png"), FileKey::from("b.png")];

    let first = Slow::new(Duration::ZERO);
    coordinator(first.clone(), Arc::new(DescriptionStore::open(&path)), 2).resolve(keys.clone());
    assert_eq!(first.calls(), 2);

    let second = Slow::new(Duration::ZERO);
    let batch =
        coordinator(second.clone(), Arc::new(DescriptionStore::open(&path)), 2).resolve(keys);
    assert_eq!(second.calls(), 0);
    assert_eq!(batch.stats.cache_hits, 2);
}

#[test]
fn test_partial_failure_through_pipeline() {
    let backend = Slow::new(Duration::ZERO);
    let store = Arc::new(DescriptionStore::in_memory());
    let pipeline = Pipeline::new(coordinator(backend.clone(), store, 2), ResultOrder::Key);

    let outcome = pipeline.resolve_and_search(
        vec![
            FileKey::from("b.png"),
            FileKey::from("broken.png"),
            FileKey::from("a.png"),
        ],
        "dragon",
    );

    assert_eq!(
        outcome.matches,
        vec![FileKey::from("a.png"), FileKey::from("b.png")]
    );
    assert_eq!(outcome.unavailable, vec![FileKey::from("broken.png")]);
    // Two good keys once each, the broken key three times.
    assert_eq!(backend.calls(), 5);
    assert!(!pipeline
        .coordinator()
        .store()
        .contains(&FileKey::from("broken.png")));
}

#[cfg(unix)]
#[test]
fn test_store_write_failure_still_returns_description() {
    let dir = tempdir().unwrap();
    // A directory cannot be replaced by a file, so every flush fails.
    let store = Arc::new(DescriptionStore::open(dir.path()));
    let backend = Slow::new(Duration::ZERO);
    let coord = coordinator(backend.clone(), store, 2);

    let batch = coord.resolve(vec![FileKey::from("a.png")]);
    let resolution = batch.get(&FileKey::from("a.png")).unwrap();
    assert_eq!(resolution.status, ResolutionStatus::Unpersisted);
    assert!(resolution.description.is_some());
    assert_eq!(batch.stats.unpersisted, 1);
    assert!(batch.stats.has_failures());

    // Nothing reached the store, so the next batch asks again.
    assert!(coord.store().is_empty());
    coord.resolve(vec![FileKey::from("a.png")]);
    assert_eq!(backend.calls(), 2);
}

#[test]
fn test_shutdown_flag_leaves_store_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let store = Arc::new(DescriptionStore::open(&path));
    store
        .put(FileKey::from("cached.png"), Description::new("old"))
        .unwrap();

    let shutdown = ShutdownHandler::new();
    shutdown.request_shutdown();
    let backend = Slow::new(Duration::ZERO);
    let coord = FetchCoordinator::new(
        store,
        CaptionClient::new(backend.clone(), 3),
        FetchConfig::default().with_shutdown_flag(shutdown.get_flag()),
    )
    .unwrap();

    let batch = coord.resolve(vec![FileKey::from("cached.png"), FileKey::from("new.png")]);
    assert_eq!(backend.calls(), 0);
    assert_eq!(batch.stats.cache_hits, 1);
    assert_eq!(batch.stats.interrupted, 1);
    assert_eq!(DescriptionStore::open(&path).len(), 1);
}
