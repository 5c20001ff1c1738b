//! Cache-first, concurrent description fetching.
//!
//! The [`FetchCoordinator`] resolves a batch of [`FileKey`](crate::cache::FileKey)s
//! to descriptions:
//!
//! 1. Keys already in the [`DescriptionStore`](crate::cache::DescriptionStore)
//!    are served immediately.
//! 2. Misses are dispatched to a bounded rayon pool. Each worker asks the
//!    [`CaptionClient`](crate::caption::CaptionClient) once (with its own
//!    retries) and commits a successful result to the store before reporting it.
//! 3. Results are gathered in completion order. Failed keys are kept as absent
//!    entries so callers can tell "no match" from "no description".
//!
//! At most one service call per key is live at a time. A worker that finds a
//! call for its key already running waits for that call's result.

pub mod coordinator;

pub use coordinator::{
    BatchResult, BatchStats, FetchConfig, FetchCoordinator, FetchError, Resolution,
    ResolutionStatus,
};
