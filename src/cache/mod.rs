//! Description cache for capsearch.
//!
//! This module provides durable storage for the text descriptions returned by
//! the captioning service, so a file is only ever described once.
//!
//! # Architecture
//!
//! The caching system is split into two main components:
//!
//! * [`store`]: The [`DescriptionStore`], a mutex-guarded in-memory map that is
//!   flushed as a whole JSON file after every committed write.
//! * [`entry`]: The key and value types stored in the cache.
//!
//! # Durability
//!
//! Every flush writes the full mapping to a temporary file next to the target
//! and atomically renames it into place. Readers therefore see either the last
//! committed state or the previous one, never a half-written file.
//!
//! # Growth
//!
//! Entries are never evicted. The cache grows with the number of distinct files
//! ever described.

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, Description, FileKey};
pub use store::{DescriptionStore, StoreError, StoreResult};
