//! Hash caching module.
//!
//! This module persists computed content hashes so that repeated runs over a
//! slowly-changing tree only hash files that are new or changed.
//!
//! # Architecture
//!
//! The caching system is split into two main components:
//!
//! * [`store`]: The append-only text file and the in-memory lookup map.
//! * [`entry`]: Keys, entries and per-row validation.
//!
//! # Cache Invalidation
//!
//! A hash is reused only when all of these match exactly:
//! * Root-relative path
//! * File size
//! * Modification time (nanoseconds)
//! * Algorithm
//!
//! A file that changed produces a different key. Its old row stays in the
//! file but never matches again; rows are never repaired or deleted.

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, CacheKey, RowRejection};
pub use store::{CacheError, CacheResult, HashCache, LoadReport};
