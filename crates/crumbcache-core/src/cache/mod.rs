//! Cache storage module for offline access.
//!
//! A `CacheStorage` holds named partitions of `CacheEntry` snapshots keyed by
//! `RequestKey`. Two backends are provided:
//! - `MemoryStorage`: in-process, optionally quota-limited
//! - `DiskStorage`: a directory per partition, surviving restarts

pub mod disk;
pub mod entry;
pub mod memory;
pub mod storage;

pub use disk::DiskStorage;
pub use entry::{CacheEntry, RequestKey};
pub use memory::MemoryStorage;
pub use storage::{CacheError, CacheStorage};
