//! crumbcache core library.
//!
//! An offline cache manager for the bakery's storefront and admin sites:
//! a versioned precache, a runtime cache filled as requests are served,
//! cache-first fetch handling with a network fallback, and an offline
//! response when both miss.
//!
//! - `cache`: partitioned cache storage (memory and disk)
//! - `net`: requests, responses and the `Fetcher` seam
//! - `worker`: lifecycle, event dispatch and the manager itself
//! - `config`: worker profiles and the user's settings file

pub mod cache;
pub mod config;
pub mod net;
pub mod utils;
pub mod worker;

pub use reqwest::{Method, Url};

pub use cache::{CacheEntry, CacheError, CacheStorage, DiskStorage, MemoryStorage, RequestKey};
pub use config::{Config, ConfigError, Profile, WorkerConfig};
pub use net::{FetchError, Fetcher, HttpFetcher, Request, RequestMode, Response, ResponseType};
pub use worker::{
    EventReply, FetchOutcome, Host, OfflineCacheManager, Registration, WorkerError, WorkerEvent,
    WorkerResult, WorkerState,
};
