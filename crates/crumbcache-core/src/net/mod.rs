//! Network module: requests, responses and the fetcher seam.
//!
//! `HttpFetcher` performs real GETs with reqwest; anything implementing
//! `Fetcher` can stand in for it.

pub mod client;
pub mod error;
pub mod request;
pub mod response;

pub use client::{Fetcher, HttpFetcher};
pub use error::FetchError;
pub use request::{resolve_url, same_origin, Request, RequestMode};
pub use response::{Response, ResponseType, OFFLINE_BODY};
