use thiserror::Error;

use super::WorkerState;
use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::net::FetchError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Install failed for {url}: {source}")]
    Install {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Install failed storing {url}: {source}")]
    InstallStore {
        url: String,
        #[source]
        source: CacheError,
    },

    #[error("Cannot move worker from {from} to {to}")]
    InvalidTransition { from: WorkerState, to: WorkerState },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Host error: {0}")]
    Host(String),

    #[error("Registration error: {0}")]
    Registration(String),
}

impl WorkerError {
    /// Whether this error came out of the install phase.
    pub fn is_install_error(&self) -> bool {
        matches!(self, WorkerError::Install { .. } | WorkerError::InstallStore { .. })
    }
}
