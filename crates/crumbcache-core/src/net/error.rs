use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// True when the request never produced a response at all.
    pub fn is_network_failure(&self) -> bool {
        !matches!(self, FetchError::Status { .. } | FetchError::InvalidUrl(_))
    }
}
