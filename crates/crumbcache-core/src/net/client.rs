//! Network side of the cache manager.
//!
//! The manager only ever talks to the network through the `Fetcher` trait,
//! so tests and other hosts can swap the transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use super::request::same_origin;
use super::{FetchError, Request, Response, ResponseType};

/// HTTP request timeout in seconds.
/// The manager applies its own, usually shorter, timeout on top of this one.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("crumbcache/", env!("CARGO_PKG_VERSION"));

/// Performs a network fetch.
///
/// A non-2xx status is still a successful fetch; only transport failures
/// are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;

    /// Fetch and reject anything that is not a 2xx response.
    async fn fetch_ok(&self, request: &Request) -> Result<Response, FetchError> {
        let response = self.fetch(request).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(FetchError::Status {
                url: request.url.to_string(),
                status: response.status,
            })
        }
    }
}

/// `Fetcher` backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        debug!(url = %request.url, method = %request.method, mode = request.mode.as_str(), "Network fetch");

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .header(header::ACCEPT, "*/*")
            .send()
            .await?;

        // A redirect that left the origin makes the result unsafe to reuse.
        let response_type = if same_origin(response.url(), &request.url) {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        };

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status = status.as_u16(), bytes = body.len(), "Network fetch complete");

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            response_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    struct FixedStatus(u16);

    #[async_trait]
    impl Fetcher for FixedStatus {
        async fn fetch(&self, _request: &Request) -> Result<Response, FetchError> {
            Ok(Response::new(self.0, "body"))
        }
    }

    fn request() -> Request {
        Request::get(Url::parse("https://cupcakes.example/index.html").unwrap())
    }

    #[tokio::test]
    async fn test_fetch_ok_accepts_success() {
        let resp = FixedStatus(200).fetch_ok(&request()).await.unwrap();
        assert_eq!(resp.text(), "body");
    }

    #[tokio::test]
    async fn test_fetch_ok_rejects_error_status() {
        let err = FixedStatus(404).fetch_ok(&request()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(!err.is_network_failure());
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new().is_ok());
    }
}
