use reqwest::{Method, Url};

use super::FetchError;

/// How the page issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Full-page load from the address bar or a link.
    Navigate,
    #[default]
    SameOrigin,
    NoCors,
    Cors,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Navigate => "navigate",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::NoCors => "no-cors",
            RequestMode::Cors => "cors",
        }
    }
}

/// An outgoing request from a controlled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    pub fn new(method: Method, url: Url, mode: RequestMode) -> Self {
        Self { method, url, mode }
    }

    /// Plain subresource GET
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::SameOrigin)
    }

    /// GET issued as a page navigation
    pub fn navigate(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Navigate)
    }

    /// Parse a URL string, resolving origin-relative paths against `origin`.
    pub fn parse(origin: &Url, url: &str) -> Result<Self, FetchError> {
        Ok(Self::get(resolve_url(origin, url)?))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_same_origin(&self, origin: &Url) -> bool {
        same_origin(&self.url, origin)
    }
}

/// Resolve `url` against `origin`. Absolute URLs are returned as-is.
pub fn resolve_url(origin: &Url, url: &str) -> Result<Url, FetchError> {
    origin
        .join(url)
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))
}

/// Scheme, host and port all match.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
