use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::net::{Request, Response};
use crate::utils::age_display;

/// Normalized lookup key: method plus URL without its fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn get(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
        }
    }

    pub fn from_request(request: &Request) -> Self {
        let mut key = Self::get(&request.url);
        key.method = request.method.as_str().to_string();
        key
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A stored (key, response snapshot) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: RequestKey,
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: RequestKey, response: Response) -> Self {
        Self {
            key,
            response,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        age_display(self.age_minutes())
    }

    /// Size of the stored body in bytes
    pub fn size(&self) -> usize {
        self.response.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use reqwest::Method;

    #[test]
    fn test_key_strips_fragment() {
        let url = Url::parse("https://cupcakes.example/shop.html#brownies").unwrap();
        let key = RequestKey::get(&url);
        assert_eq!(key.url, "https://cupcakes.example/shop.html");
        assert_eq!(key.to_string(), "GET https://cupcakes.example/shop.html");
    }

    #[test]
    fn test_key_keeps_query() {
        let url = Url::parse("https://cupcakes.example/shop.html?week=3").unwrap();
        assert_eq!(RequestKey::get(&url).url, "https://cupcakes.example/shop.html?week=3");
    }

    #[test]
    fn test_key_from_request_uses_method() {
        let url = Url::parse("https://cupcakes.example/api/reviews").unwrap();
        let req = Request::get(url).with_method(Method::POST);
        assert_eq!(RequestKey::from_request(&req).method, "POST");
    }

    #[test]
    fn test_entry_age_display() {
        let url = Url::parse("https://cupcakes.example/").unwrap();
        let mut entry = CacheEntry::new(RequestKey::get(&url), Response::new(200, "hi"));
        assert_eq!(entry.age_display(), "just now");
        assert_eq!(entry.size(), 2);

        entry.cached_at = Utc::now() - Duration::minutes(90);
        assert_eq!(entry.age_display(), "2h ago");
    }
}
