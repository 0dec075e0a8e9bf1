use serde::{Deserialize, Serialize};

/// Body text of the synthesized offline response
pub const OFFLINE_BODY: &str = "Offline - Please check your connection";

/// Where a response came from, as far as the page can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response, fully inspectable.
    #[default]
    Basic,
    Cors,
    /// Cross-origin response whose status and body are hidden.
    Opaque,
    Error,
}

/// A response snapshot. Cloning copies the body, so a clone and its
/// original can be consumed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Vec<u8>,
    #[serde(rename = "type")]
    pub response_type: ResponseType,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: canonical_reason(status).to_string(),
            headers: Vec::new(),
            body: body.into(),
            response_type: ResponseType::Basic,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// The canned `503` plain-text response returned when both cache and
    /// network fail.
    pub fn offline() -> Self {
        Self::new(503, OFFLINE_BODY).with_header("Content-Type", "text/plain")
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Exactly 200 from the same origin. Only these are stored at runtime.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn canonical_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_response_shape() {
        let resp = Response::offline();
        assert_eq!(resp.status, 503);
        assert_eq!(resp.status_text, "Service Unavailable");
        assert_eq!(resp.content_type(), Some("text/plain"));
        assert_eq!(resp.text(), OFFLINE_BODY);
        assert!(!resp.is_cacheable());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let resp = Response::new(200, "ok").with_header("content-type", "text/html");
        assert_eq!(resp.header("Content-Type"), Some("text/html"));
        assert_eq!(resp.header("ETag"), None);
    }

    #[test]
    fn test_is_cacheable() {
        assert!(Response::new(200, "").is_cacheable());
        assert!(!Response::new(204, "").is_cacheable());
        assert!(!Response::new(200, "").with_type(ResponseType::Opaque).is_cacheable());
        assert!(!Response::new(200, "").with_type(ResponseType::Cors).is_cacheable());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Response::new(200, "shortbread");
        let mut copy = original.clone();
        copy.body.clear();
        assert_eq!(original.text(), "shortbread");
    }
}
