use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Control messages a controlled page can post to the worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate now instead of waiting for old pages to close.
    SkipWaiting,
    /// Persist an opaque payload in the runtime cache for offline display.
    #[serde(alias = "CACHE_EMAILS")]
    StoreData {
        #[serde(alias = "emails", default)]
        payload: Value,
    },
}

impl ClientMessage {
    /// Parse a posted message. Anything unrecognized yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match serde_json::from_value(value.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(error = %e, "Ignoring unrecognized client message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_skip_waiting() {
        let msg = ClientMessage::from_value(&json!({"type": "SKIP_WAITING"}));
        assert_eq!(msg, Some(ClientMessage::SkipWaiting));
    }

    #[test]
    fn test_parse_store_data() {
        let msg = ClientMessage::from_value(&json!({"type": "STORE_DATA", "payload": [1, 2]}));
        assert_eq!(msg, Some(ClientMessage::StoreData { payload: json!([1, 2]) }));
    }

    #[test]
    fn test_parse_cache_emails_alias() {
        let msg = ClientMessage::from_value(&json!({
            "type": "CACHE_EMAILS",
            "emails": [{"to": "orders@example.com"}]
        }));
        assert_eq!(
            msg,
            Some(ClientMessage::StoreData {
                payload: json!([{"to": "orders@example.com"}])
            })
        );
    }

    #[test]
    fn test_unknown_messages_ignored() {
        assert_eq!(ClientMessage::from_value(&json!({"type": "REFRESH"})), None);
        assert_eq!(ClientMessage::from_value(&json!("SKIP_WAITING")), None);
        assert_eq!(ClientMessage::from_value(&Value::Null), None);
    }
}
