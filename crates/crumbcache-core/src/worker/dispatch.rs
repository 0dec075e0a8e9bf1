//! Event dispatch.
//!
//! Each host event maps to exactly one handler. `dispatch` awaits that
//! handler to completion, so the returned future is the event's wait-until:
//! the host must not consider the event handled, or tear the worker down,
//! before it resolves.

use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use super::manager::{ActivationReport, ClickOutcome, FetchOutcome, OfflineCacheManager, SyncOutcome};
use super::message::ClientMessage;
use super::notification::{Notification, NotificationClick};
use super::WorkerResult;
use crate::net::Request;

/// Host lifecycle events the worker consumes.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    /// Raw message posted by a page.
    Message(Value),
    /// Push with optional text payload.
    Push(Option<String>),
    NotificationClick(NotificationClick),
    /// Background sync tag.
    Sync(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Message,
    Push,
    NotificationClick,
    Sync,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
            EventKind::Message => "message",
            EventKind::Push => "push",
            EventKind::NotificationClick => "notificationclick",
            EventKind::Sync => "sync",
        }
    }
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
            WorkerEvent::Message(_) => EventKind::Message,
            WorkerEvent::Push(_) => EventKind::Push,
            WorkerEvent::NotificationClick(_) => EventKind::NotificationClick,
            WorkerEvent::Sync(_) => EventKind::Sync,
        }
    }
}

/// What a handled event produced.
#[derive(Debug, Clone, PartialEq)]
pub enum EventReply {
    Done,
    Activated(ActivationReport),
    Fetch(FetchOutcome),
    Notification(Notification),
    Click(ClickOutcome),
    Sync(SyncOutcome),
}

impl OfflineCacheManager {
    /// Run the handler for `event` to completion.
    ///
    /// Fetch events never fail. Unrecognized messages resolve to `Done`.
    pub async fn dispatch(&self, event: WorkerEvent) -> WorkerResult<EventReply> {
        let kind = event.kind();
        let span = info_span!("event", kind = kind.as_str());

        let result = async {
            match event {
                WorkerEvent::Install => self.install().await.map(|_| EventReply::Done),
                WorkerEvent::Activate => self.activate().await.map(EventReply::Activated),
                WorkerEvent::Fetch(request) => Ok(EventReply::Fetch(self.handle_fetch(&request).await)),
                WorkerEvent::Message(value) => match ClientMessage::from_value(&value) {
                    Some(message) => self.handle_message(message).await.map(|_| EventReply::Done),
                    None => Ok(EventReply::Done),
                },
                WorkerEvent::Push(payload) => self
                    .handle_push(payload.as_deref())
                    .await
                    .map(EventReply::Notification),
                WorkerEvent::NotificationClick(click) => self
                    .handle_notification_click(&click)
                    .await
                    .map(EventReply::Click),
                WorkerEvent::Sync(tag) => self.handle_sync(&tag).await.map(EventReply::Sync),
            }
        }
        .instrument(span)
        .await;

        match &result {
            Ok(_) => debug!(kind = kind.as_str(), "Event handled"),
            Err(e) => warn!(kind = kind.as_str(), error = %e, "Event handler failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStorage, MemoryStorage};
    use crate::config::{WorkerConfig, DEFAULT_ORIGIN};
    use crate::net::{FetchError, Fetcher, Response};
    use crate::worker::{RecordingHost, WorkerState};
    use async_trait::async_trait;
    use reqwest::Url;
    use serde_json::json;
    use std::sync::Arc;

    struct EchoFetcher;

    #[async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            Ok(Response::new(200, request.url.path().to_string()))
        }
    }

    fn manager() -> (OfflineCacheManager, Arc<RecordingHost>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let host = Arc::new(RecordingHost::new());
        let manager = OfflineCacheManager::new(
            WorkerConfig::admin(DEFAULT_ORIGIN),
            storage.clone(),
            Arc::new(EchoFetcher),
            host.clone(),
        )
        .unwrap();
        (manager, host, storage)
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(WorkerEvent::Install.kind().as_str(), "install");
        assert_eq!(WorkerEvent::Sync("x".to_string()).kind(), EventKind::Sync);
        assert_eq!(
            WorkerEvent::NotificationClick(NotificationClick::default()).kind().as_str(),
            "notificationclick"
        );
    }

    #[tokio::test]
    async fn test_dispatch_full_lifecycle() {
        let (manager, _host, _storage) = manager();

        assert_eq!(manager.dispatch(WorkerEvent::Install).await.unwrap(), EventReply::Done);
        let reply = manager.dispatch(WorkerEvent::Activate).await.unwrap();
        assert!(matches!(reply, EventReply::Activated(_)));
        assert_eq!(manager.state(), WorkerState::Activated);

        let url = Url::parse(DEFAULT_ORIGIN).unwrap().join("/fresh.css").unwrap();
        let reply = manager.dispatch(WorkerEvent::Fetch(Request::get(url))).await.unwrap();
        match reply {
            EventReply::Fetch(outcome) => assert_eq!(outcome.response().unwrap().text(), "/fresh.css"),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_skip_waiting_message_fires_before_dispatch_returns() {
        let (manager, host, _storage) = manager();
        manager
            .dispatch(WorkerEvent::Message(json!({"type": "SKIP_WAITING"})))
            .await
            .unwrap();
        assert_eq!(host.skip_waiting_count(), 1);
    }

    #[tokio::test]
    async fn test_store_data_message_completes_before_dispatch_returns() {
        let (manager, _host, storage) = manager();
        manager
            .dispatch(WorkerEvent::Message(json!({"type": "STORE_DATA", "payload": {"draft": true}})))
            .await
            .unwrap();
        assert_eq!(storage.entries("cakes-admin-runtime").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_message_is_ignored() {
        let (manager, host, _storage) = manager();
        let reply = manager.dispatch(WorkerEvent::Message(json!({"type": "PING"}))).await.unwrap();
        assert_eq!(reply, EventReply::Done);
        assert!(host.events().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_push_and_sync() {
        let (manager, host, _storage) = manager();
        let reply = manager.dispatch(WorkerEvent::Push(None)).await.unwrap();
        assert!(matches!(reply, EventReply::Notification(_)));

        let reply = manager
            .dispatch(WorkerEvent::Sync("background-sync-emails".to_string()))
            .await
            .unwrap();
        assert_eq!(reply, EventReply::Sync(SyncOutcome::Completed { refreshed: 1 }));
        assert_eq!(host.notifications().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_activate_out_of_order_fails() {
        let (manager, _host, _storage) = manager();
        assert!(manager.dispatch(WorkerEvent::Activate).await.is_err());
    }
}
