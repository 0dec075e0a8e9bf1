//! End-to-end: install, activate over a stale cache, then serve while the
//! network is down, all against the on-disk store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crumbcache_core::cache::{CacheStorage, DiskStorage, RequestKey};
use crumbcache_core::config::WorkerConfig;
use crumbcache_core::net::{FetchError, Fetcher, Request, Response};
use crumbcache_core::worker::{
    EventReply, OfflineCacheManager, RecordingHost, Registration, ResponseSource, WorkerEvent, WorkerState,
};
use reqwest::Url;
use serde_json::json;
use tempfile::TempDir;

const ORIGIN: &str = "https://cakes.example";

/// A tiny origin server that can be switched off.
#[derive(Default)]
struct Origin {
    pages: Mutex<HashMap<String, String>>,
    offline: Mutex<bool>,
}

impl Origin {
    fn serve(&self, path: &str, body: &str) {
        self.pages.lock().unwrap().insert(path.to_string(), body.to_string());
    }

    fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }
}

#[async_trait]
impl Fetcher for Origin {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if *self.offline.lock().unwrap() {
            return Err(FetchError::Unavailable("offline".to_string()));
        }
        match self.pages.lock().unwrap().get(request.url.path()) {
            Some(body) => Ok(Response::new(200, body.as_str()).with_header("Content-Type", "text/html")),
            None => Ok(Response::new(404, "Not Found").with_header("Content-Type", "text/plain")),
        }
    }
}

fn worker_config() -> WorkerConfig {
    let mut config = WorkerConfig::admin(ORIGIN);
    config.precache = vec!["/index.html".to_string()];
    config.offline_page = "/index.html".to_string();
    config.sync_tasks.clear();
    config
}

fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

#[tokio::test]
async fn test_install_activate_and_serve_offline() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(DiskStorage::new(dir.path().join("caches")).await.unwrap());
    storage
        .put("old-cache-v0", &RequestKey::get(&url("/index.html")), &Response::new(200, "stale"))
        .await
        .unwrap();

    let origin = Arc::new(Origin::default());
    origin.serve("/index.html", "<h1>Charlotte's Cakes</h1>");
    let host = Arc::new(RecordingHost::new());
    let manager = OfflineCacheManager::new(worker_config(), storage.clone(), origin.clone(), host.clone()).unwrap();

    // Install seeds the precache.
    manager.dispatch(WorkerEvent::Install).await.unwrap();
    let seeded = storage
        .match_in(manager.precache_name(), &RequestKey::get(&url("/index.html")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seeded.response.status, 200);

    // Activation evicts the stale partition.
    let reply = manager.dispatch(WorkerEvent::Activate).await.unwrap();
    match reply {
        EventReply::Activated(report) => assert_eq!(report.deleted, vec!["old-cache-v0"]),
        other => panic!("unexpected reply {:?}", other),
    }
    let mut names = storage.keys().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["cakes-admin-runtime".to_string(), "cakes-admin-v1".to_string()]);
    assert_eq!(manager.state(), WorkerState::Activated);

    // The landing page comes from the fresh precache, not the stale one.
    let home = manager.handle_fetch(&Request::get(url("/index.html"))).await;
    assert_eq!(home.response().unwrap().text(), "<h1>Charlotte's Cakes</h1>");

    origin.set_offline(true);

    let image = manager.handle_fetch(&Request::get(url("/missing.png"))).await;
    let response = image.response().unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.content_type(), Some("text/plain"));

    let page = manager.handle_fetch(&Request::navigate(url("/missing.png"))).await;
    assert_eq!(page.source(), Some(ResponseSource::OfflinePage));
    assert_eq!(page.response().unwrap().text(), "<h1>Charlotte's Cakes</h1>");
}

#[tokio::test]
async fn test_runtime_cache_serves_identical_body_after_restart() {
    let dir = TempDir::new().unwrap();
    let origin = Arc::new(Origin::default());
    origin.serve("/index.html", "home");
    origin.serve("/menu.html", "<ul><li>Brownies</li></ul>");

    let first_body = {
        let storage = Arc::new(DiskStorage::new(dir.path().to_path_buf()).await.unwrap());
        let manager = OfflineCacheManager::new(
            worker_config(),
            storage,
            origin.clone(),
            Arc::new(RecordingHost::new()),
        )
        .unwrap();
        manager.install().await.unwrap();
        manager.activate().await.unwrap();

        let first = manager.handle_fetch(&Request::get(url("/menu.html"))).await;
        assert_eq!(first.source(), Some(ResponseSource::Network));
        first.response().unwrap().body.clone()
    };

    origin.set_offline(true);

    // A fresh instance for the already-active version reads the same disk store.
    let storage = Arc::new(DiskStorage::new(dir.path().to_path_buf()).await.unwrap());
    let manager = OfflineCacheManager::resume(
        worker_config(),
        storage,
        origin,
        Arc::new(RecordingHost::new()),
        WorkerState::Activated,
    )
    .unwrap();
    let second = manager.handle_fetch(&Request::get(url("/menu.html"))).await;
    assert_eq!(second.source(), Some(ResponseSource::Cache));
    assert_eq!(second.response().unwrap().body, first_body);
}

#[tokio::test]
async fn test_failed_upgrade_keeps_previous_version() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(DiskStorage::new(dir.path().join("caches")).await.unwrap());
    let origin = Arc::new(Origin::default());
    origin.serve("/index.html", "v1 home");
    let mut registration = Registration::new(dir.path().to_path_buf());

    let v1 = worker_config();
    let manager = OfflineCacheManager::new(v1.clone(), storage.clone(), origin.clone(), Arc::new(RecordingHost::new())).unwrap();
    manager.install().await.unwrap();
    registration.record_installed(&v1);
    manager.activate().await.unwrap();
    registration.record_activated(&v1);

    let mut v2 = worker_config();
    v2.version = "v2".to_string();
    v2.precache.push("/new-feature.html".to_string());
    let upgrade = OfflineCacheManager::new(v2.clone(), storage.clone(), origin.clone(), Arc::new(RecordingHost::new())).unwrap();
    assert!(upgrade.install().await.is_err());
    assert_eq!(upgrade.state(), WorkerState::Redundant);

    assert_eq!(registration.active_version(), Some("v1"));
    assert_eq!(registration.state_for(&v1), WorkerState::Activated);
    let home = manager.handle_fetch(&Request::get(url("/index.html"))).await;
    assert_eq!(home.response().unwrap().text(), "v1 home");
}

#[tokio::test]
async fn test_skip_waiting_message_is_synchronous() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(DiskStorage::new(dir.path().to_path_buf()).await.unwrap());
    let host = Arc::new(RecordingHost::new());
    let mut config = worker_config();
    config.skip_waiting_on_install = false;
    let manager = OfflineCacheManager::new(config, storage, Arc::new(Origin::default()), host.clone()).unwrap();

    manager.skip_waiting();
    assert_eq!(host.skip_waiting_count(), 1);

    manager
        .dispatch(WorkerEvent::Message(json!({"type": "SKIP_WAITING"})))
        .await
        .unwrap();
    assert_eq!(host.skip_waiting_count(), 2);
    assert!(manager.skip_waiting_requested());
}
