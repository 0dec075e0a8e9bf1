//! The offline cache manager.
//!
//! Keeps a versioned precache plus a runtime cache, answers fetches
//! cache-first with network fallback, and falls back again to a canned
//! offline response when both miss.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::{join_all, try_join_all};
use reqwest::Url;
use tracing::{debug, error, info, warn};

use super::lifecycle::Lifecycle;
use super::message::ClientMessage;
use super::notification::{
    ClickTarget, Notification, NotificationAction, NotificationClick, NotificationData,
};
use super::{Host, WorkerError, WorkerResult, WorkerState};
use crate::cache::{CacheStorage, RequestKey};
use crate::config::WorkerConfig;
use crate::net::{FetchError, Fetcher, Request, Response};

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// Cached offline page served to a navigation
    OfflinePage,
    /// Synthesized 503
    OfflineFallback,
}

/// Result of fetch interception.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the request goes to the network untouched.
    PassThrough,
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::PassThrough => None,
            FetchOutcome::Respond { response, .. } => Some(response),
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::PassThrough => None,
            FetchOutcome::Respond { source, .. } => Some(*source),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, FetchOutcome::PassThrough)
    }
}

/// What activation cleaned up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Dismissed,
    Focused(String),
    Opened(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    UnknownTag,
    Completed { refreshed: usize },
    Failed { errors: Vec<String> },
}

struct Inner {
    config: WorkerConfig,
    origin: Url,
    precache_name: String,
    runtime_name: String,
    network_timeout: Duration,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn Host>,
    /// Never held across an await.
    lifecycle: Mutex<Lifecycle>,
}

/// One worker instance. Clone is cheap and clones share state, so
/// concurrent fetch events can each hold their own handle.
#[derive(Clone)]
pub struct OfflineCacheManager {
    inner: Arc<Inner>,
}

impl OfflineCacheManager {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn Host>,
    ) -> WorkerResult<Self> {
        Self::resume(config, storage, fetcher, host, WorkerState::Parsed)
    }

    /// Build an instance for a version the host already installed or activated.
    pub fn resume(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn Host>,
        state: WorkerState,
    ) -> WorkerResult<Self> {
        config.validate()?;
        let origin = config.origin_url()?;

        Ok(Self {
            inner: Arc::new(Inner {
                precache_name: config.precache_name(),
                runtime_name: config.runtime_name(),
                network_timeout: Duration::from_secs(config.network_timeout_secs),
                config,
                origin,
                storage,
                fetcher,
                host,
                lifecycle: Mutex::new(Lifecycle::resume(state)),
            }),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn origin(&self) -> &Url {
        &self.inner.origin
    }

    pub fn precache_name(&self) -> &str {
        &self.inner.precache_name
    }

    pub fn runtime_name(&self) -> &str {
        &self.inner.runtime_name
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.inner.storage
    }

    pub fn state(&self) -> WorkerState {
        self.with_lifecycle(|lc| lc.state())
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.with_lifecycle(|lc| lc.skip_waiting())
    }

    fn with_lifecycle<T>(&self, f: impl FnOnce(&mut Lifecycle) -> T) -> T {
        // A poisoned lock only means another handler panicked mid-update;
        // the state itself is a plain enum and still usable.
        let mut guard = match self.inner.lifecycle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn transition(&self, next: WorkerState) -> WorkerResult<()> {
        self.with_lifecycle(|lc| lc.transition(next))?;
        debug!(state = %next, "Worker state changed");
        Ok(())
    }

    async fn with_timeout(
        &self,
        fetch: impl Future<Output = Result<Response, FetchError>>,
    ) -> Result<Response, FetchError> {
        match tokio::time::timeout(self.inner.network_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.inner.network_timeout.as_secs())),
        }
    }

    // ===== Install =====

    /// Fetch and store the whole precache manifest.
    ///
    /// Either every entry is stored or none is. A failure leaves this
    /// instance `Redundant`; it is never retried here.
    pub async fn install(&self) -> WorkerResult<()> {
        self.transition(WorkerState::Installing)?;
        info!(cache = self.precache_name(), "Installing");

        match self.precache().await {
            Ok(count) => {
                self.transition(WorkerState::Installed)?;
                info!(cache = self.precache_name(), count, "Core files cached");
                if self.inner.config.skip_waiting_on_install {
                    self.skip_waiting();
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Install failed");
                self.transition(WorkerState::Redundant)?;
                Err(e)
            }
        }
    }

    async fn precache(&self) -> WorkerResult<usize> {
        let urls = self.inner.config.precache_urls()?;
        let existed = self.inner.storage.has(self.precache_name()).await?;
        self.inner.storage.open(self.precache_name()).await?;

        let result = self.fill_precache(&urls).await;
        if result.is_err() && !existed {
            // A partition this install created must not outlive it.
            if let Err(e) = self.inner.storage.delete(self.precache_name()).await {
                warn!(cache = self.precache_name(), error = %e, "Failed to discard partial precache");
            }
        }
        result
    }

    async fn fill_precache(&self, urls: &[Url]) -> WorkerResult<usize> {
        let fetches = urls.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = self
                .with_timeout(self.inner.fetcher.fetch_ok(&request))
                .await
                .map_err(|source| WorkerError::Install {
                    url: url.to_string(),
                    source,
                })?;
            Ok::<_, WorkerError>((RequestKey::get(url), response))
        });
        let responses = try_join_all(fetches).await?;

        for (key, response) in &responses {
            self.inner
                .storage
                .put(self.precache_name(), key, response)
                .await
                .map_err(|source| WorkerError::InstallStore {
                    url: key.url.clone(),
                    source,
                })?;
        }
        Ok(responses.len())
    }

    // ===== Activate =====

    /// Delete every partition outside the active cache set, then claim
    /// open clients. Only valid from `Installed`.
    ///
    /// A partition that fails to delete is reported and logged; it does not
    /// stop activation.
    pub async fn activate(&self) -> WorkerResult<ActivationReport> {
        self.transition(WorkerState::Activating)?;
        info!("Activating");

        let keep = self.inner.config.active_cache_set();
        let names = match self.inner.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list caches during activation");
                Vec::new()
            }
        };

        let stale: Vec<String> = names.into_iter().filter(|n| !keep.contains(n)).collect();
        let deletions = stale.iter().map(|name| async move {
            info!(cache = %name, "Deleting old cache");
            (name.clone(), self.inner.storage.delete(name).await)
        });

        let mut report = ActivationReport::default();
        for (name, result) in join_all(deletions).await {
            match result {
                Ok(_) => report.deleted.push(name),
                Err(e) => {
                    warn!(cache = %name, error = %e, "Failed to delete old cache");
                    report.failed.push(name);
                }
            }
        }

        // After this the store holds exactly the active set.
        if let Err(e) = self.inner.storage.open(self.runtime_name()).await {
            warn!(cache = self.runtime_name(), error = %e, "Failed to open runtime cache");
        }

        if let Err(e) = self.inner.host.claim_clients().await {
            warn!(error = %e, "Failed to claim clients");
        }

        self.transition(WorkerState::Activated)?;
        info!(deleted = report.deleted.len(), "Activated");
        Ok(report)
    }

    // ===== Fetch =====

    /// Cache-first with network fallback and refresh-on-miss.
    ///
    /// Non-GET and cross-origin requests, and anything arriving before
    /// activation, pass through untouched. Intercepted requests never fail:
    /// the worst case is the offline page or the synthesized 503.
    pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        if !request.is_get() {
            return FetchOutcome::PassThrough;
        }
        if !request.is_same_origin(&self.inner.origin) {
            return FetchOutcome::PassThrough;
        }
        if !self.with_lifecycle(|lc| lc.is_controlling()) {
            debug!(url = %request.url, "Not controlling yet, passing through");
            return FetchOutcome::PassThrough;
        }

        let key = RequestKey::from_request(request);
        match self.inner.storage.match_any(&key).await {
            Ok(Some(entry)) => {
                debug!(url = %request.url, "Serving from cache");
                return FetchOutcome::Respond {
                    response: entry.response,
                    source: ResponseSource::Cache,
                };
            }
            Ok(None) => {}
            Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed"),
        }

        match self.with_timeout(self.inner.fetcher.fetch(request)).await {
            Ok(response) => {
                if response.is_cacheable() {
                    // The store keeps its own copy; the original goes back to the page.
                    if let Err(e) = self
                        .inner
                        .storage
                        .put(self.runtime_name(), &key, &response)
                        .await
                    {
                        warn!(url = %request.url, error = %e, "Failed to cache runtime response");
                    }
                }
                FetchOutcome::Respond {
                    response,
                    source: ResponseSource::Network,
                }
            }
            Err(e) => {
                if e.is_network_failure() {
                    warn!(url = %request.url, error = %e, "Network unavailable, serving offline fallback");
                } else {
                    warn!(url = %request.url, error = %e, "Fetch failed, serving offline fallback");
                }
                self.offline_response(request).await
            }
        }
    }

    async fn offline_response(&self, request: &Request) -> FetchOutcome {
        if request.is_navigation() {
            match self.inner.config.resolve(&self.inner.config.offline_page) {
                Ok(url) => match self.inner.storage.match_any(&RequestKey::get(&url)).await {
                    Ok(Some(entry)) => {
                        return FetchOutcome::Respond {
                            response: entry.response,
                            source: ResponseSource::OfflinePage,
                        };
                    }
                    Ok(None) => debug!(url = %url, "Offline page not cached"),
                    Err(e) => warn!(error = %e, "Offline page lookup failed"),
                },
                Err(e) => warn!(error = %e, "Invalid offline page"),
            }
        }

        FetchOutcome::Respond {
            response: Response::offline(),
            source: ResponseSource::OfflineFallback,
        }
    }

    // ===== Messages =====

    /// Activate as soon as possible. Signals the host before returning.
    pub fn skip_waiting(&self) {
        self.with_lifecycle(|lc| lc.set_skip_waiting());
        self.inner.host.skip_waiting();
        info!("Skip waiting requested");
    }

    pub async fn handle_message(&self, message: ClientMessage) -> WorkerResult<()> {
        match message {
            ClientMessage::SkipWaiting => {
                self.skip_waiting();
                Ok(())
            }
            ClientMessage::StoreData { payload } => {
                let url = self.inner.config.resolve(&self.inner.config.store_data_key)?;
                let body = serde_json::to_vec(&payload)?;
                let response = Response::new(200, body).with_header("Content-Type", "application/json");
                self.inner
                    .storage
                    .put(self.runtime_name(), &RequestKey::get(&url), &response)
                    .await?;
                debug!(url = %url, "Stored client data");
                Ok(())
            }
        }
    }

    // ===== Push / notification click =====

    /// Build and show the push notification. An empty payload falls back to
    /// the configured default body.
    pub async fn handle_push(&self, payload: Option<&str>) -> WorkerResult<Notification> {
        let push = &self.inner.config.push;
        let body = payload
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(push.default_body.as_str())
            .to_string();

        let notification = Notification {
            title: push.title.clone(),
            body,
            icon: Some(push.icon.clone()),
            badge: Some(push.badge.clone()),
            tag: None,
            vibrate: push.vibrate.clone(),
            data: NotificationData {
                url: Some(push.url.clone()),
                date_of_arrival: Some(Utc::now()),
            },
            actions: push
                .actions
                .iter()
                .map(|a| NotificationAction {
                    action: a.action.clone(),
                    title: a.title.clone(),
                    icon: a.icon.clone(),
                })
                .collect(),
        };

        self.show(&notification).await?;
        Ok(notification)
    }

    async fn show(&self, notification: &Notification) -> WorkerResult<()> {
        self.inner
            .host
            .show_notification(notification)
            .await
            .map_err(|e| WorkerError::Host(format!("{:#}", e)))
    }

    /// Route a click to its target. Unknown actions go to the profile's
    /// `unknown_action_target`, or the default target when it has none.
    pub async fn handle_notification_click(&self, click: &NotificationClick) -> WorkerResult<ClickOutcome> {
        let push = &self.inner.config.push;
        let target = match click.chosen_action() {
            None => &push.default_target,
            Some(action) => match push.actions.iter().find(|a| a.action == action) {
                Some(config) => &config.target,
                None => {
                    debug!(action, "Unknown notification action");
                    push.unknown_action_target.as_ref().unwrap_or(&push.default_target)
                }
            },
        };

        let url = match target {
            ClickTarget::Dismiss => return Ok(ClickOutcome::Dismissed),
            ClickTarget::Open { url } => self.inner.config.resolve(url)?,
        };

        let host = &self.inner.host;
        if push.focus_existing_window {
            let windows = host
                .window_clients()
                .await
                .map_err(|e| WorkerError::Host(format!("{:#}", e)))?;
            if let Some(window) = windows.iter().find(|w| w.url.contains(url.path())) {
                host.focus_window(window)
                    .await
                    .map_err(|e| WorkerError::Host(format!("{:#}", e)))?;
                return Ok(ClickOutcome::Focused(window.id.clone()));
            }
        }

        host.open_window(&url)
            .await
            .map_err(|e| WorkerError::Host(format!("{:#}", e)))?;
        Ok(ClickOutcome::Opened(url))
    }

    // ===== Background sync =====

    /// Refresh the task's URLs into the runtime cache and report the result
    /// with a notification.
    pub async fn handle_sync(&self, tag: &str) -> WorkerResult<SyncOutcome> {
        let Some(task) = self.inner.config.sync_tasks.iter().find(|t| t.tag == tag) else {
            debug!(tag, "No sync task for tag");
            return Ok(SyncOutcome::UnknownTag);
        };
        info!(tag, "Background sync triggered");

        let mut errors = Vec::new();
        for path in &task.refresh {
            let url = self.inner.config.resolve(path)?;
            let request = Request::get(url.clone());
            match self.with_timeout(self.inner.fetcher.fetch_ok(&request)).await {
                Ok(response) if response.is_cacheable() => {
                    if let Err(e) = self
                        .inner
                        .storage
                        .put(self.runtime_name(), &RequestKey::get(&url), &response)
                        .await
                    {
                        errors.push(format!("{}: {}", url, e));
                    }
                }
                Ok(response) => debug!(url = %url, status = response.status, "Not caching sync response"),
                Err(e) => errors.push(format!("{}: {}", url, e)),
            }
        }

        if errors.is_empty() {
            self.show(&Notification::from(&task.notification)).await?;
            info!(tag, refreshed = task.refresh.len(), "Background sync completed");
            Ok(SyncOutcome::Completed {
                refreshed: task.refresh.len(),
            })
        } else {
            warn!(tag, failures = errors.len(), "Background sync failed");
            if let Some(ref failure) = task.failure_notification {
                self.show(&Notification::from(failure)).await?;
            }
            Ok(SyncOutcome::Failed { errors })
        }
    }
}
