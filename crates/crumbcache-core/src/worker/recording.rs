//! A `Host` that records every call, for tests.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;

use super::host::Host;
use super::notification::{Notification, WindowClient};

/// Everything a `RecordingHost` has been asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    SkipWaiting,
    ClaimClients,
    ShowNotification(Notification),
    FocusWindow(String),
    OpenWindow(String),
}

/// `Host` that records every call and reports a fixed set of open windows.
#[derive(Debug, Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
    windows: Mutex<Vec<WindowClient>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_windows(windows: Vec<WindowClient>) -> Self {
        Self {
            events: Mutex::default(),
            windows: Mutex::new(windows),
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::ShowNotification(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn skip_waiting_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, HostEvent::SkipWaiting))
            .count()
    }

    fn record(&self, event: HostEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl Host for RecordingHost {
    fn skip_waiting(&self) {
        self.record(HostEvent::SkipWaiting);
    }

    async fn claim_clients(&self) -> Result<()> {
        self.record(HostEvent::ClaimClients);
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        self.record(HostEvent::ShowNotification(notification.clone()));
        Ok(())
    }

    async fn window_clients(&self) -> Result<Vec<WindowClient>> {
        Ok(self.windows.lock().map(|w| w.clone()).unwrap_or_default())
    }

    async fn focus_window(&self, client: &WindowClient) -> Result<()> {
        self.record(HostEvent::FocusWindow(client.id.clone()));
        Ok(())
    }

    async fn open_window(&self, url: &Url) -> Result<()> {
        self.record(HostEvent::OpenWindow(url.to_string()));
        if let Ok(mut windows) = self.windows.lock() {
            let id = format!("window-{}", windows.len() + 1);
            windows.push(WindowClient {
                id,
                url: url.to_string(),
            });
        }
        Ok(())
    }
}
