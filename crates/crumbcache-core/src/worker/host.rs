//! The platform side of the worker.
//!
//! A browser would implement these as `skipWaiting`, `clients.claim`,
//! `showNotification`, `clients.matchAll`, `client.focus` and
//! `clients.openWindow`. The CLI implements them by printing.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;

use super::notification::{Notification, WindowClient};

#[async_trait]
pub trait Host: Send + Sync {
    /// Readiness to activate without waiting for old clients.
    /// Called synchronously from the message handler; must not block.
    fn skip_waiting(&self);

    /// Take control of already-open pages.
    async fn claim_clients(&self) -> Result<()>;

    async fn show_notification(&self, notification: &Notification) -> Result<()>;

    /// Open windows controlled by this worker.
    async fn window_clients(&self) -> Result<Vec<WindowClient>>;

    async fn focus_window(&self, client: &WindowClient) -> Result<()>;

    async fn open_window(&self, url: &Url) -> Result<()>;
}
