use anyhow::Result;
use async_trait::async_trait;
use crumbcache_core::worker::{Host, Notification, WindowClient};
use crumbcache_core::Url;
use tracing::info;

/// `Host` for the command line: there are no real windows, so everything
/// the worker asks for is printed.
#[derive(Debug, Default)]
pub struct ConsoleHost;

impl ConsoleHost {
    pub fn new() -> Self {
        Self
    }
}

/// Render a notification the way it would appear in a system tray.
pub fn format_notification(notification: &Notification) -> String {
    let mut out = format!("🔔 {}\n   {}", notification.title, notification.body);
    if let Some(ref tag) = notification.tag {
        out.push_str(&format!("\n   tag: {}", tag));
    }
    if !notification.actions.is_empty() {
        let actions: Vec<String> = notification
            .actions
            .iter()
            .map(|a| format!("[{}] {}", a.action, a.title))
            .collect();
        out.push_str(&format!("\n   actions: {}", actions.join("  ")));
    }
    out
}

#[async_trait]
impl Host for ConsoleHost {
    fn skip_waiting(&self) {
        info!("Host: skip waiting");
        println!("Worker will activate without waiting");
    }

    async fn claim_clients(&self) -> Result<()> {
        info!("Host: claiming clients");
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        println!("{}", format_notification(notification));
        Ok(())
    }

    async fn window_clients(&self) -> Result<Vec<WindowClient>> {
        Ok(Vec::new())
    }

    async fn focus_window(&self, client: &WindowClient) -> Result<()> {
        println!("Focus window {} ({})", client.id, client.url);
        Ok(())
    }

    async fn open_window(&self, url: &Url) -> Result<()> {
        println!("Open window {}", url);
        Ok(())
    }
}
