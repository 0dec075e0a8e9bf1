use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SVG data URI rendering a single emoji, used for notification icons.
pub fn emoji_icon(emoji: &str) -> String {
    format!(
        "data:image/svg+xml,<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 100 100\"><text y=\".9em\" font-size=\"90\">{}</text></svg>",
        emoji
    )
}

/// What a notification click leads to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClickTarget {
    Open { url: String },
    Dismiss,
}

/// A configured notification action button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub action: String,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub target: ClickTarget,
}

/// A fixed notification, as used by sync tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub vibrate: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NotificationData {
    pub url: Option<String>,
    pub date_of_arrival: Option<DateTime<Utc>>,
}

/// A notification the host is asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl From<&NotificationTemplate> for Notification {
    fn from(template: &NotificationTemplate) -> Self {
        Self {
            title: template.title.clone(),
            body: template.body.clone(),
            icon: template.icon.clone(),
            badge: None,
            tag: template.tag.clone(),
            vibrate: template.vibrate.clone(),
            data: NotificationData::default(),
            actions: Vec::new(),
        }
    }
}

/// The user clicked a notification, or one of its action buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationClick {
    /// Empty or `None` means the notification body itself was clicked.
    pub action: Option<String>,
    pub data: NotificationData,
}

impl NotificationClick {
    pub fn action(action: &str) -> Self {
        Self {
            action: Some(action.to_string()),
            data: NotificationData::default(),
        }
    }

    /// The chosen action id, treating an empty string as no action.
    pub fn chosen_action(&self) -> Option<&str> {
        self.action.as_deref().filter(|a| !a.is_empty())
    }
}

/// An open window controlled by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}
