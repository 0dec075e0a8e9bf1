//! Configuration management.
//!
//! Two layers live here:
//! - `WorkerConfig`: everything one offline cache manager needs (origin,
//!   cache names, precache manifest, offline page, push and sync profiles).
//!   The built-in `storefront` and `admin` profiles cover the public shop
//!   and the admin panel.
//! - `Config`: the user's settings file, stored at
//!   `~/.config/crumbcache/config.json`, selecting a profile and optionally
//!   overriding the origin, cache directory or the whole worker config.

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::storage::validate_partition_name;
use crate::net::{resolve_url, same_origin};
use crate::worker::notification::{emoji_icon, ActionConfig, ClickTarget, NotificationTemplate};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "crumbcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin used when nothing else is configured
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";

/// Default timeout on the network-fallback path.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 10;

/// Runtime-cache key that `STORE_DATA` messages write to by default
pub const DEFAULT_STORE_DATA_KEY: &str = "/offline-data";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find {0} directory")]
    NoDirectory(&'static str),

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid origin {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("Precache entry {0:?} is not on the configured origin")]
    CrossOriginManifestEntry(String),

    #[error("Invalid URL {url:?} in config: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid cache name {0:?}")]
    InvalidCacheName(String),

    #[error("Network timeout must be at least one second")]
    ZeroTimeout,
}

/// Built-in worker profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Storefront,
    Admin,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Storefront => "storefront",
            Profile::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "storefront" | "shop" => Ok(Profile::Storefront),
            "admin" => Ok(Profile::Admin),
            other => Err(format!("unknown profile {:?} (expected storefront or admin)", other)),
        }
    }
}

/// Push notification settings for a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushProfile {
    pub title: String,
    pub default_body: String,
    pub icon: String,
    pub badge: String,
    #[serde(default)]
    pub vibrate: Vec<u32>,
    /// URL carried in the notification data
    pub url: String,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    /// Where a click without an action goes
    pub default_target: ClickTarget,
    /// Where a click with an unrecognized action goes; `None` means `default_target`
    #[serde(default)]
    pub unknown_action_target: Option<ClickTarget>,
    /// Focus an already-open window on the target instead of opening another
    #[serde(default)]
    pub focus_existing_window: bool,
}

/// A background sync tag and what it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    pub tag: String,
    /// URLs re-fetched into the runtime cache
    #[serde(default)]
    pub refresh: Vec<String>,
    pub notification: NotificationTemplate,
    #[serde(default)]
    pub failure_notification: Option<NotificationTemplate>,
}

/// Everything one offline cache manager needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub origin: String,
    pub cache_prefix: String,
    pub version: String,
    pub precache: Vec<String>,
    /// Served to navigations when both cache and network miss
    pub offline_page: String,
    #[serde(default = "default_store_data_key")]
    pub store_data_key: String,
    #[serde(default = "default_network_timeout")]
    pub network_timeout_secs: u64,
    /// Signal skip-waiting as soon as install succeeds
    #[serde(default)]
    pub skip_waiting_on_install: bool,
    pub push: PushProfile,
    #[serde(default)]
    pub sync_tasks: Vec<SyncTask>,
}

fn default_store_data_key() -> String {
    DEFAULT_STORE_DATA_KEY.to_string()
}

fn default_network_timeout() -> u64 {
    DEFAULT_NETWORK_TIMEOUT_SECS
}

impl WorkerConfig {
    pub fn for_profile(profile: Profile, origin: &str) -> Self {
        match profile {
            Profile::Storefront => Self::storefront(origin),
            Profile::Admin => Self::admin(origin),
        }
    }

    /// Public shop: shop pages and product pictures, no runtime skip-waiting.
    pub fn storefront(origin: &str) -> Self {
        let cupcake = emoji_icon("🧁");
        Self {
            origin: origin.to_string(),
            cache_prefix: "cupcakes".to_string(),
            version: "v1".to_string(),
            precache: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/shop.html".to_string(),
                "/manifest.json".to_string(),
                "/pictures/shortbread delight.jpg".to_string(),
                "/pictures/brownies.jpg".to_string(),
                "/pictures/vaniliacupcakes.jpg".to_string(),
            ],
            offline_page: "/".to_string(),
            store_data_key: DEFAULT_STORE_DATA_KEY.to_string(),
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            skip_waiting_on_install: false,
            push: PushProfile {
                title: "Cupcakes on the Avenue 🧁".to_string(),
                default_body: "New update from Cupcakes on the Avenue! 🧁".to_string(),
                icon: cupcake.clone(),
                badge: cupcake.clone(),
                vibrate: vec![100, 50, 100],
                url: "/".to_string(),
                actions: vec![
                    ActionConfig {
                        action: "view".to_string(),
                        title: "View Shop".to_string(),
                        icon: Some(emoji_icon("🛍️")),
                        target: ClickTarget::Open {
                            url: "/shop.html".to_string(),
                        },
                    },
                    ActionConfig {
                        action: "close".to_string(),
                        title: "Close".to_string(),
                        icon: Some(emoji_icon("❌")),
                        target: ClickTarget::Dismiss,
                    },
                ],
                default_target: ClickTarget::Open { url: "/".to_string() },
                unknown_action_target: None,
                focus_existing_window: false,
            },
            sync_tasks: vec![SyncTask {
                tag: "weekly-bakes-update".to_string(),
                refresh: vec!["/shop.html".to_string()],
                notification: NotificationTemplate {
                    title: "Weekly Bakes Updated! 🍰".to_string(),
                    body: "Check out this week's fresh bakes at Highworth Market!".to_string(),
                    icon: Some(cupcake),
                    tag: Some("weekly-bakes".to_string()),
                    vibrate: vec![200, 100, 200],
                },
                failure_notification: None,
            }],
        }
    }

    /// Admin panel: a single self-contained page that takes over immediately.
    pub fn admin(origin: &str) -> Self {
        let admin_icon = emoji_icon("🧁");
        Self {
            origin: origin.to_string(),
            cache_prefix: "cakes-admin".to_string(),
            version: "v1".to_string(),
            precache: vec!["/admin.html".to_string(), "/admin-manifest.json".to_string()],
            offline_page: "/admin.html".to_string(),
            store_data_key: "/offline-emails".to_string(),
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            skip_waiting_on_install: true,
            push: PushProfile {
                title: "Charlotte's Cakes Admin".to_string(),
                default_body: "New notification from Charlotte's Cakes Admin".to_string(),
                icon: admin_icon.clone(),
                badge: admin_icon.clone(),
                vibrate: vec![200, 100, 200],
                url: "/admin.html".to_string(),
                actions: vec![
                    ActionConfig {
                        action: "open".to_string(),
                        title: "Open Admin".to_string(),
                        icon: Some(emoji_icon("📱")),
                        target: ClickTarget::Open {
                            url: "/admin.html".to_string(),
                        },
                    },
                    ActionConfig {
                        action: "dismiss".to_string(),
                        title: "Dismiss".to_string(),
                        icon: Some(emoji_icon("❌")),
                        target: ClickTarget::Dismiss,
                    },
                ],
                default_target: ClickTarget::Open {
                    url: "/admin.html".to_string(),
                },
                unknown_action_target: Some(ClickTarget::Dismiss),
                focus_existing_window: true,
            },
            sync_tasks: vec![SyncTask {
                tag: "background-sync-emails".to_string(),
                refresh: vec!["/admin.html".to_string()],
                notification: NotificationTemplate {
                    title: "Charlotte's Cakes Admin".to_string(),
                    body: "Pending emails synced successfully".to_string(),
                    icon: Some(emoji_icon("✅")),
                    tag: Some("email-sync".to_string()),
                    vibrate: Vec::new(),
                },
                failure_notification: Some(NotificationTemplate {
                    title: "Charlotte's Cakes Admin".to_string(),
                    body: "Email sync failed - check connection".to_string(),
                    icon: Some(emoji_icon("❌")),
                    tag: Some("email-sync-error".to_string()),
                    vibrate: Vec::new(),
                }),
            }],
        }
    }

    pub fn precache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    pub fn runtime_name(&self) -> String {
        format!("{}-runtime", self.cache_prefix)
    }

    /// The only two partition names this version keeps.
    pub fn active_cache_set(&self) -> [String; 2] {
        [self.precache_name(), self.runtime_name()]
    }

    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin).map_err(|e| ConfigError::InvalidOrigin {
            origin: self.origin.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidOrigin {
                origin: self.origin.clone(),
                reason: "expected an http(s) URL with a host".to_string(),
            });
        }
        Ok(url)
    }

    /// Resolve a configured path against the origin.
    pub fn resolve(&self, url: &str) -> Result<Url, ConfigError> {
        let origin = self.origin_url()?;
        resolve_url(&origin, url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolved precache manifest. Every entry must stay on the origin.
    pub fn precache_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.origin_url()?;
        self.precache
            .iter()
            .map(|entry| {
                let url = self.resolve(entry)?;
                if same_origin(&url, &origin) {
                    Ok(url)
                } else {
                    Err(ConfigError::CrossOriginManifestEntry(entry.clone()))
                }
            })
            .collect()
    }

    /// Check everything that would otherwise fail at install or activation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        for name in self.active_cache_set() {
            validate_partition_name(&name).map_err(|_| ConfigError::InvalidCacheName(name.clone()))?;
        }
        self.precache_urls()?;
        self.resolve(&self.offline_page)?;
        self.resolve(&self.store_data_key)?;
        for task in &self.sync_tasks {
            for url in &task.refresh {
                self.resolve(url)?;
            }
        }
        Ok(())
    }
}

/// The user's settings file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub profile: Profile,
    pub origin: Option<String>,
    pub cache_dir: Option<PathBuf>,
    /// Full override of the profile's worker config
    pub worker: Option<WorkerConfig>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`, defaulting when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Cache directory for the selected profile.
    pub fn cache_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir().ok_or(ConfigError::NoDirectory("cache"))?;
        Ok(cache_dir.join(APP_NAME).join(self.profile.as_str()))
    }

    /// Worker config for the selected profile, with the origin override applied.
    pub fn worker_config(&self) -> WorkerConfig {
        let origin = self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        match self.worker {
            Some(ref worker) => {
                let mut worker = worker.clone();
                if let Some(ref origin) = self.origin {
                    worker.origin = origin.clone();
                }
                worker
            }
            None => WorkerConfig::for_profile(self.profile, origin),
        }
    }
}
