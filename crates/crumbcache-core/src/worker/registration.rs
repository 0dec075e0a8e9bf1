use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{WorkerError, WorkerResult, WorkerState};
use crate::config::WorkerConfig;

/// Registration file name in cache directory
const REGISTRATION_FILE: &str = "registration.json";

/// One recorded worker version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    pub precache: String,
    pub runtime: String,
    pub installed_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    /// Worker config this version was installed with
    #[serde(default)]
    pub config: Option<WorkerConfig>,
}

impl VersionRecord {
    fn from_config(config: &WorkerConfig) -> Self {
        Self {
            version: config.version.clone(),
            precache: config.precache_name(),
            runtime: config.runtime_name(),
            installed_at: Utc::now(),
            activated_at: None,
            config: Some(config.clone()),
        }
    }

    /// Config for running this version on `current`'s origin.
    ///
    /// Records written without a config reuse `current` with the recorded
    /// version, which yields the recorded partition names whenever the
    /// cache prefix is unchanged.
    pub fn worker_config(&self, current: &WorkerConfig) -> WorkerConfig {
        let mut config = match self.config {
            Some(ref config) => config.clone(),
            None => {
                let mut config = current.clone();
                config.version = self.version.clone();
                config
            }
        };
        config.origin = current.origin.clone();
        config
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationData {
    pub active: Option<VersionRecord>,
    pub waiting: Option<VersionRecord>,
}

/// The host's record of which worker version is active and which is
/// waiting. A failed install never touches it, so the previous active
/// version keeps serving.
pub struct Registration {
    cache_dir: PathBuf,
    pub data: RegistrationData,
}

impl Registration {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: RegistrationData::default(),
        }
    }

    /// Load registration from disk. Returns false when none was saved.
    pub fn load(&mut self) -> WorkerResult<bool> {
        let path = self.registration_path();
        if !path.exists() {
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| WorkerError::Registration(format!("Failed to read registration file: {}", e)))?;
        self.data = serde_json::from_str(&contents)
            .map_err(|e| WorkerError::Registration(format!("Failed to parse registration file: {}", e)))?;
        debug!(?path, "Registration loaded");
        Ok(true)
    }

    /// Save registration to disk
    pub fn save(&self) -> WorkerResult<()> {
        let path = self.registration_path();
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(&self.data)?;
            std::fs::write(&path, contents)
        };
        write().map_err(|e| WorkerError::Registration(format!("Failed to save registration file: {}", e)))
    }

    /// Clear registration data
    pub fn clear(&mut self) -> WorkerResult<()> {
        self.data = RegistrationData::default();
        let path = self.registration_path();
        if path.exists() {
            std::fs::remove_file(path)
                .map_err(|e| WorkerError::Registration(format!("Failed to remove registration file: {}", e)))?;
        }
        Ok(())
    }

    /// Install succeeded: this version now waits.
    pub fn record_installed(&mut self, config: &WorkerConfig) {
        self.data.waiting = Some(VersionRecord::from_config(config));
    }

    /// Activation finished: waiting becomes active.
    pub fn record_activated(&mut self, config: &WorkerConfig) {
        let mut record = match self.data.waiting.take() {
            Some(record) if record.version == config.version => record,
            _ => VersionRecord::from_config(config),
        };
        record.activated_at = Some(Utc::now());
        self.data.active = Some(record);
    }

    pub fn active_version(&self) -> Option<&str> {
        self.data.active.as_ref().map(|r| r.version.as_str())
    }

    pub fn waiting_version(&self) -> Option<&str> {
        self.data.waiting.as_ref().map(|r| r.version.as_str())
    }

    /// Where a fresh worker instance for `config` should resume.
    pub fn state_for(&self, config: &WorkerConfig) -> WorkerState {
        if self.waiting_version() == Some(config.version.as_str()) {
            WorkerState::Installed
        } else if self.active_version() == Some(config.version.as_str()) {
            WorkerState::Activated
        } else {
            WorkerState::Parsed
        }
    }

    /// The version that controls pages when a worker for `config` starts,
    /// and the state to resume it in.
    ///
    /// A version that is waiting, failed to install, or was never installed
    /// does not control anything: the recorded active version keeps serving.
    pub fn serving(&self, config: &WorkerConfig) -> (WorkerConfig, WorkerState) {
        let state = self.state_for(config);
        if state == WorkerState::Activated {
            return (config.clone(), state);
        }
        match self.data.active {
            Some(ref record) => (record.worker_config(config), WorkerState::Activated),
            None => (config.clone(), state),
        }
    }

    fn registration_path(&self) -> PathBuf {
        self.cache_dir.join(REGISTRATION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ORIGIN;
    use tempfile::TempDir;

    #[test]
    fn test_install_then_activate() {
        let dir = TempDir::new().unwrap();
        let config = WorkerConfig::admin(DEFAULT_ORIGIN);
        let mut reg = Registration::new(dir.path().to_path_buf());
        assert_eq!(reg.state_for(&config), WorkerState::Parsed);

        reg.record_installed(&config);
        assert_eq!(reg.state_for(&config), WorkerState::Installed);

        reg.record_activated(&config);
        assert_eq!(reg.state_for(&config), WorkerState::Activated);
        assert_eq!(reg.active_version(), Some("v1"));
        assert_eq!(reg.waiting_version(), None);
        assert!(reg.data.active.as_ref().unwrap().activated_at.is_some());
    }

    #[test]
    fn test_new_version_waits_behind_active() {
        let dir = TempDir::new().unwrap();
        let v1 = WorkerConfig::admin(DEFAULT_ORIGIN);
        let mut v2 = v1.clone();
        v2.version = "v2".to_string();

        let mut reg = Registration::new(dir.path().to_path_buf());
        reg.record_installed(&v1);
        reg.record_activated(&v1);
        reg.record_installed(&v2);

        assert_eq!(reg.active_version(), Some("v1"));
        assert_eq!(reg.waiting_version(), Some("v2"));
        assert_eq!(reg.state_for(&v2), WorkerState::Installed);
    }

    #[test]
    fn test_active_version_serves_while_upgrade_waits() {
        let dir = TempDir::new().unwrap();
        let v1 = WorkerConfig::admin(DEFAULT_ORIGIN);
        let mut v2 = v1.clone();
        v2.version = "v2".to_string();

        let mut reg = Registration::new(dir.path().to_path_buf());
        assert_eq!(reg.serving(&v1), (v1.clone(), WorkerState::Parsed));

        reg.record_installed(&v1);
        reg.record_activated(&v1);
        assert_eq!(reg.serving(&v1), (v1.clone(), WorkerState::Activated));

        // Not installed yet, then waiting: v1 serves both times.
        let (serving, state) = reg.serving(&v2);
        assert_eq!(state, WorkerState::Activated);
        assert_eq!(serving.precache_name(), "cakes-admin-v1");
        reg.record_installed(&v2);
        assert_eq!(reg.serving(&v2).0.version, "v1");

        reg.record_activated(&v2);
        assert_eq!(reg.serving(&v2), (v2.clone(), WorkerState::Activated));
    }

    #[test]
    fn test_record_without_config_uses_current_prefix() {
        let dir = TempDir::new().unwrap();
        let current = WorkerConfig::storefront("https://cupcakes.example");
        let mut reg = Registration::new(dir.path().to_path_buf());
        reg.data.active = Some(VersionRecord {
            version: "v0".to_string(),
            precache: "cupcakes-v0".to_string(),
            runtime: "cupcakes-runtime".to_string(),
            installed_at: Utc::now(),
            activated_at: Some(Utc::now()),
            config: None,
        });

        let (serving, state) = reg.serving(&current);
        assert_eq!(state, WorkerState::Activated);
        assert_eq!(serving.precache_name(), "cupcakes-v0");
        assert_eq!(serving.origin, "https://cupcakes.example");
    }

    #[test]
    fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let config = WorkerConfig::storefront(DEFAULT_ORIGIN);

        let mut reg = Registration::new(dir.path().to_path_buf());
        reg.record_installed(&config);
        reg.save().unwrap();

        let mut loaded = Registration::new(dir.path().to_path_buf());
        assert!(loaded.load().unwrap());
        assert_eq!(loaded.data, reg.data);

        loaded.clear().unwrap();
        let mut empty = Registration::new(dir.path().to_path_buf());
        assert!(!empty.load().unwrap());
    }
}
