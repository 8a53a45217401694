//! Configuration storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dwn::Did;

const DEFAULT_ENDPOINT: &str = "http://localhost:8085";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the local DWN agent
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// How often the agent syncs with remote nodes
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    /// Identity the agent reported on the last successful connect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<Did>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            sync_interval_secs: default_sync_interval(),
            did: None,
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "burn-book", "burn-book")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // The file names the user's identity; keep it private
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Remember the identity; returns true when it changed.
    pub fn set_did(&mut self, did: &Did) -> bool {
        if self.did.as_ref() == Some(did) {
            return false;
        }
        self.did = Some(did.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("burn-book-test-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let cfg = Config::load_from(&temp_path("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.endpoint, "http://localhost:8085");
        assert_eq!(cfg.sync_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_path("config.toml");
        let mut cfg = Config::default();
        cfg.endpoint = "http://127.0.0.1:9000".to_string();
        assert!(cfg.set_did(&Did::from("did:example:me")));
        assert!(!cfg.set_did(&Did::from("did:example:me")));
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let cfg: Config = toml::from_str("sync_interval_secs = 30\n").unwrap();
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.sync_interval_secs, 30);
        assert_eq!(cfg.did, None);
    }
}
