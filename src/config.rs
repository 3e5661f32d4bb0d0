//! Persisted client configuration: registry URL and credentials
//!
//! The on-disk layout is a single JSON document at `<config dir>/config.json`.
//! The config dir is `$GLOPM_HOME`, else `$HOME/.glopm`.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CACHE_DIR_NAME: &str = "cache";

/// Authenticated identity.
///
/// Both `user_id` and `api_key` are always present together; a session is
/// either fully authenticated or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub api_key: String,
    #[serde(default)]
    pub username: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, api_key: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            api_key: api_key.into(),
            username: username.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.user_id.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// API key shortened for display
    pub fn masked_api_key(&self) -> String {
        let prefix: String = self.api_key.chars().take(6).collect();
        format!("{}...", prefix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            credentials: None,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        ValidationErrorHandler::validate_api_url(&self.api_url)?;
        Ok(())
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(RegistryError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            RegistryError::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?;

        // Half-written credentials count as logged out.
        if config.credentials.as_ref().is_some_and(|c| !c.is_complete()) {
            config.credentials = None;
        }

        Ok(config)
    }

    /// Write atomically through a temp file next to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RegistryError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                RegistryError::Config(format!("Failed to write {}: {}", path.display(), e))
            })
    }

    /// Apply per-invocation overrides (flag beats env beats file).
    pub fn with_overrides(mut self, api_url_flag: Option<String>) -> Self {
        if let Ok(url) = std::env::var("GLOPM_API_URL") {
            if !url.trim().is_empty() {
                self.api_url = url;
            }
        }
        if let Some(url) = api_url_flag {
            self.api_url = url;
        }
        self
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    /// Drop credentials, returning the username that was logged in.
    pub fn clear_credentials(&mut self) -> Option<String> {
        self.credentials.take().map(|c| c.username)
    }

    pub fn is_logged_in(&self) -> bool {
        self.credentials.is_some()
    }
}

/// Filesystem locations derived from the config directory
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
}

impl ConfigPaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// `$GLOPM_HOME`, else `$HOME/.glopm`, else `./.glopm`
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var("GLOPM_HOME") {
            if !dir.trim().is_empty() {
                return Self::new(dir);
            }
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".glopm"))
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config_dir.join(CACHE_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(!config.is_logged_in());
    }

    #[test]
    fn test_save_and_load_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path().join("nested"));

        let mut config = AppConfig::default();
        config.api_url = "https://registry.example.com/api".to_string();
        config.set_credentials(Credentials::new("42", "abcdef123456", "alice"));
        config.save(&paths.config_file()).unwrap();

        let loaded = AppConfig::load(&paths.config_file()).unwrap();
        assert_eq!(loaded.api_url, "https://registry.example.com/api");
        assert_eq!(loaded.credentials, Some(Credentials::new("42", "abcdef123456", "alice")));
    }

    #[test]
    fn test_partial_credentials_load_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_url": "http://localhost/api", "credentials": {"user_id": "7", "api_key": ""}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_clear_credentials_returns_username() {
        let mut config = AppConfig::default();
        config.set_credentials(Credentials::new("1", "key", "bob"));
        assert_eq!(config.clear_credentials(), Some("bob".to_string()));
        assert_eq!(config.clear_credentials(), None);
    }

    #[test]
    fn test_masked_api_key() {
        let creds = Credentials::new("1", "abcdefghijkl", "bob");
        assert_eq!(creds.masked_api_key(), "abcdef...");
    }

    #[test]
    fn test_corrupt_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(RegistryError::Config(_))));
    }
}
