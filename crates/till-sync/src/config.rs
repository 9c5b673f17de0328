//! # Sync Configuration
//!
//! Configuration management for the terminal's sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_SERVER_URL=http://10.0.0.5:3000                               │
//! │     TILL_TERMINAL_ID=register-1                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pos/sync.toml (Linux)                                    │
//! │     ~/Library/Application Support/com.till.pos/sync.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost server, 300 s sync interval, generated terminal id       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [terminal]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Register 1"
//! tenant_id = "00000000-0000-0000-0000-000000000001"
//! cashier_id = "cashier-1"
//!
//! [server]
//! url = "http://localhost:3000"
//! request_timeout_secs = 10
//!
//! [sync]
//! enabled = true
//! interval_secs = 300
//! probe_interval_secs = 15
//! trigger_after_sale = true
//!
//! [storage]
//! database_path = "/var/lib/till/till.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use till_core::DEFAULT_TENANT_ID;

// =============================================================================
// Terminal Configuration
// =============================================================================

/// Identity of this terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Unique terminal identifier. Generated, and saved by
    /// [`SyncConfig::load_or_init`], on first run.
    pub id: String,

    /// Human-readable name (e.g., "Register 1").
    #[serde(default = "default_terminal_name")]
    pub name: String,

    /// Tenant this terminal sells for. Sent as `X-Tenant-Id`.
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,

    /// Cashier stamped on sales when the CLI isn't given one.
    #[serde(default = "default_cashier_id")]
    pub cashier_id: String,
}

fn default_terminal_name() -> String {
    "POS Terminal".to_string()
}

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

fn default_cashier_id() -> String {
    "cashier-1".to_string()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            id: Uuid::new_v4().to_string(),
            name: default_terminal_name(),
            tenant_id: default_tenant_id(),
            cashier_id: default_cashier_id(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Where the sync server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL, e.g. `http://localhost:3000`.
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Bound on every HTTP request (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            url: default_server_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Master switch. When off the terminal never talks to the server.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Periodic sync while online (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// How often the connectivity probe hits `/health` (seconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Fire a sync right after each completed sale.
    #[serde(default = "default_true")]
    pub trigger_after_sale: bool,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

fn default_probe_interval() -> u64 {
    15
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            enabled: true,
            interval_secs: default_interval(),
            probe_interval_secs: default_probe_interval(),
            trigger_after_sale: true,
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file. Defaults to `<data dir>/till.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub terminal: TerminalConfig,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated terminal ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let config = match config_path.or_else(Self::default_config_path) {
            Some(path) => Self::read_file(&path)?.unwrap_or_default(),
            None => Self::default(),
        };
        config.with_env()
    }

    /// Like [`SyncConfig::load`], but a missing file is written out from the
    /// defaults first, so the generated terminal id is the same on every run.
    ///
    /// Environment overrides are applied after the write and never saved.
    /// If the file cannot be written the id lasts for this process only.
    pub fn load_or_init(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let Some(path) = config_path.or_else(Self::default_config_path) else {
            return Self::default().with_env();
        };

        let config = match Self::read_file(&path)? {
            Some(config) => config,
            None => {
                let config = Self::default();
                match config.save(Some(path.clone())) {
                    Ok(()) => info!(terminal_id = %config.terminal.id, "Terminal identity created"),
                    Err(e) => warn!(error = %e, ?path, "Could not save generated terminal id"),
                }
                config
            }
        };
        config.with_env()
    }

    fn read_file(path: &Path) -> SyncResult<Option<Self>> {
        if !path.exists() {
            debug!(?path, "Config file not found, using defaults");
            return Ok(None);
        }

        info!(?path, "Loading sync config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&contents)?))
    }

    fn with_env(mut self) -> SyncResult<Self> {
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.terminal.id.trim().is_empty() {
            return Err(SyncError::MissingTerminalId);
        }

        if self.terminal.tenant_id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("tenant_id must not be empty".into()));
        }

        self.server_url()?;

        if self.server.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.interval_secs == 0 || self.sync.probe_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync intervals must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TILL_*` overrides from `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("TILL_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal ID from environment");
            self.terminal.id = id;
        }

        if let Some(name) = lookup("TILL_TERMINAL_NAME") {
            self.terminal.name = name;
        }

        if let Some(tenant) = lookup("TILL_TENANT_ID") {
            self.terminal.tenant_id = tenant;
        }

        if let Some(cashier) = lookup("TILL_CASHIER_ID") {
            self.terminal.cashier_id = cashier;
        }

        if let Some(url) = lookup("TILL_SERVER_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.url = url;
        }

        if let Some(secs) = lookup("TILL_REQUEST_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(s) => self.server.request_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid TILL_REQUEST_TIMEOUT_SECS"),
            }
        }

        if let Some(enabled) = lookup("TILL_SYNC_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sync.enabled = true,
                "0" | "false" | "no" | "off" => self.sync.enabled = false,
                _ => warn!(value = %enabled, "Ignoring invalid TILL_SYNC_ENABLED"),
            }
        }

        if let Some(secs) = lookup("TILL_SYNC_INTERVAL_SECS") {
            match secs.parse() {
                Ok(s) => self.sync.interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid TILL_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(path) = lookup("TILL_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Parsed server URL. Only http and https are accepted.
    pub fn server_url(&self) -> SyncResult<Url> {
        let url = Url::parse(&self.server.url)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SyncError::InvalidUrl(format!(
                "Server URL must be http:// or https://, got {}://",
                other
            ))),
        }
    }

    /// SQLite file to open, falling back to the platform data directory.
    pub fn database_path(&self) -> SyncResult<PathBuf> {
        if let Some(path) = &self.storage.database_path {
            return Ok(path.clone());
        }

        directories::ProjectDirs::from("com", "till", "pos")
            .map(|dirs| dirs.data_dir().join("till.db"))
            .ok_or_else(|| {
                SyncError::InvalidConfig("No home directory; set [storage] database_path".into())
            })
    }

    pub fn tenant_id(&self) -> &str {
        &self.terminal.tenant_id
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.sync.probe_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.terminal.id.is_empty());
        assert_eq!(config.terminal.tenant_id, DEFAULT_TENANT_ID);
        assert_eq!(config.server.request_timeout_secs, 10);
        assert_eq!(config.sync.interval_secs, 300);
        assert!(config.sync.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.terminal.id = String::new();
        assert!(matches!(config.validate(), Err(SyncError::MissingTerminalId)));

        config.terminal.id = "register-1".to_string();
        config.server.url = "ws://localhost:3000".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.server.url = "not a url".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config.server.url = "https://sync.example.com".to_string();
        assert!(config.validate().is_ok());

        config.sync.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [terminal]
            id = "register-7"

            [server]
            url = "http://10.0.0.5:3000"
            "#,
        )
        .unwrap();

        assert_eq!(config.terminal.id, "register-7");
        assert_eq!(config.terminal.tenant_id, DEFAULT_TENANT_ID);
        assert_eq!(config.server.request_timeout_secs, 10);
        assert_eq!(config.sync.probe_interval_secs, 15);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TILL_SERVER_URL", "http://hub:9000"),
            ("TILL_TENANT_ID", "tenant-b"),
            ("TILL_SYNC_ENABLED", "false"),
            ("TILL_SYNC_INTERVAL_SECS", "not-a-number"),
            ("TILL_DATABASE_PATH", "/tmp/till-test.db"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.url, "http://hub:9000");
        assert_eq!(config.tenant_id(), "tenant-b");
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/till-test.db")
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.toml");

        let mut config = SyncConfig::default();
        config.terminal.name = "Front counter".to_string();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[terminal]"));
        assert!(contents.contains("[sync]"));

        let loaded: SyncConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.terminal.id, config.terminal.id);
        assert_eq!(loaded.terminal.name, "Front counter");
    }

    #[test]
    fn test_load_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");

        SyncConfig::load(Some(path.clone())).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_generated_terminal_id_is_kept_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("till").join("sync.toml");

        let first = SyncConfig::load_or_init(Some(path.clone())).unwrap();
        assert!(path.exists());

        let second = SyncConfig::load_or_init(Some(path.clone())).unwrap();
        let third = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(second.terminal.id, first.terminal.id);
        assert_eq!(third.terminal.id, first.terminal.id);
    }

    #[test]
    fn test_unwritable_config_path_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        // parent is a regular file, so the config directory cannot be created
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let config = SyncConfig::load_or_init(Some(blocker.join("sync.toml"))).unwrap();
        assert!(!config.terminal.id.is_empty());
    }
}
