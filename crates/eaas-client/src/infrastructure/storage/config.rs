//! TOML-based configuration persistence for the `eaas` client.
//!
//! Reads and writes [`ClientConfig`] at the platform-appropriate location:
//! - Windows:  `%APPDATA%\EaasClient\config.toml`
//! - Linux:    `~/.config/eaas-client/config.toml`
//! - macOS:    `~/Library/Application Support/EaasClient/config.toml`
//!
//! # Example file (for beginners)
//!
//! ```toml
//! [api]
//! url = "https://eaas.example.org/emil"
//! issuer = "https://eaas.example.org/auth/realms/master"
//! client_id = "eaas"
//!
//! [polling]
//! state_interval_ms = 5000
//! keepalive_interval_ms = 14000
//!
//! [viewer]
//! width = 1024
//! height = 768
//! ```
//!
//! Every field carries a `#[serde(default = "...")]`, so a file only needs to
//! list the values that differ from the defaults, and a missing file is the
//! same as an empty one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eaas_core::{KeyboardPrefs, ViewerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::client::ClientSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub keyboard: KeyboardPrefs,
    #[serde(default)]
    pub viewer: ViewerSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the backend and its identity provider live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the backend REST API.
    #[serde(default = "default_api_url")]
    pub url: String,
    /// OpenID issuer; `None` means requests go out without a token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

/// Poll cadences, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    #[serde(default = "default_state_interval_ms")]
    pub state_interval_ms: u64,
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    #[serde(default = "default_task_poll_interval_ms")]
    pub task_poll_interval_ms: u64,
    #[serde(default = "default_task_max_attempts")]
    pub task_max_attempts: u32,
}

/// Initial xpra viewer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewerSection {
    #[serde(default = "default_viewer_width")]
    pub width: u32,
    #[serde(default = "default_viewer_height")]
    pub height: u32,
    #[serde(default = "default_viewer_dpi")]
    pub dpi: u32,
    #[serde(default = "default_viewer_encoding")]
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_api_url() -> String {
    "http://localhost:8080/emil".to_string()
}
fn default_client_id() -> String {
    "eaas".to_string()
}
fn default_state_interval_ms() -> u64 {
    5_000
}
fn default_keepalive_interval_ms() -> u64 {
    14_000
}
fn default_task_poll_interval_ms() -> u64 {
    1_000
}
fn default_task_max_attempts() -> u32 {
    600
}
fn default_viewer_width() -> u32 {
    640
}
fn default_viewer_height() -> u32 {
    480
}
fn default_viewer_dpi() -> u32 {
    96
}
fn default_viewer_encoding() -> String {
    "jpeg".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            issuer: None,
            client_id: default_client_id(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            state_interval_ms: default_state_interval_ms(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            task_poll_interval_ms: default_task_poll_interval_ms(),
            task_max_attempts: default_task_max_attempts(),
        }
    }
}

impl Default for ViewerSection {
    fn default() -> Self {
        Self {
            width: default_viewer_width(),
            height: default_viewer_height(),
            dpi: default_viewer_dpi(),
            encoding: default_viewer_encoding(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl ClientConfig {
    /// Settings for [`crate::application::client::Client::new`].
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            keyboard: self.keyboard.clone(),
            viewer: ViewerConfig {
                xpra_width: self.viewer.width,
                xpra_height: self.viewer.height,
                xpra_dpi: self.viewer.dpi,
                xpra_encoding: self.viewer.encoding.clone(),
                ghost_cursor: None,
            },
            state_poll_interval: Duration::from_millis(self.polling.state_interval_ms),
            keepalive_interval: Duration::from_millis(self.polling.keepalive_interval_ms),
        }
    }

    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.task_poll_interval_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory cannot
/// be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform location, or the defaults if the file
/// does not exist yet.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config at `path`, or the defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to the platform config file.
pub fn save_config(config: &ClientConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Writes `config` to `path`, creating the parent directory if needed.
pub fn save_config_to(config: &ClientConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("EaasClient"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("eaas-client"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("EaasClient")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("eaas_test_{}", Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_default_config_matches_client_defaults() {
        // Arrange / Act
        let settings = ClientConfig::default().client_settings();

        // Assert
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: ClientConfig = toml::from_str("").expect("deserialize empty");

        assert_eq!(cfg, ClientConfig::default());
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.api.issuer, None);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
[polling]
state_interval_ms = 1000

[keyboard]
language = "de"
"#;

        // Act
        let cfg: ClientConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.polling.state_interval_ms, 1000);
        assert_eq!(cfg.polling.keepalive_interval_ms, 14_000);
        assert_eq!(cfg.keyboard.language, "de");
        assert_eq!(cfg.keyboard.layout, "pc105");
    }

    #[test]
    fn test_client_settings_converts_units() {
        let mut cfg = ClientConfig::default();
        cfg.polling.state_interval_ms = 250;
        cfg.viewer.width = 1024;
        cfg.viewer.encoding = "png".to_string();

        let settings = cfg.client_settings();

        assert_eq!(settings.state_poll_interval, Duration::from_millis(250));
        assert_eq!(settings.viewer.xpra_width, 1024);
        assert_eq!(settings.viewer.xpra_encoding, "png");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let cfg = load_config_from(Path::new("/nonexistent/eaas/config.toml")).unwrap();

        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trips_via_temp_dir() {
        // Arrange
        let path = temp_path();
        let mut cfg = ClientConfig::default();
        cfg.api.url = "https://eaas.example.org/emil".to_string();
        cfg.api.issuer = Some("https://eaas.example.org/auth/realms/master".to_string());
        cfg.logging.level = "debug".to_string();

        // Act
        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
    }
}
