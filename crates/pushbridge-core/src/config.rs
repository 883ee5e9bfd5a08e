//! Configuration resolution for pushbridge.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/pushbridge/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (`PUSHBRIDGE_*`)
//! 5. CLI arguments (applied by the binary, highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Complete pushbridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay-to-consumer protocol names and host identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the action injected into the consumer runtime.
    pub delivery_action: String,
    /// Name of the local event the consumer re-emits.
    pub event_name: String,
    /// Host application id, substituted for `{app_id}` in settings commands.
    pub app_id: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            delivery_action: "deliverPushNotification".to_string(),
            event_name: "pushNotificationReceived".to_string(),
            app_id: "pushbridge".to_string(),
        }
    }
}

/// Commands used by the settings capability. Each is an argv vector; an
/// empty vector means the surface is unavailable on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SettingsConfig {
    /// Opens the settings page of this application.
    pub app_details_command: Vec<String>,
    /// Opens the general application-management page.
    pub manage_apps_command: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// One config file as written: only the fields the file sets are `Some`, so
/// a later layer can restore a default that an earlier layer changed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigOverlay {
    bridge: BridgeOverlay,
    settings: SettingsOverlay,
    logging: LoggingOverlay,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct BridgeOverlay {
    delivery_action: Option<String>,
    event_name: Option<String>,
    app_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SettingsOverlay {
    app_details_command: Option<Vec<String>>,
    manage_apps_command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LoggingOverlay {
    level: Option<String>,
    json: Option<bool>,
}

impl ConfigOverlay {
    fn apply_to(self, config: &mut Config) {
        let Self {
            bridge,
            settings,
            logging,
        } = self;

        if let Some(v) = bridge.delivery_action {
            config.bridge.delivery_action = v;
        }
        if let Some(v) = bridge.event_name {
            config.bridge.event_name = v;
        }
        if let Some(v) = bridge.app_id {
            config.bridge.app_id = v;
        }
        if let Some(v) = settings.app_details_command {
            config.settings.app_details_command = v;
        }
        if let Some(v) = settings.manage_apps_command {
            config.settings.manage_apps_command = v;
        }
        if let Some(v) = logging.level {
            config.logging.level = v;
        }
        if let Some(v) = logging.json {
            config.logging.json = v;
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        load_config_file(&global_path)?.apply_to(&mut config);
        debug!(path = %global_path.display(), "Loaded global config");
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        load_config_file(path)?.apply_to(&mut config);
        debug!(path = %path.display(), "Merged explicit config");
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pushbridge").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("PUSHBRIDGE_DELIVERY_ACTION") {
        config.bridge.delivery_action = val;
    }
    if let Some(val) = lookup("PUSHBRIDGE_EVENT_NAME") {
        config.bridge.event_name = val;
    }
    if let Some(val) = lookup("PUSHBRIDGE_APP_ID") {
        config.bridge.app_id = val;
    }
    if let Some(val) = lookup("PUSHBRIDGE_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = lookup("PUSHBRIDGE_LOG_JSON")
        && let Ok(b) = val.parse()
    {
        config.logging.json = b;
    }
}
