//! Configuration for habdeck.
//!
//! TOML file + `HABDECK_*` environment, API-token resolution (env var,
//! keyring, plaintext), and translation into the runtime types of
//! `habdeck_core`. The CLI layers its flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use habdeck_core::{ConnectionTuning, DialRange, DialTuning, ServerSettings};

/// Keyring service name for the API token.
pub const KEYRING_SERVICE: &str = "habdeck";
/// Keyring user name for the API token.
pub const KEYRING_USER: &str = "api-token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub dial: DialSection,

    #[serde(default)]
    pub connection: ConnectionSection,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub log: LogSection,
}

/// Where the openHAB server lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerSection {
    /// Hostname or IP. Empty means "not configured".
    #[serde(default)]
    pub host: String,

    /// Port as text; empty means the scheme default.
    #[serde(default = "default_port")]
    pub port: String,

    /// API token in plaintext. Prefer the keyring or `api_token_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Environment variable name containing the API token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token_env: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            api_token: None,
            api_token_env: None,
        }
    }
}

fn default_port() -> String {
    "8080".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DialSection {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub min: i64,
    #[serde(default = "default_dial_max")]
    pub max: i64,
}

impl Default for DialSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min: 0,
            max: default_dial_max(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    800
}
fn default_dial_max() -> i64 {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionSection {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_heartbeat_secs() -> u64 {
    5
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSection {
    /// Write logs to daily-rotated files in this directory instead of stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// `EnvFilter` directive used when no `-v` flag or `RUST_LOG` is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "habdeck", "habdeck").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("habdeck");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields defaults.
///
/// Environment overrides use `__` as the section separator, e.g.
/// `HABDECK_SERVER__HOST=openhab.local`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HABDECK_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation & translation ────────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dial.min > self.dial.max {
            return Err(ConfigError::Validation {
                field: "dial.min".into(),
                reason: format!(
                    "must not exceed dial.max ({} > {})",
                    self.dial.min, self.dial.max
                ),
            });
        }
        if self.dial.debounce_ms == 0 {
            return Err(ConfigError::Validation {
                field: "dial.debounce_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.connection.heartbeat_secs == 0 {
            return Err(ConfigError::Validation {
                field: "connection.heartbeat_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if !self.server.port.is_empty() && self.server.port.parse::<u16>().is_err() {
            return Err(ConfigError::Validation {
                field: "server.port".into(),
                reason: format!("expected a port number, got '{}'", self.server.port),
            });
        }
        Ok(())
    }

    pub fn connection_tuning(&self) -> ConnectionTuning {
        ConnectionTuning {
            heartbeat_interval: Duration::from_secs(self.connection.heartbeat_secs),
            request_timeout: Duration::from_secs(self.connection.timeout_secs),
        }
    }

    pub fn dial_tuning(&self) -> DialTuning {
        DialTuning {
            debounce: Duration::from_millis(self.dial.debounce_ms),
            range: DialRange {
                min: self.dial.min,
                max: self.dial.max,
            },
        }
    }

    /// Server settings with the token resolved from the credential chain.
    pub fn server_settings(&self) -> ServerSettings {
        let token = resolve_api_token(&self.server);
        ServerSettings::new(&self.server.host, &self.server.port, token.expose_secret())
    }
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the API token from the credential chain (no CLI flag step).
///
/// openHAB permits anonymous access, so an unresolved token is empty
/// rather than an error.
pub fn resolve_api_token(server: &ServerSection) -> SecretString {
    // 1. api_token_env → env var lookup
    if let Some(ref env_name) = server.api_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return SecretString::from(val);
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        if let Ok(secret) = entry.get_password() {
            return SecretString::from(secret);
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = server.api_token {
        return SecretString::from(token.clone());
    }

    SecretString::from(String::new())
}

/// Store the API token in the system keyring.
pub fn store_api_token(token: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .map_err(|e| ConfigError::Keyring(e.to_string()))?;
    entry
        .set_password(token.expose_secret())
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, "8080");
        assert!(cfg.server.host.is_empty());
        assert_eq!(cfg.dial_tuning(), DialTuning::default());
        assert_eq!(cfg.connection_tuning(), ConnectionTuning::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn inverted_dial_range_is_rejected() {
        let mut cfg = Config::default();
        cfg.dial.min = 50;
        cfg.dial.max = 10;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "dial.min"
        ));
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut cfg = Config::default();
        cfg.server.port = "http".into();
        assert!(cfg.validate().is_err());

        cfg.server.port = String::new();
        assert!(cfg.validate().is_ok());
    }
}
