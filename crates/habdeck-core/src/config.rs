// ── Runtime configuration ──
//
// Plain data passed in by the caller. habdeck-core never reads files or
// the environment; habdeck-config (or a test) builds these values.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::CoreError;

// ── ServerSettings ───────────────────────────────────────────────────

/// Address and credentials of the openHAB server.
///
/// Host and port are kept as the strings the user supplied; an empty port
/// means "scheme default" and an empty token means anonymous access.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: String,
    pub api_token: SecretString,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: String::new(),
            api_token: SecretString::from(String::new()),
        }
    }
}

/// Derived endpoint URLs. Only exist once a host is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub websocket: Url,
    pub rest: Url,
}

impl ServerSettings {
    pub fn new(host: &str, port: &str, api_token: &str) -> Self {
        Self {
            host: host.trim().to_owned(),
            port: port.trim().to_owned(),
            api_token: SecretString::from(api_token.trim().to_owned()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }

    pub fn has_token(&self) -> bool {
        !self.api_token.expose_secret().is_empty()
    }

    /// Compute the WebSocket and REST endpoints.
    ///
    /// `ws://{host}[:{port}]/ws[?accessToken={token}]` and
    /// `http://{host}[:{port}]/rest`.
    pub fn endpoints(&self) -> Result<Endpoints, CoreError> {
        if !self.is_configured() {
            return Err(CoreError::NotConfigured {
                reason: "no server host set".into(),
            });
        }

        let authority = if self.port.is_empty() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        };

        let invalid = |e: url::ParseError| CoreError::NotConfigured {
            reason: format!("invalid server address {authority:?}: {e}"),
        };

        let mut websocket = Url::parse(&format!("ws://{authority}/ws")).map_err(invalid)?;
        if self.has_token() {
            websocket
                .query_pairs_mut()
                .append_pair("accessToken", self.api_token.expose_secret());
        }
        let rest = Url::parse(&format!("http://{authority}/rest")).map_err(invalid)?;

        Ok(Endpoints { websocket, rest })
    }
}

// ── Tuning ───────────────────────────────────────────────────────────

/// Connection timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTuning {
    pub heartbeat_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ConnectionTuning {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Inclusive numeric range a dial value is clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialRange {
    pub min: i64,
    pub max: i64,
}

impl Default for DialRange {
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

impl DialRange {
    pub fn clamp(self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }
}

/// Dial debounce timing and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialTuning {
    pub debounce: Duration,
    pub range: DialRange,
}

impl Default for DialTuning {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(800),
            range: DialRange::default(),
        }
    }
}
