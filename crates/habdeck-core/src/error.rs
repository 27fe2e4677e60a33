// ── Core error types ──
//
// Errors surfaced by habdeck-core to its callers (the CLI, mostly).
// The bridge path never sees these: fire-and-forget gateway calls log
// and swallow. The `From<habdeck_api::Error>` impl translates
// transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Server not configured: {reason}")]
    NotConfigured { reason: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to openHAB: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request to openHAB timed out")]
    Timeout,

    #[error("openHAB rejected the API token (HTTP {status})")]
    Unauthorized { status: u16 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Item not found: {name}")]
    ItemNotFound { name: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("openHAB API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<habdeck_api::Error> for CoreError {
    fn from(err: habdeck_api::Error) -> Self {
        match err {
            habdeck_api::Error::Transport(ref e) if e.is_timeout() => CoreError::Timeout,
            habdeck_api::Error::Transport(ref e) if e.is_connect() => {
                CoreError::ConnectionFailed {
                    reason: e.to_string(),
                }
            }
            habdeck_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed { reason },
            habdeck_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("socket closed with code {code}: {reason}"),
            },
            habdeck_api::Error::Http { status, .. } if status == 401 || status == 403 => {
                CoreError::Unauthorized { status }
            }
            habdeck_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            habdeck_api::Error::InvalidUrl(e) => CoreError::NotConfigured {
                reason: format!("invalid server address: {e}"),
            },
            habdeck_api::Error::ClientSetup(message) => CoreError::Internal(message),
            other => CoreError::Api {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl CoreError {
    /// Map an API error for a request about one item, turning 404 into
    /// [`CoreError::ItemNotFound`].
    pub fn for_item(err: habdeck_api::Error, item_name: &str) -> Self {
        if err.is_not_found() {
            CoreError::ItemNotFound {
                name: item_name.to_owned(),
            }
        } else {
            err.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_auth_failures_map_to_unauthorized() {
        let err: CoreError = habdeck_api::Error::Http {
            status: 401,
            message: "Unauthorized".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Unauthorized { status: 401 }));
    }

    #[test]
    fn not_found_for_item_carries_name() {
        let err = CoreError::for_item(
            habdeck_api::Error::Http {
                status: 404,
                message: "Item Lamp does not exist!".into(),
            },
            "Lamp",
        );
        assert!(matches!(err, CoreError::ItemNotFound { ref name } if name == "Lamp"));
    }

    #[test]
    fn other_http_errors_keep_status() {
        let err: CoreError = habdeck_api::Error::Http {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    }
}
