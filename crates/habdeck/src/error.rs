//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use habdeck_config::ConfigError;
use habdeck_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("No openHAB server configured")]
    #[diagnostic(
        code(habdeck::no_server),
        help(
            "Pass --host (or set HABDECK_HOST), or run: habdeck config init\n\
             Config file: {path}"
        )
    )]
    NoServer { path: String },

    #[error("Could not reach openHAB: {reason}")]
    #[diagnostic(
        code(habdeck::connection_failed),
        help("Check that openHAB is running and that --host/--port are correct.")
    )]
    ConnectionFailed { reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(habdeck::timeout),
        help("Raise connection.timeout_secs in the config file or check server load.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("openHAB rejected the request (HTTP {status})")]
    #[diagnostic(
        code(habdeck::auth_failed),
        help(
            "Create an API token in the openHAB UI (Profile > API Tokens), then run:\n\
             habdeck config set-token"
        )
    )]
    AuthFailed { status: u16 },

    // ── Items ────────────────────────────────────────────────────────
    #[error("Item '{name}' not found")]
    #[diagnostic(
        code(habdeck::item_not_found),
        help("Run: habdeck items to see available items")
    )]
    ItemNotFound { name: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("openHAB API error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(code(habdeck::api_error))]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(habdeck::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(habdeck::config),
        help("Inspect the file with: habdeck config show")
    )]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(habdeck::io))]
    Io(#[from] std::io::Error),

    #[error("Could not encode output: {0}")]
    #[diagnostic(code(habdeck::encode))]
    Encode(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ItemNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Config(ConfigError::Validation { .. }) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotConfigured { .. } => CliError::NoServer {
                path: habdeck_config::config_path().display().to_string(),
            },
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::Timeout => CliError::Timeout,
            CoreError::Unauthorized { status } => CliError::AuthFailed { status },
            CoreError::ItemNotFound { name } => CliError::ItemNotFound { name },
            CoreError::Api { message, status } => CliError::Api { message, status },
            CoreError::Internal(message) => CliError::Api {
                message,
                status: None,
            },
        }
    }
}
