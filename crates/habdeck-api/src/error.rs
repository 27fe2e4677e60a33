use thiserror::Error;

/// Top-level error type for the `habdeck-api` crate.
///
/// Covers every failure mode across both API surfaces: REST transport,
/// WebSocket session, and wire decoding. `habdeck-core` maps these into
/// domain errors and decides which ones are only worth a log line.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success HTTP status from the REST API.
    #[error("openHAB REST error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    /// HTTP client could not be built (bad header value, TLS backend, etc.)
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A WebSocket frame that is valid JSON but not a known envelope shape.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

impl Error {
    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying by hand.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Characters of a body or frame kept in error messages.
const PREVIEW_CHARS: usize = 200;

/// Leading slice of `text` for error messages, cut on a char boundary.
pub(crate) fn preview(text: &str) -> &str {
    text.char_indices()
        .nth(PREVIEW_CHARS)
        .map_or(text, |(end, _)| &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_404_is_not_found() {
        let err = Error::Http {
            status: 404,
            message: "Item Kitchen_Light does not exist".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Http {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn malformed_message_is_neither() {
        let err = Error::MalformedMessage("missing type".into());
        assert!(!err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn preview_cuts_on_char_boundary() {
        let text = format!("{}é tail", "x".repeat(199));
        let cut = preview(&text);
        assert_eq!(cut.chars().count(), 200);
        assert!(cut.ends_with('é'));

        assert_eq!(preview("short"), "short");
    }
}
