// openHAB REST client
//
// Thin wrapper around `reqwest::Client` for the three item endpoints the
// bridge needs: the item directory, single-item snapshot reads, and
// plain-text command writes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{Error, preview};
use crate::transport::TransportConfig;

// ── Response shapes ──────────────────────────────────────────────────

/// Entry of `GET /items?fields=name`.
#[derive(Debug, Clone, Deserialize)]
struct ItemName {
    name: String,
}

/// Single item snapshot from `GET /items/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub state: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// openHAB wraps failures as `{"error":{"message":"...","http-code":404}}`.
#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorInner>,
}

#[derive(Deserialize)]
struct ErrorInner {
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the openHAB REST API.
///
/// `base_url` is the REST root, e.g. `http://openhab.local:8080/rest`.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Build from a REST root URL and a transport config.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/items` plus optional escaped item name segment.
    fn items_url(&self, item_name: Option<&str>) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::ClientSetup(format!("not a base URL: {}", self.base_url)))?;
            segments.pop_if_empty().push("items");
            if let Some(name) = item_name {
                segments.push(name);
            }
        }
        Ok(url)
    }

    // ── Public API ───────────────────────────────────────────────────

    /// Names of every item the server knows about.
    pub async fn list_item_names(&self) -> Result<Vec<String>, Error> {
        let url = self.items_url(None)?;
        debug!("GET {url}?fields=name");

        let resp = self
            .http
            .get(url)
            .query(&[("fields", "name")])
            .send()
            .await?;
        let items: Vec<ItemName> = self.handle_response(resp).await?;
        Ok(items.into_iter().map(|i| i.name).collect())
    }

    /// Current snapshot of one item.
    pub async fn get_item(&self, item_name: &str) -> Result<Item, Error> {
        let url = self.items_url(Some(item_name))?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    /// Send a command; the body is the literal command as plain text.
    pub async fn send_command(&self, item_name: &str, command: &str) -> Result<(), Error> {
        let url = self.items_url(Some(item_name))?;
        debug!("POST {url} body={command:?}");

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(command.to_owned())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(parse_error(status, resp).await)
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(parse_error(status, resp).await);
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview = preview(&body);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}

async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    let raw = resp.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorResponse>(&raw)
        .ok()
        .and_then(|r| r.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| {
            if raw.is_empty() {
                status.to_string()
            } else {
                preview(&raw).to_owned()
            }
        });

    Error::Http {
        status: status.as_u16(),
        message,
    }
}
