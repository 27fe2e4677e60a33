//! WebSocket wire envelope and inbound classification.
//!
//! openHAB uses one symmetrical JSON envelope in both directions:
//! `{ "type": ..., "topic": ..., "payload": ..., "source": ... }`.
//! `payload` is always a string; for state-change events it holds a
//! second, JSON-encoded document (`{ "type", "value", "oldValue" }`).

use serde::{Deserialize, Serialize};

use crate::error::{Error, preview};

// ── Constants ────────────────────────────────────────────────────────

/// Value of `source` on every message we send.
pub const SOURCE: &str = "ElgatoStreamDeck";

pub const WEBSOCKET_EVENT: &str = "WebSocketEvent";
pub const ITEM_STATE_CHANGED_EVENT: &str = "ItemStateChangedEvent";
pub const ITEM_COMMAND_EVENT: &str = "ItemCommandEvent";

pub const HEARTBEAT_TOPIC: &str = "openhab/websocket/heartbeat";
pub const FILTER_TYPE_TOPIC: &str = "openhab/websocket/filter/type";

pub const PING: &str = "PING";
pub const PONG: &str = "PONG";

const ITEMS_TOPIC_PREFIX: &str = "openhab/items/";

// ── Envelope ─────────────────────────────────────────────────────────

/// The raw envelope, used for outgoing messages and for inbound frames
/// that are not state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default)]
    pub payload: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl WireMessage {
    /// Liveness ping; the server answers with a `PONG` payload.
    pub fn heartbeat() -> Self {
        Self {
            kind: WEBSOCKET_EVENT.into(),
            topic: Some(HEARTBEAT_TOPIC.into()),
            payload: PING.into(),
            source: Some(SOURCE.into()),
        }
    }

    /// Server-side event-type filter. Only the listed event types are
    /// delivered on this session afterwards.
    pub fn type_filter(event_types: &[&str]) -> Self {
        let payload = serde_json::Value::from(event_types.to_vec()).to_string();
        Self {
            kind: WEBSOCKET_EVENT.into(),
            topic: Some(FILTER_TYPE_TOPIC.into()),
            payload,
            source: Some(SOURCE.into()),
        }
    }

    /// Item command over the socket. Commands are normally sent via REST;
    /// this shape is kept for servers where the REST path is unavailable.
    pub fn item_command(item_name: &str, value: &str) -> Self {
        Self {
            kind: ITEM_COMMAND_EVENT.into(),
            topic: Some(format!("{ITEMS_TOPIC_PREFIX}{item_name}/command")),
            payload: serde_json::json!({ "value": value }).to_string(),
            source: Some(SOURCE.into()),
        }
    }

    pub fn is_heartbeat_ack(&self) -> bool {
        self.payload == PONG
    }
}

// ── State change events ──────────────────────────────────────────────

/// `ItemStateChangedEvent` as delivered by the server (or synthesized
/// from a REST snapshot read).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStateChangedEvent {
    pub topic: String,
    pub payload: String,
}

/// Decoded `payload` of an [`ItemStateChangedEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    /// openHAB state type, e.g. `"Percent"`, `"OnOff"`, `"Decimal"`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    pub value: String,

    #[serde(rename = "oldValue", default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
}

impl ItemStateChangedEvent {
    /// Build the event the server would have pushed for `item_name`, so
    /// REST snapshot reads and pushed changes share one code path.
    pub fn synthesize(item_name: &str, state: &str) -> Self {
        Self {
            topic: format!("{ITEMS_TOPIC_PREFIX}{item_name}/statechanged"),
            payload: serde_json::json!({ "value": state }).to_string(),
        }
    }

    /// Item name from the topic, e.g. `openhab/items/Kitchen/statechanged`
    /// → `Kitchen`. `None` for topics that are not item-state topics.
    pub fn item_name(&self) -> Option<&str> {
        extract_item_name(&self.topic)
    }

    /// Decode the nested JSON payload.
    pub fn state(&self) -> Result<StatePayload, Error> {
        serde_json::from_str(&self.payload).map_err(|e| Error::Deserialization {
            message: format!("invalid state payload: {e}"),
            body: self.payload.clone(),
        })
    }
}

/// Parse `openhab/items/{name}/state…` topics.
pub fn extract_item_name(topic: &str) -> Option<&str> {
    let rest = topic.strip_prefix(ITEMS_TOPIC_PREFIX)?;
    let (name, tail) = rest.split_once('/')?;
    if name.is_empty() || !tail.starts_with("state") {
        return None;
    }
    Some(name)
}

// ── Inbound classification ───────────────────────────────────────────

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    ItemStateChanged(ItemStateChangedEvent),
    /// `PONG` answer to our heartbeat.
    HeartbeatAck,
    /// Any other `WebSocketEvent` (filter acknowledgements, etc.)
    WebSocketEvent(WireMessage),
    /// Valid envelope of a type we never subscribed to.
    Other(WireMessage),
}

/// Classify a text frame. Errors mean the frame should be dropped.
pub fn classify(text: &str) -> Result<Inbound, Error> {
    let message: WireMessage = serde_json::from_str(text).map_err(|e| {
        let preview = preview(text);
        Error::Deserialization {
            message: format!("{e} (frame preview: {preview:?})"),
            body: text.to_owned(),
        }
    })?;

    if message.kind == ITEM_STATE_CHANGED_EVENT {
        let topic = message
            .topic
            .ok_or_else(|| Error::MalformedMessage("state change without topic".into()))?;
        return Ok(Inbound::ItemStateChanged(ItemStateChangedEvent {
            topic,
            payload: message.payload,
        }));
    }

    if message.is_heartbeat_ack() {
        return Ok(Inbound::HeartbeatAck);
    }

    if message.kind == WEBSOCKET_EVENT {
        return Ok(Inbound::WebSocketEvent(message));
    }

    Ok(Inbound::Other(message))
}

// ── Tests ────────────────────────────────────────────────────────────
