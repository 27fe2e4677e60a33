//! WebSocket session with subscription filter and heartbeat.
//!
//! One [`SessionHandle`] owns one socket. On open it restricts the server
//! to the configured event types, then pings every `heartbeat_interval`.
//! Inbound frames are classified and state changes are forwarded as
//! [`SessionEvent`]s. There is no reconnect loop here: when the socket
//! closes the task emits [`SessionEvent::Closed`] and exits, and the
//! owner decides what happens next.
//!
//! # Example
//!
//! ```rust,ignore
//! use habdeck_api::websocket::{SessionConfig, SessionEvent, SessionHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = url::Url::parse("ws://openhab.local:8080/ws?accessToken=...")?;
//! let (handle, mut events) = SessionHandle::open(url, SessionConfig::default(), CancellationToken::new());
//!
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::ItemStateChanged(change) = event {
//!         println!("{:?} -> {}", change.item_name(), change.payload);
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::messages::{self, Inbound, ItemStateChangedEvent, WireMessage};

/// Missed acknowledgements tolerated before the liveness warning.
const MISSED_ACKS_BEFORE_WARNING: u32 = 2;

// ── SessionConfig ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between heartbeat pings. Default: 5s.
    pub heartbeat_interval: Duration,

    /// Event types requested via the server-side filter.
    pub event_types: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            event_types: vec![messages::ITEM_STATE_CHANGED_EVENT.to_owned()],
        }
    }
}

// ── SessionEvent ─────────────────────────────────────────────────────

/// Lifecycle and data events emitted by a session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Handshake complete; filter sent, heartbeat running.
    Opened,
    ItemStateChanged(ItemStateChangedEvent),
    /// Socket gone. `reason` is set when the session ended with an error.
    Closed { reason: Option<String> },
}

// ── SessionHandle ────────────────────────────────────────────────────

/// Handle to a running session task.
pub struct SessionHandle {
    outgoing: mpsc::UnboundedSender<WireMessage>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Spawn the session task and return immediately. The handshake
    /// happens asynchronously; watch for [`SessionEvent::Opened`].
    pub fn open(
        url: Url,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            session_task(url, config, outgoing_rx, event_tx, task_cancel).await;
        });

        (
            Self {
                outgoing,
                cancel,
                task,
            },
            event_rx,
        )
    }

    /// Queue a message for the socket. Returns `false` if the session
    /// task is already gone.
    pub fn send(&self, message: WireMessage) -> bool {
        self.outgoing.send(message).is_ok()
    }

    /// `true` once the task has exited (socket closed or never opened).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the socket and stop the heartbeat.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Session task ─────────────────────────────────────────────────────

async fn session_task(
    url: Url,
    config: SessionConfig,
    mut outgoing: mpsc::UnboundedReceiver<WireMessage>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let reason = match run_session(&url, &config, &mut outgoing, &events, &cancel).await {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(error = %e, url = %redacted(&url), "WebSocket session failed");
            Some(e.to_string())
        }
    };

    tracing::debug!("WebSocket session task exiting");
    let _ = events.send(SessionEvent::Closed { reason });
}

/// Connect, subscribe, then pump frames until the socket drops or the
/// session is cancelled.
async fn run_session(
    url: &Url,
    config: &SessionConfig,
    outgoing: &mut mpsc::UnboundedReceiver<WireMessage>,
    events: &mpsc::UnboundedSender<SessionEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %redacted(url), "Connecting to WebSocket");

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = tokio_tungstenite::connect_async(url.as_str()) => {
            result.map_err(|e| Error::WebSocketConnect(e.to_string()))?
        }
    };

    tracing::info!("WebSocket connected");
    let (mut write, mut read) = ws_stream.split();
    let _ = events.send(SessionEvent::Opened);

    let event_types: Vec<&str> = config.event_types.iter().map(String::as_str).collect();
    send_message(&mut write, &WireMessage::type_filter(&event_types)).await?;

    let period = config.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut liveness = Liveness::new(Instant::now());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                if liveness.check(Instant::now(), period) {
                    tracing::warn!(
                        interval_secs = period.as_secs(),
                        "No heartbeat acknowledgement from server"
                    );
                }
                tracing::trace!("Sending heartbeat");
                send_message(&mut write, &WireMessage::heartbeat()).await?;
            }
            Some(message) = outgoing.recv() => {
                send_message(&mut write, &message).await?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(&text, events, &mut liveness);
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(cf) if u16::from(cf.code) != 1000 => Err(Error::WebSocketClosed {
                                code: cf.code.into(),
                                reason: cf.reason.as_str().to_owned(),
                            }),
                            _ => {
                                tracing::info!("WebSocket close frame received");
                                Ok(())
                            }
                        };
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

async fn send_message<S>(write: &mut S, message: &WireMessage) -> Result<(), Error>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message).map_err(|e| Error::Deserialization {
        message: format!("failed to encode message: {e}"),
        body: String::new(),
    })?;
    write
        .send(Message::text(text))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

/// Classify one text frame and forward what the owner cares about.
/// Malformed frames are dropped; they never end the session.
fn dispatch_frame(
    text: &str,
    events: &mpsc::UnboundedSender<SessionEvent>,
    liveness: &mut Liveness,
) {
    match messages::classify(text) {
        Ok(Inbound::ItemStateChanged(change)) => {
            let _ = events.send(SessionEvent::ItemStateChanged(change));
        }
        Ok(Inbound::HeartbeatAck) => {
            tracing::trace!("Heartbeat acknowledged");
            liveness.record_ack(Instant::now());
        }
        Ok(Inbound::WebSocketEvent(message)) => {
            tracing::debug!(topic = ?message.topic, payload = %message.payload, "WebSocket event");
        }
        Ok(Inbound::Other(message)) => {
            tracing::debug!(kind = %message.kind, topic = ?message.topic, "Ignoring event");
        }
        Err(e) => {
            tracing::debug!(error = %e, "Dropping malformed frame");
        }
    }
}

/// The access token travels in the query string; never log it.
fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

// ── Liveness ─────────────────────────────────────────────────────────

/// Tracks heartbeat acknowledgements. Observational only: a stale
/// session is reported once, never torn down.
#[derive(Debug)]
struct Liveness {
    last_ack: Instant,
    warned: bool,
}

impl Liveness {
    fn new(now: Instant) -> Self {
        Self {
            last_ack: now,
            warned: false,
        }
    }

    fn record_ack(&mut self, now: Instant) {
        self.last_ack = now;
        self.warned = false;
    }

    /// `true` exactly once per stale stretch.
    fn check(&mut self, now: Instant, interval: Duration) -> bool {
        let silent_for = now.saturating_duration_since(self.last_ack);
        if silent_for > interval * MISSED_ACKS_BEFORE_WARNING && !self.warned {
            self.warned = true;
            return true;
        }
        false
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_session_config() {
        let config = SessionConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.event_types, vec!["ItemStateChangedEvent".to_string()]);
    }

    #[test]
    fn redacted_url_drops_token() {
        let url = Url::parse("ws://openhab.local:8080/ws?accessToken=secret").unwrap();
        assert_eq!(redacted(&url), "ws://openhab.local:8080/ws");
    }

    #[test]
    fn liveness_warns_once_per_stale_stretch() {
        let start = Instant::now();
        let interval = Duration::from_secs(5);
        let mut liveness = Liveness::new(start);

        assert!(!liveness.check(start + Duration::from_secs(5), interval));
        assert!(liveness.check(start + Duration::from_secs(11), interval));
        assert!(!liveness.check(start + Duration::from_secs(16), interval));

        liveness.record_ack(start + Duration::from_secs(17));
        assert!(!liveness.check(start + Duration::from_secs(20), interval));
        assert!(liveness.check(start + Duration::from_secs(28), interval));
    }

    #[test]
    fn dispatch_forwards_state_changes_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut liveness = Liveness::new(Instant::now());

        let change = serde_json::json!({
            "type": "ItemStateChangedEvent",
            "topic": "openhab/items/Lamp/statechanged",
            "payload": "{\"value\":\"ON\"}"
        })
        .to_string();
        let pong = serde_json::json!({
            "type": "WebSocketEvent",
            "topic": "openhab/websocket/heartbeat",
            "payload": "PONG"
        })
        .to_string();

        dispatch_frame(&pong, &tx, &mut liveness);
        dispatch_frame("{broken", &tx, &mut liveness);
        dispatch_frame(&change, &tx, &mut liveness);

        let Some(SessionEvent::ItemStateChanged(event)) = rx.try_recv().ok() else {
            panic!("expected the state change to be forwarded");
        };
        assert_eq!(event.item_name(), Some("Lamp"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connect_failure_reports_closed_with_reason() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws")).unwrap();
        let (handle, mut events) =
            SessionHandle::open(url, SessionConfig::default(), CancellationToken::new());

        match events.recv().await {
            Some(SessionEvent::Closed { reason }) => assert!(reason.is_some()),
            other => panic!("expected Closed, got {other:?}"),
        }
        drop(handle);
    }
}
