// ── Connection manager ──
//
// Owns the single openHAB session: the WebSocket event stream (with its
// heartbeat) and the REST client used for snapshot reads and commands.
// Connectivity changes and item state changes are published on one
// broadcast channel; the current state is also observable via `watch`.
//
// Recovery is reactive only. A closed socket stays closed until the
// settings are updated or `connect()` is called again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt as _};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use habdeck_api::{
    Item, ItemStateChangedEvent, RestClient, SessionConfig, SessionEvent, SessionHandle,
    TransportConfig, WireMessage,
};

use crate::config::{ConnectionTuning, Endpoints, ServerSettings};
use crate::controller::CommandValue;
use crate::directory::ItemDirectory;
use crate::error::CoreError;
use crate::registry::ItemGateway;

const EVENT_CHANNEL_SIZE: usize = 256;

// ── ConnectionState / ConnectionEvent ────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events published by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    /// Pushed by the server or synthesized from a REST snapshot read.
    ItemState(ItemStateChangedEvent),
}

// ── ConnectionManager ────────────────────────────────────────────────

/// Cheaply cloneable handle to the connection state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    tuning: ConnectionTuning,
    settings: Mutex<ServerSettings>,
    endpoints: Mutex<Option<Endpoints>>,
    rest: Mutex<Option<Arc<RestClient>>>,
    session: Mutex<Option<ActiveSession>>,
    directory: ItemDirectory,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    /// Bumped for every session; events from older sessions are ignored.
    generation: AtomicU64,
}

struct ActiveSession {
    handle: SessionHandle,
    pump: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create an unconfigured manager. Nothing connects until
    /// [`update_settings`](Self::update_settings) supplies a host.
    pub fn new(tuning: ConnectionTuning) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Self {
            inner: Arc::new(Inner {
                tuning,
                settings: Mutex::new(ServerSettings::default()),
                endpoints: Mutex::new(None),
                rest: Mutex::new(None),
                session: Mutex::new(None),
                directory: ItemDirectory::new(),
                state,
                events,
                generation: AtomicU64::new(0),
            }),
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Item state changes only, as a stream. Lagged receivers skip ahead.
    pub fn item_states(&self) -> impl Stream<Item = ItemStateChangedEvent> + use<> {
        BroadcastStream::new(self.subscribe()).filter_map(|event| match event {
            Ok(ConnectionEvent::ItemState(change)) => Some(change),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "item state stream lagged");
                None
            }
        })
    }

    pub async fn settings(&self) -> ServerSettings {
        self.inner.settings.lock().await.clone()
    }

    pub async fn endpoints(&self) -> Option<Endpoints> {
        self.inner.endpoints.lock().await.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Apply new server settings: tear down the current session,
    /// recompute endpoints and reconnect.
    ///
    /// An empty host leaves the manager disconnected and unconfigured;
    /// that is logged as a warning, not an error.
    pub async fn update_settings(&self, host: &str, port: &str, api_token: &str) {
        if self.configure(host, port, api_token).await {
            self.connect().await;
        }
    }

    /// Like [`update_settings`](Self::update_settings) without opening the
    /// event stream. Enough for REST reads and commands.
    ///
    /// Returns `false` when the settings yield no endpoints.
    pub async fn configure(&self, host: &str, port: &str, api_token: &str) -> bool {
        let settings = ServerSettings::new(host, port, api_token);
        self.disconnect().await;

        let endpoints = match settings.endpoints() {
            Ok(endpoints) => endpoints,
            Err(e) => {
                warn!(error = %e, "connection skipped");
                *self.inner.settings.lock().await = settings;
                *self.inner.endpoints.lock().await = None;
                *self.inner.rest.lock().await = None;
                return false;
            }
        };

        let transport = TransportConfig {
            timeout: self.inner.tuning.request_timeout,
            ..TransportConfig::default()
        }
        .with_api_token(settings.api_token.clone());

        let rest = match RestClient::new(endpoints.rest.clone(), &transport) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                error!(error = %e, "cannot build REST client");
                None
            }
        };

        info!(host = %settings.host, port = %settings.port, "server settings updated");
        *self.inner.settings.lock().await = settings;
        *self.inner.endpoints.lock().await = Some(endpoints);
        *self.inner.rest.lock().await = rest;
        true
    }

    /// Open a session if configured and none is open or opening.
    pub async fn connect(&self) {
        let Some(endpoints) = self.inner.endpoints.lock().await.clone() else {
            warn!("no server configured; connection skipped");
            return;
        };

        let mut session = self.inner.session.lock().await;
        if session.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            debug!("session already open");
            return;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(ConnectionState::Connecting);

        let config = SessionConfig {
            heartbeat_interval: self.inner.tuning.heartbeat_interval,
            ..SessionConfig::default()
        };
        let (handle, session_events) =
            SessionHandle::open(endpoints.websocket, config, CancellationToken::new());
        let pump = tokio::spawn(pump_session_events(
            Arc::downgrade(&self.inner),
            generation,
            session_events,
        ));

        *session = Some(ActiveSession { handle, pump });
    }

    /// Close the session, if any. Idempotent.
    pub async fn disconnect(&self) {
        let Some(active) = self.inner.session.lock().await.take() else {
            return;
        };

        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        active.handle.shutdown();
        active.pump.abort();
        info!("disconnected");

        let previous = self.inner.state.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            let _ = self.inner.events.send(ConnectionEvent::Disconnected);
        }
    }

    /// Push a raw message onto the open socket. `false` if none is open.
    pub async fn send_message(&self, message: WireMessage) -> bool {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.handle.send(message))
    }

    // ── REST ─────────────────────────────────────────────────────────

    async fn rest(&self) -> Result<Arc<RestClient>, CoreError> {
        self.inner
            .rest
            .lock()
            .await
            .clone()
            .ok_or_else(|| CoreError::NotConfigured {
                reason: "no server host set".into(),
            })
    }

    /// Item names, from cache after the first successful fetch.
    pub async fn fetch_items(&self) -> Result<Arc<Vec<String>>, CoreError> {
        let rest = self.rest().await?;
        Ok(self.inner.directory.items(&rest).await?)
    }

    pub async fn clear_item_cache(&self) {
        self.inner.directory.clear().await;
    }

    /// Read one item and publish its state as if the server had pushed it.
    pub async fn fetch_item_state(&self, item_name: &str) -> Result<Item, CoreError> {
        let rest = self.rest().await?;
        let item = rest
            .get_item(item_name)
            .await
            .map_err(|e| CoreError::for_item(e, item_name))?;

        debug!(item = item_name, state = %item.state, "item state fetched");
        let _ = self.inner.events.send(ConnectionEvent::ItemState(
            ItemStateChangedEvent::synthesize(item_name, &item.state),
        ));
        Ok(item)
    }

    /// Send a command over REST. Not retried.
    pub async fn post_command(&self, item_name: &str, value: &CommandValue) -> Result<(), CoreError> {
        let rest = self.rest().await?;
        rest.send_command(item_name, &value.to_string())
            .await
            .map_err(|e| CoreError::for_item(e, item_name))
    }
}

// ── Gateway (fire-and-forget) ────────────────────────────────────────

impl ItemGateway for ConnectionManager {
    fn request_state(&self, item_name: &str) {
        let manager = self.clone();
        let item_name = item_name.to_owned();
        tokio::spawn(async move {
            if let Err(e) = manager.fetch_item_state(&item_name).await {
                error!(item = %item_name, error = %e, "state refresh failed");
            }
        });
    }

    fn send_command(&self, item_name: &str, value: &CommandValue) {
        let manager = self.clone();
        let item_name = item_name.to_owned();
        let value = value.clone();
        tokio::spawn(async move {
            match manager.post_command(&item_name, &value).await {
                Ok(()) => debug!(item = %item_name, %value, "command sent"),
                Err(e) => error!(item = %item_name, %value, error = %e, "command failed"),
            }
        });
    }
}

// ── Session pump ─────────────────────────────────────────────────────

async fn pump_session_events(
    inner: Weak<Inner>,
    generation: u64,
    mut session_events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = session_events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if inner.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "ignoring event from stale session");
            return;
        }

        match event {
            SessionEvent::Opened => {
                inner.state.send_replace(ConnectionState::Connected);
                let _ = inner.events.send(ConnectionEvent::Connected);
            }
            SessionEvent::ItemStateChanged(change) => {
                let _ = inner.events.send(ConnectionEvent::ItemState(change));
            }
            SessionEvent::Closed { reason } => {
                match reason {
                    Some(reason) => warn!(%reason, "session closed"),
                    None => info!("session closed"),
                }
                inner.state.send_replace(ConnectionState::Disconnected);
                let _ = inner.events.send(ConnectionEvent::Disconnected);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_settings_stay_disconnected() {
        let manager = ConnectionManager::new(ConnectionTuning::default());
        let mut events = manager.subscribe();

        manager.update_settings("", "", "").await;

        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert!(manager.endpoints().await.is_none());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn rest_calls_require_settings() {
        let manager = ConnectionManager::new(ConnectionTuning::default());
        assert!(matches!(
            manager.fetch_items().await,
            Err(CoreError::NotConfigured { .. })
        ));
        assert!(matches!(
            manager.post_command("Lamp", &"ON".into()).await,
            Err(CoreError::NotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn configure_does_not_open_a_session() {
        let manager = ConnectionManager::new(ConnectionTuning::default());

        assert!(manager.configure("openhab.local", "8080", "").await);
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert!(manager.endpoints().await.is_some());

        assert!(!manager.configure(" ", "8080", "").await);
        assert!(manager.endpoints().await.is_none());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let manager = ConnectionManager::new(ConnectionTuning::default());
        assert!(!manager.send_message(WireMessage::heartbeat()).await);
        manager.disconnect().await;
        manager.disconnect().await;
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
    }
}
