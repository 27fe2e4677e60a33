// ── Bridge ──
//
// The event loop that ties surface input, connection events and dial
// flushes to the registry. Runs on one task; all registry and coalescer
// state is owned here and never shared.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coalescer::{DialCoalescer, ResolvedRotation};
use crate::connection::ConnectionEvent;
use crate::controller::{ControlForm, ControlId, ControlKind, DialFeedback, ItemSettings};
use crate::registry::ActionRegistry;

// ── SurfaceEvent ─────────────────────────────────────────────────────

/// Input from the control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SurfaceEvent {
    /// A control became visible.
    WillAppear {
        control: ControlId,
        kind: ControlKind,
        #[serde(default)]
        form: ControlForm,
        #[serde(default)]
        settings: ItemSettings,
    },
    /// A control was hidden.
    WillDisappear { control: ControlId },
    /// The user edited a control's settings.
    DidReceiveSettings {
        control: ControlId,
        kind: ControlKind,
        #[serde(default)]
        settings: ItemSettings,
    },
    KeyDown { control: ControlId },
    KeyUp { control: ControlId },
    DialDown { control: ControlId },
    TouchTap { control: ControlId },
    DialRotate { control: ControlId, ticks: i64 },
}

// ── Bridge ───────────────────────────────────────────────────────────

pub struct Bridge {
    registry: ActionRegistry,
    coalescer: DialCoalescer,
    connection_events: broadcast::Receiver<ConnectionEvent>,
    key_presses: HashMap<ControlId, Instant>,
}

impl Bridge {
    pub fn new(
        registry: ActionRegistry,
        coalescer: DialCoalescer,
        connection_events: broadcast::Receiver<ConnectionEvent>,
    ) -> Self {
        Self {
            registry,
            coalescer,
            connection_events,
            key_presses: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Process events until cancelled or until the surface input ends.
    /// Returns the registry so callers can inspect the final state.
    pub async fn run(
        mut self,
        mut surface_events: mpsc::Receiver<SurfaceEvent>,
        cancel: CancellationToken,
    ) -> ActionRegistry {
        info!("bridge running");
        let mut connection_open = true;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = self.connection_events.recv(), if connection_open => {
                    match event {
                        Ok(event) => self.handle_connection_event(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "bridge lagged behind connection events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("connection event channel closed");
                            connection_open = false;
                        }
                    }
                }
                event = surface_events.recv() => {
                    let Some(event) = event else {
                        info!("surface input closed");
                        break;
                    };
                    self.handle_surface_event(event);
                }
                flush = self.coalescer.next_flush() => self.handle_flush(&flush),
            }
        }

        info!("bridge stopped");
        self.registry
    }

    // ── Connection events ────────────────────────────────────────────

    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                info!("connected; refreshing all items");
                self.registry.refresh_all_items();
            }
            ConnectionEvent::Disconnected => {
                warn!("disconnected from openHAB");
                self.registry.show_alert_on_all();
            }
            ConnectionEvent::ItemState(change) => {
                self.registry.handle_item_state(&change);
            }
        }
    }

    // ── Surface events ───────────────────────────────────────────────

    pub fn handle_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::WillAppear {
                control,
                kind,
                form,
                settings,
            } => self.registry.add(control, kind, form, settings),
            SurfaceEvent::WillDisappear { control } => {
                self.coalescer.cancel(&control);
                self.key_presses.remove(&control);
                self.registry.remove(&control);
            }
            SurfaceEvent::DidReceiveSettings {
                control,
                kind,
                settings,
            } => {
                debug!(%control, %kind, "settings received");
                self.registry.update(kind, &control, settings);
            }
            SurfaceEvent::KeyDown { control } => self.on_key_down(&control),
            SurfaceEvent::KeyUp { control } => self.on_key_up(&control),
            SurfaceEvent::DialDown { control } => self.on_dial_down(&control),
            SurfaceEvent::TouchTap { control } => self.on_touch_tap(&control),
            SurfaceEvent::DialRotate { control, ticks } => self.on_dial_rotate(&control, ticks),
        }
    }

    fn lookup(&self, control: &ControlId) -> Option<(ControlKind, ItemSettings)> {
        let controller = self.registry.get(control);
        if controller.is_none() {
            debug!(%control, "event for unknown control");
        }
        controller.map(|c| (c.kind(), c.settings().clone()))
    }

    fn on_key_down(&mut self, control: &ControlId) {
        let Some((kind, settings)) = self.lookup(control) else {
            return;
        };
        debug!(%control, %kind, item = %settings.item_name, state = %settings.state, "key down");

        match kind {
            ControlKind::DisplayState => self.registry.refresh_item_state(&settings.item_name),
            ControlKind::Switch => self.toggle_switch(&settings),
            ControlKind::SendValue => match settings.value_to_send.as_deref() {
                Some(value) if !value.is_empty() => self.registry.send_command(&settings, value),
                _ => warn!(%control, "no value to send configured"),
            },
            ControlKind::Dimmer => self.toggle_dimmer(&settings),
            ControlKind::RollerShutter => {
                self.key_presses.insert(control.clone(), Instant::now());
            }
        }
    }

    fn on_key_up(&mut self, control: &ControlId) {
        if let Some(pressed_at) = self.key_presses.remove(control) {
            debug!(%control, held = ?pressed_at.elapsed(), "key press");
        }
    }

    fn on_dial_down(&mut self, control: &ControlId) {
        let Some((kind, settings)) = self.lookup(control) else {
            return;
        };
        match kind {
            ControlKind::Switch => self.toggle_switch(&settings),
            ControlKind::Dimmer => self.toggle_dimmer(&settings),
            _ => debug!(%control, %kind, item = %settings.item_name, "dial down ignored"),
        }
    }

    fn on_touch_tap(&mut self, control: &ControlId) {
        let Some((kind, settings)) = self.lookup(control) else {
            return;
        };
        match kind {
            ControlKind::Dimmer => self.toggle_dimmer(&settings),
            _ => debug!(%control, %kind, item = %settings.item_name, "touch tap ignored"),
        }
    }

    fn on_dial_rotate(&mut self, control: &ControlId, ticks: i64) {
        let Some(controller) = self.registry.get(control) else {
            debug!(%control, "rotation for unknown control");
            return;
        };
        if !controller.kind().is_dial_driven() {
            debug!(%control, kind = %controller.kind(), "rotation ignored");
            return;
        }

        let base = controller.numeric_state();
        let value = self.coalescer.rotate(control, ticks, base);
        self.registry
            .surface()
            .set_feedback(control, &DialFeedback::percent(value));
    }

    fn toggle_switch(&self, settings: &ItemSettings) {
        let command = if settings.state == "ON" { "OFF" } else { "ON" };
        self.registry.send_command(settings, command);
    }

    fn toggle_dimmer(&self, settings: &ItemSettings) {
        let on = crate::controller::parse_leading_int(&settings.state) > 0;
        self.registry
            .send_command(settings, if on { "OFF" } else { "ON" });
    }

    // ── Dial flushes ─────────────────────────────────────────────────

    pub fn handle_flush(&mut self, flush: &ResolvedRotation) {
        let Some((kind, settings)) = self.lookup(&flush.control) else {
            return;
        };
        debug!(
            control = %flush.control,
            item = %settings.item_name,
            ticks = flush.total_ticks,
            value = flush.value,
            "dial settled"
        );

        match kind {
            ControlKind::Dimmer => self.registry.send_command(&settings, flush.value),
            ControlKind::RollerShutter => {
                self.registry
                    .update_item_state(&settings.item_name, &flush.value.to_string());
                self.registry.send_command(&settings, flush.value);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::DialTuning;
    use crate::testing::{RecordingGateway, RecordingSurface};

    struct Fixture {
        bridge: Bridge,
        gateway: Arc<RecordingGateway>,
        surface: Arc<RecordingSurface>,
        connection: broadcast::Sender<ConnectionEvent>,
    }

    fn fixture() -> Fixture {
        let gateway = Arc::new(RecordingGateway::default());
        let surface = Arc::new(RecordingSurface::default());
        let registry = ActionRegistry::new(gateway.clone(), surface.clone());
        let (connection, events) = broadcast::channel(16);
        let bridge = Bridge::new(registry, DialCoalescer::new(DialTuning::default()), events);
        Fixture {
            bridge,
            gateway,
            surface,
            connection,
        }
    }

    fn appear(kind: ControlKind, form: ControlForm, item: &str, state: &str) -> SurfaceEvent {
        SurfaceEvent::WillAppear {
            control: ControlId::new("c"),
            kind,
            form,
            settings: ItemSettings {
                state: state.into(),
                ..ItemSettings::for_item(item)
            },
        }
    }

    fn control() -> ControlId {
        ControlId::new("c")
    }

    #[test]
    fn surface_events_parse_from_json() {
        let event: SurfaceEvent = serde_json::from_str(
            r#"{"event":"willAppear","control":"ctx1","kind":"roller-shutter","form":"dial",
                "settings":{"itemName":"Blind","state":"40"}}"#,
        )
        .unwrap();
        let SurfaceEvent::WillAppear {
            kind, form, settings, ..
        } = event
        else {
            panic!("expected willAppear");
        };
        assert_eq!(kind, ControlKind::RollerShutter);
        assert_eq!(form, ControlForm::Dial);
        assert_eq!(settings.item_name, "Blind");

        let rotate: SurfaceEvent =
            serde_json::from_str(r#"{"event":"dialRotate","control":"ctx1","ticks":-3}"#).unwrap();
        assert_eq!(
            rotate,
            SurfaceEvent::DialRotate {
                control: ControlId::new("ctx1"),
                ticks: -3
            }
        );
    }

    #[test]
    fn switch_key_toggles() {
        let mut f = fixture();
        f.bridge
            .handle_surface_event(appear(ControlKind::Switch, ControlForm::Key, "Lamp", "ON"));
        f.bridge.handle_surface_event(SurfaceEvent::KeyDown { control: control() });
        assert_eq!(
            f.gateway.take_commands(),
            vec![("Lamp".to_string(), "OFF".to_string())]
        );
    }

    #[test]
    fn dimmer_tap_turns_on_when_off() {
        let mut f = fixture();
        f.bridge
            .handle_surface_event(appear(ControlKind::Dimmer, ControlForm::Dial, "Dim", "0"));
        f.bridge.handle_surface_event(SurfaceEvent::TouchTap { control: control() });
        f.bridge.handle_surface_event(SurfaceEvent::DialDown { control: control() });
        assert_eq!(
            f.gateway.take_commands(),
            vec![
                ("Dim".to_string(), "ON".to_string()),
                ("Dim".to_string(), "ON".to_string())
            ]
        );
    }

    #[test]
    fn send_value_key_sends_configured_value() {
        let mut f = fixture();
        f.bridge.handle_surface_event(SurfaceEvent::WillAppear {
            control: control(),
            kind: ControlKind::SendValue,
            form: ControlForm::Key,
            settings: ItemSettings {
                value_to_send: Some("25".into()),
                ..ItemSettings::for_item("Blind")
            },
        });
        f.bridge.handle_surface_event(SurfaceEvent::KeyDown { control: control() });
        assert_eq!(
            f.gateway.take_commands(),
            vec![("Blind".to_string(), "25".to_string())]
        );
    }

    #[test]
    fn display_state_key_requests_refresh() {
        let mut f = fixture();
        f.bridge.handle_surface_event(appear(
            ControlKind::DisplayState,
            ControlForm::Key,
            "Temp",
            "",
        ));
        f.gateway.take_requests();
        f.bridge.handle_surface_event(SurfaceEvent::KeyDown { control: control() });
        assert_eq!(f.gateway.take_requests(), vec!["Temp"]);
        assert!(f.gateway.take_commands().is_empty());
    }

    #[test]
    fn connection_events_drive_registry() {
        let mut f = fixture();
        f.bridge
            .handle_surface_event(appear(ControlKind::Switch, ControlForm::Key, "Lamp", "OFF"));
        f.gateway.take_requests();
        f.surface.take();

        f.bridge.handle_connection_event(ConnectionEvent::Connected);
        assert_eq!(f.gateway.take_requests(), vec!["Lamp"]);

        f.bridge.handle_connection_event(ConnectionEvent::Disconnected);
        assert_eq!(f.surface.take(), vec!["alert c"]);

        f.bridge.handle_connection_event(ConnectionEvent::ItemState(
            habdeck_api::ItemStateChangedEvent::synthesize("Lamp", "ON"),
        ));
        assert_eq!(f.bridge.registry().get(&control()).unwrap().state(), "ON");
    }

    #[test]
    fn rotation_on_switch_is_ignored() {
        let mut f = fixture();
        f.bridge
            .handle_surface_event(appear(ControlKind::Switch, ControlForm::Dial, "Lamp", "ON"));
        f.surface.take();
        f.bridge.handle_surface_event(SurfaceEvent::DialRotate {
            control: control(),
            ticks: 4,
        });
        assert!(f.surface.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dimmer_rotation_burst_sends_one_clamped_command() {
        let f = fixture();
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.bridge.run(rx, cancel.clone()));

        tx.send(appear(ControlKind::Dimmer, ControlForm::Dial, "Dim", "95"))
            .await
            .unwrap();
        for _ in 0..3 {
            tx.send(SurfaceEvent::DialRotate {
                control: control(),
                ticks: 4,
            })
            .await
            .unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(f.gateway.take_commands().is_empty());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(
            f.gateway.take_commands(),
            vec![("Dim".to_string(), "100".to_string())]
        );
        assert!(f.surface.take().contains(&"feedback c 100 100%".to_string()));

        cancel.cancel();
        let registry = task.await.unwrap();
        assert_eq!(registry.len(), 1);
        drop(f.connection);
    }

    #[tokio::test(start_paused = true)]
    async fn roller_flush_updates_state_before_sending() {
        let f = fixture();
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.bridge.run(rx, cancel.clone()));

        tx.send(appear(ControlKind::RollerShutter, ControlForm::Dial, "Blind", "40"))
            .await
            .unwrap();
        tx.send(SurfaceEvent::DialRotate {
            control: control(),
            ticks: -5,
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(
            f.gateway.take_commands(),
            vec![("Blind".to_string(), "35".to_string())]
        );
        assert!(f.surface.take().contains(&"persist c 35".to_string()));

        drop(tx);
        let registry = task.await.unwrap();
        assert_eq!(registry.get(&control()).unwrap().state(), "35");
        drop(cancel);
    }
}
