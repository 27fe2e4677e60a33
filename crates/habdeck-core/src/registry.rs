// ── Action registry ──
//
// Single source of truth for which controls exist and which item each
// one tracks. Routes server state changes to every matching controller
// and hands outgoing commands to an `ItemGateway`.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use habdeck_api::ItemStateChangedEvent;

use crate::controller::{
    CommandValue, ControlForm, ControlId, ControlKind, Controller, ItemSettings, Surface,
};

const EVENT_CHANNEL_SIZE: usize = 64;

// ── ItemGateway ──────────────────────────────────────────────────────

/// Outbound side of the registry: one-shot state requests and commands.
///
/// Both calls are fire-and-forget. Failures are the gateway's to log;
/// answers to `request_state` come back through
/// [`ActionRegistry::handle_item_state`].
pub trait ItemGateway: Send + Sync {
    fn request_state(&self, item_name: &str);
    fn send_command(&self, item_name: &str, value: &CommandValue);
}

// ── RegistryEvent ────────────────────────────────────────────────────

/// Change notifications for observers of the live control set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added {
        control: ControlId,
        kind: ControlKind,
    },
    Updated {
        control: ControlId,
        kind: ControlKind,
        item_changed: bool,
    },
    Removed {
        control: ControlId,
        remaining: usize,
    },
}

// ── ActionRegistry ───────────────────────────────────────────────────

pub struct ActionRegistry {
    controllers: IndexMap<ControlId, Controller>,
    gateway: Arc<dyn ItemGateway>,
    surface: Arc<dyn Surface>,
    events: broadcast::Sender<RegistryEvent>,
}

impl ActionRegistry {
    pub fn new(gateway: Arc<dyn ItemGateway>, surface: Arc<dyn Surface>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            controllers: IndexMap::new(),
            gateway,
            surface,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Register a controller, render it, and request its item state.
    ///
    /// A control id that is already registered is replaced.
    pub fn add(
        &mut self,
        control: ControlId,
        kind: ControlKind,
        form: ControlForm,
        settings: ItemSettings,
    ) {
        info!(%control, %kind, item = %settings.item_name, "adding control");

        let item_name = settings.item_name.clone();
        let controller = Controller::new(control.clone(), kind, form, settings);
        controller.refresh(self.surface.as_ref());

        if let Some(previous) = self.controllers.insert(control.clone(), controller) {
            debug!(%control, previous = %previous.kind(), "replaced existing control");
        }
        debug!(count = self.controllers.len(), "controls known");

        let _ = self.events.send(RegistryEvent::Added { control, kind });
        self.refresh_item_state(&item_name);
    }

    pub fn add_display_state(&mut self, control: ControlId, form: ControlForm, settings: ItemSettings) {
        self.add(control, ControlKind::DisplayState, form, settings);
    }

    pub fn add_switch(&mut self, control: ControlId, form: ControlForm, settings: ItemSettings) {
        self.add(control, ControlKind::Switch, form, settings);
    }

    pub fn add_send_value(&mut self, control: ControlId, form: ControlForm, settings: ItemSettings) {
        self.add(control, ControlKind::SendValue, form, settings);
    }

    pub fn add_dimmer(&mut self, control: ControlId, form: ControlForm, settings: ItemSettings) {
        self.add(control, ControlKind::Dimmer, form, settings);
    }

    pub fn add_roller_shutter(
        &mut self,
        control: ControlId,
        form: ControlForm,
        settings: ItemSettings,
    ) {
        self.add(control, ControlKind::RollerShutter, form, settings);
    }

    /// Replace the settings of an existing controller of `kind`.
    ///
    /// Unknown ids (or an id registered under another kind) are ignored.
    /// When the tracked item changes, the new item's state is requested.
    /// Returns `true` if a controller was updated.
    pub fn update(&mut self, kind: ControlKind, control: &ControlId, settings: ItemSettings) -> bool {
        let Some(controller) = self
            .controllers
            .get_mut(control)
            .filter(|c| c.kind() == kind)
        else {
            debug!(%control, %kind, "update for unknown control");
            return false;
        };

        let item_changed = controller.replace_settings(settings);
        controller.refresh(self.surface.as_ref());
        let item_name = controller.item_name().to_owned();

        let _ = self.events.send(RegistryEvent::Updated {
            control: control.clone(),
            kind,
            item_changed,
        });

        if item_changed {
            debug!(%control, item = %item_name, "tracked item changed");
            self.refresh_item_state(&item_name);
        }
        true
    }

    pub fn update_display_state(&mut self, control: &ControlId, settings: ItemSettings) -> bool {
        self.update(ControlKind::DisplayState, control, settings)
    }

    pub fn update_switch(&mut self, control: &ControlId, settings: ItemSettings) -> bool {
        self.update(ControlKind::Switch, control, settings)
    }

    pub fn update_send_value(&mut self, control: &ControlId, settings: ItemSettings) -> bool {
        self.update(ControlKind::SendValue, control, settings)
    }

    pub fn update_dimmer(&mut self, control: &ControlId, settings: ItemSettings) -> bool {
        self.update(ControlKind::Dimmer, control, settings)
    }

    pub fn update_roller_shutter(&mut self, control: &ControlId, settings: ItemSettings) -> bool {
        self.update(ControlKind::RollerShutter, control, settings)
    }

    /// Drop a controller. Idempotent.
    pub fn remove(&mut self, control: &ControlId) -> Option<Controller> {
        let removed = self.controllers.shift_remove(control)?;
        debug!(%control, remaining = self.controllers.len(), "removed control");

        let _ = self.events.send(RegistryEvent::Removed {
            control: control.clone(),
            remaining: self.controllers.len(),
        });
        Some(removed)
    }

    // ── State fan-out ────────────────────────────────────────────────

    /// Apply a server state-change event. Events without an item name or
    /// with an undecodable payload are dropped.
    pub fn handle_item_state(&mut self, event: &ItemStateChangedEvent) -> usize {
        let Some(item_name) = event.item_name() else {
            debug!(topic = %event.topic, "state event without item name");
            return 0;
        };

        match event.state() {
            Ok(state) => self.update_item_state(item_name, &state.value),
            Err(e) => {
                warn!(item = item_name, error = %e, "dropping state event");
                0
            }
        }
    }

    /// Store `value` as the state of every controller tracking
    /// `item_name`, persist it, and re-render. Returns how many
    /// controllers matched.
    pub fn update_item_state(&mut self, item_name: &str, value: &str) -> usize {
        let mut matched = 0;
        for controller in self
            .controllers
            .values_mut()
            .filter(|c| c.item_name() == item_name)
        {
            controller.set_state(value);
            self.surface
                .persist_settings(controller.id(), controller.settings());
            controller.refresh(self.surface.as_ref());
            matched += 1;
        }
        debug!(item = item_name, value, matched, "item state applied");
        matched
    }

    /// Ask the gateway for a one-shot state read. Empty names are ignored.
    pub fn refresh_item_state(&self, item_name: &str) {
        if item_name.is_empty() {
            return;
        }
        self.gateway.request_state(item_name);
    }

    /// Send `value` to the item named in `settings`.
    pub fn send_command(&self, settings: &ItemSettings, value: impl Into<CommandValue>) {
        if settings.item_name.is_empty() {
            warn!("command for control without item; skipping");
            return;
        }
        let value = value.into();
        debug!(item = %settings.item_name, %value, "sending command");
        self.gateway.send_command(&settings.item_name, &value);
    }

    // ── Bulk operations ──────────────────────────────────────────────

    /// Re-render every control from its cached settings.
    pub fn refresh_all(&self) {
        for controller in self.controllers.values() {
            controller.refresh(self.surface.as_ref());
        }
    }

    /// Request the state of every distinct tracked item once.
    pub fn refresh_all_items(&self) {
        let items: IndexSet<&str> = self
            .controllers
            .values()
            .map(Controller::item_name)
            .filter(|name| !name.is_empty())
            .collect();
        for item_name in items {
            self.gateway.request_state(item_name);
        }
    }

    pub fn show_alert_on_all(&self) {
        for control in self.controllers.keys() {
            self.surface.show_alert(control);
        }
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn get(&self, control: &ControlId) -> Option<&Controller> {
        self.controllers.get(control)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Controllers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Controller> {
        self.controllers.values()
    }

    pub fn controllers_of(&self, kind: ControlKind) -> impl Iterator<Item = &Controller> {
        self.controllers.values().filter(move |c| c.kind() == kind)
    }

    pub fn display_state_controllers(&self) -> impl Iterator<Item = &Controller> {
        self.controllers_of(ControlKind::DisplayState)
    }

    pub fn switch_controllers(&self) -> impl Iterator<Item = &Controller> {
        self.controllers_of(ControlKind::Switch)
    }

    pub fn send_value_controllers(&self) -> impl Iterator<Item = &Controller> {
        self.controllers_of(ControlKind::SendValue)
    }

    pub fn dimmer_controllers(&self) -> impl Iterator<Item = &Controller> {
        self.controllers_of(ControlKind::Dimmer)
    }

    pub fn roller_shutter_controllers(&self) -> impl Iterator<Item = &Controller> {
        self.controllers_of(ControlKind::RollerShutter)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
