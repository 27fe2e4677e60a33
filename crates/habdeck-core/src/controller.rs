// ── Controller model ──
//
// A `Controller` binds one physical control (key or dial) to one openHAB
// item. The set of kinds is closed; each kind renders itself onto the
// `Surface` differently.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Prefix of the action UUIDs registered with the surface host.
pub const ACTION_UUID_PREFIX: &str = "org.openhab.stream-deck-plugin.";

// ── ControlId ────────────────────────────────────────────────────────

/// Opaque identifier of one physical control instance, assigned by the
/// surface host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(String);

impl ControlId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControlId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ControlId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ── Kinds ────────────────────────────────────────────────────────────

/// Capability of a control.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ControlKind {
    /// Shows the item state as the title.
    DisplayState,
    /// Toggles an `OnOff` item.
    Switch,
    /// Sends a fixed value.
    SendValue,
    /// Percentage dial with on/off toggle.
    Dimmer,
    /// Position dial.
    RollerShutter,
}

impl ControlKind {
    /// Resolve a full action UUID such as
    /// `org.openhab.stream-deck-plugin.roller-shutter`.
    pub fn from_action_uuid(uuid: &str) -> Option<Self> {
        uuid.strip_prefix(ACTION_UUID_PREFIX)?.parse().ok()
    }

    /// Kinds whose dial input goes through the debounce coalescer.
    pub fn is_dial_driven(self) -> bool {
        matches!(self, Self::Dimmer | Self::RollerShutter)
    }
}

/// Physical shape of the control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ControlForm {
    #[default]
    Key,
    Dial,
}

// ── Settings ─────────────────────────────────────────────────────────

/// Per-control settings blob, persisted by the surface host.
///
/// Field names follow the host's camelCase JSON. Unknown fields are kept
/// in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSettings {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub item_name: String,
    /// Last known item state.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub latest_command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_to_send: Option<String>,
    /// openHAB value type of `value_to_send`, e.g. `Percent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_title: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ItemSettings {
    pub fn for_item(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            ..Self::default()
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

/// A command value. Opaque to the registry; the wire form is its
/// `Display` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandValue {
    Text(String),
    Number(i64),
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for CommandValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for CommandValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for CommandValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

// ── Surface ──────────────────────────────────────────────────────────

/// Dial touch-strip feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialFeedback {
    pub indicator: i64,
    pub value: String,
}

impl DialFeedback {
    pub fn percent(value: i64) -> Self {
        Self {
            indicator: value,
            value: format!("{value}%"),
        }
    }
}

/// Rendering and persistence primitives of the control surface.
///
/// Calls are fire-and-forget; implementations queue or drop, never block.
pub trait Surface: Send + Sync {
    fn set_title(&self, control: &ControlId, title: &str);
    fn set_key_state(&self, control: &ControlId, state: u8);
    fn set_feedback(&self, control: &ControlId, feedback: &DialFeedback);
    fn persist_settings(&self, control: &ControlId, settings: &ItemSettings);
    fn show_alert(&self, control: &ControlId);
}

// ── Controller ───────────────────────────────────────────────────────

/// One live control binding.
///
/// Settings are required at construction, so there is no "not yet
/// initialized" state to guard against.
#[derive(Debug, Clone)]
pub struct Controller {
    id: ControlId,
    kind: ControlKind,
    form: ControlForm,
    settings: ItemSettings,
}

impl Controller {
    pub fn new(id: ControlId, kind: ControlKind, form: ControlForm, settings: ItemSettings) -> Self {
        Self {
            id,
            kind,
            form,
            settings,
        }
    }

    pub fn id(&self) -> &ControlId {
        &self.id
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn form(&self) -> ControlForm {
        self.form
    }

    pub fn item_name(&self) -> &str {
        &self.settings.item_name
    }

    pub fn settings(&self) -> &ItemSettings {
        &self.settings
    }

    pub fn state(&self) -> &str {
        &self.settings.state
    }

    /// Replace the settings blob. Returns `true` when the tracked item
    /// changed.
    pub fn replace_settings(&mut self, settings: ItemSettings) -> bool {
        let item_changed = self.settings.item_name != settings.item_name;
        self.settings = settings;
        item_changed
    }

    pub fn set_state(&mut self, state: &str) {
        state.clone_into(&mut self.settings.state);
    }

    /// State as an integer: leading integer part, 0 for `NULL`/`UNDEF`.
    pub fn numeric_state(&self) -> i64 {
        parse_leading_int(&self.settings.state)
    }

    /// Whether the item is "on" for this kind's key rendering.
    pub fn is_active(&self) -> bool {
        match self.kind {
            ControlKind::DisplayState => false,
            ControlKind::Switch => self.settings.state == "ON",
            ControlKind::SendValue => self
                .settings
                .value_to_send
                .as_deref()
                .is_some_and(|value| value == self.settings.state),
            ControlKind::Dimmer | ControlKind::RollerShutter => self.numeric_state() > 0,
        }
    }

    /// Push the current settings onto the surface.
    pub fn refresh(&self, surface: &dyn Surface) {
        match self.kind {
            ControlKind::DisplayState => {
                surface.set_title(&self.id, &self.settings.state);
            }
            ControlKind::Switch => {
                if self.form == ControlForm::Key {
                    surface.set_key_state(&self.id, u8::from(self.is_active()));
                }
            }
            ControlKind::SendValue => {
                surface.set_title(&self.id, &self.send_value_title());
                if self.form == ControlForm::Key {
                    surface.set_key_state(&self.id, u8::from(self.is_active()));
                }
            }
            ControlKind::Dimmer | ControlKind::RollerShutter => match self.form {
                ControlForm::Key => surface.set_key_state(&self.id, u8::from(self.is_active())),
                ControlForm::Dial => {
                    surface.set_feedback(&self.id, &DialFeedback::percent(self.numeric_state()));
                }
            },
        }
    }

    fn send_value_title(&self) -> String {
        let value = self.settings.value_to_send.as_deref().unwrap_or_default();
        let unit = if self.settings.value_type.as_deref() == Some("Percent") {
            "%"
        } else {
            ""
        };
        format!("Send\n{value}{unit}")
    }
}

/// Parse the leading integer of a state string: `"35.7"` → 35,
/// `"-3 °C"` → -3, `"NULL"` → 0.
pub fn parse_leading_int(state: &str) -> i64 {
    let trimmed = state.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude = digits[..end].parse::<i64>().unwrap_or(0);

    if negative { -magnitude } else { magnitude }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::RecordingSurface;

    fn controller(kind: ControlKind, form: ControlForm, state: &str) -> Controller {
        let settings = ItemSettings {
            state: state.into(),
            ..ItemSettings::for_item("Item")
        };
        Controller::new(ControlId::new("c1"), kind, form, settings)
    }

    #[test]
    fn parse_leading_int_matches_item_states() {
        assert_eq!(parse_leading_int("42"), 42);
        assert_eq!(parse_leading_int("35.7"), 35);
        assert_eq!(parse_leading_int("-3 °C"), -3);
        assert_eq!(parse_leading_int("120,50,80"), 120);
        assert_eq!(parse_leading_int("NULL"), 0);
        assert_eq!(parse_leading_int(""), 0);
    }

    #[test]
    fn kind_from_action_uuid() {
        assert_eq!(
            ControlKind::from_action_uuid("org.openhab.stream-deck-plugin.roller-shutter"),
            Some(ControlKind::RollerShutter)
        );
        assert_eq!(
            ControlKind::from_action_uuid("org.openhab.stream-deck-plugin.display-state"),
            Some(ControlKind::DisplayState)
        );
        assert_eq!(ControlKind::from_action_uuid("com.example.other"), None);
    }

    #[test]
    fn settings_keep_unknown_fields() {
        let json = serde_json::json!({
            "title": "Kitchen",
            "itemName": "Kitchen_Light",
            "state": "ON",
            "latestCommand": "",
            "showTitle": true,
            "colour": "blue"
        });
        let settings: ItemSettings = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(settings.item_name, "Kitchen_Light");
        assert_eq!(settings.show_title, Some(true));
        assert_eq!(settings.extra["colour"], "blue");
        assert_eq!(serde_json::to_value(&settings).unwrap(), json);
    }

    #[test]
    fn display_state_renders_title() {
        let surface = RecordingSurface::default();
        controller(ControlKind::DisplayState, ControlForm::Key, "21.5 °C").refresh(&surface);
        assert_eq!(surface.take(), vec!["title c1 \"21.5 °C\""]);
    }

    #[test]
    fn switch_renders_key_state() {
        let surface = RecordingSurface::default();
        controller(ControlKind::Switch, ControlForm::Key, "ON").refresh(&surface);
        controller(ControlKind::Switch, ControlForm::Key, "OFF").refresh(&surface);
        assert_eq!(surface.take(), vec!["state c1 1", "state c1 0"]);
    }

    #[test]
    fn send_value_renders_title_and_match() {
        let surface = RecordingSurface::default();
        let mut c = controller(ControlKind::SendValue, ControlForm::Key, "40");
        c.settings.value_to_send = Some("40".into());
        c.settings.value_type = Some("Percent".into());
        c.refresh(&surface);
        assert_eq!(surface.take(), vec!["title c1 \"Send\\n40%\"", "state c1 1"]);
    }

    #[test]
    fn dimmer_dial_renders_feedback() {
        let surface = RecordingSurface::default();
        controller(ControlKind::Dimmer, ControlForm::Dial, "35").refresh(&surface);
        controller(ControlKind::RollerShutter, ControlForm::Key, "0").refresh(&surface);
        assert_eq!(surface.take(), vec!["feedback c1 35 35%", "state c1 0"]);
    }

    #[test]
    fn replace_settings_reports_item_change() {
        let mut c = controller(ControlKind::Switch, ControlForm::Key, "ON");
        assert!(!c.replace_settings(ItemSettings::for_item("Item")));
        assert!(c.replace_settings(ItemSettings::for_item("Other")));
        assert_eq!(c.item_name(), "Other");
    }
}
