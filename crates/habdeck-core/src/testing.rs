// Test doubles shared by the unit tests of this crate.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;

use crate::controller::{CommandValue, ControlId, DialFeedback, ItemSettings, Surface};
use crate::registry::ItemGateway;

/// Surface double that records every call as a string.
#[derive(Default)]
pub(crate) struct RecordingSurface {
    calls: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Surface for RecordingSurface {
    fn set_title(&self, control: &ControlId, title: &str) {
        self.record(format!("title {control} {title:?}"));
    }

    fn set_key_state(&self, control: &ControlId, state: u8) {
        self.record(format!("state {control} {state}"));
    }

    fn set_feedback(&self, control: &ControlId, feedback: &DialFeedback) {
        self.record(format!(
            "feedback {control} {} {}",
            feedback.indicator, feedback.value
        ));
    }

    fn persist_settings(&self, control: &ControlId, settings: &ItemSettings) {
        self.record(format!("persist {control} {}", settings.state));
    }

    fn show_alert(&self, control: &ControlId) {
        self.record(format!("alert {control}"));
    }
}

/// Gateway double that records state requests and commands.
#[derive(Default)]
pub(crate) struct RecordingGateway {
    requests: Mutex<Vec<String>>,
    commands: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    pub fn take_requests(&self) -> Vec<String> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }

    pub fn take_commands(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.commands.lock().unwrap())
    }
}

impl ItemGateway for RecordingGateway {
    fn request_state(&self, item_name: &str) {
        self.requests.lock().unwrap().push(item_name.to_owned());
    }

    fn send_command(&self, item_name: &str, value: &CommandValue) {
        self.commands
            .lock()
            .unwrap()
            .push((item_name.to_owned(), value.to_string()));
    }
}
