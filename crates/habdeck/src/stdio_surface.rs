//! Line-delimited JSON control surface on stdin/stdout.
//!
//! Each stdout line is one render operation (`setTitle`, `setState`,
//! `setFeedback`, `setSettings`, `showAlert`). Each stdin line is either a
//! [`SurfaceEvent`] or a `globalSettings` event carrying the server
//! address, which is applied to the connection manager directly.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use habdeck_core::{
    ConnectionManager, ControlId, DialFeedback, ItemSettings, Surface, SurfaceEvent,
};

const GLOBAL_SETTINGS_EVENT: &str = "globalSettings";

// ── Outbound ─────────────────────────────────────────────────────────

/// One render operation, serialized as a JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SurfaceCommand {
    SetTitle { control: ControlId, title: String },
    SetState { control: ControlId, state: u8 },
    SetFeedback { control: ControlId, payload: DialFeedback },
    SetSettings { control: ControlId, settings: ItemSettings },
    ShowAlert { control: ControlId },
}

/// [`Surface`] that queues render operations for a writer task.
pub struct StdioSurface {
    tx: mpsc::UnboundedSender<SurfaceCommand>,
}

impl StdioSurface {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SurfaceCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, command: SurfaceCommand) {
        if self.tx.send(command).is_err() {
            debug!("surface writer gone; render dropped");
        }
    }
}

impl Surface for StdioSurface {
    fn set_title(&self, control: &ControlId, title: &str) {
        self.emit(SurfaceCommand::SetTitle {
            control: control.clone(),
            title: title.to_owned(),
        });
    }

    fn set_key_state(&self, control: &ControlId, state: u8) {
        self.emit(SurfaceCommand::SetState {
            control: control.clone(),
            state,
        });
    }

    fn set_feedback(&self, control: &ControlId, feedback: &DialFeedback) {
        self.emit(SurfaceCommand::SetFeedback {
            control: control.clone(),
            payload: feedback.clone(),
        });
    }

    fn persist_settings(&self, control: &ControlId, settings: &ItemSettings) {
        self.emit(SurfaceCommand::SetSettings {
            control: control.clone(),
            settings: settings.clone(),
        });
    }

    fn show_alert(&self, control: &ControlId) {
        self.emit(SurfaceCommand::ShowAlert {
            control: control.clone(),
        });
    }
}

/// Drain queued render operations to `out`, one JSON object per line.
/// Returns when every [`StdioSurface`] clone has been dropped.
pub async fn write_commands<W>(
    mut commands: mpsc::UnboundedReceiver<SurfaceCommand>,
    mut out: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let mut line = match serde_json::to_vec(&command) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "cannot encode surface command");
                continue;
            }
        };
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
    Ok(())
}

// ── Inbound ──────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    #[serde(default)]
    pub server_host: String,
    #[serde(default)]
    pub server_port: String,
    #[serde(default)]
    pub api_key: String,
}

/// A decoded stdin line.
#[derive(Debug, PartialEq)]
pub enum HostMessage {
    GlobalSettings(GlobalSettings),
    Surface(SurfaceEvent),
}

pub fn parse_line(line: &str) -> Result<HostMessage, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    if value.get("event").and_then(serde_json::Value::as_str) == Some(GLOBAL_SETTINGS_EVENT) {
        return serde_json::from_value(value).map(HostMessage::GlobalSettings);
    }
    serde_json::from_value(value).map(HostMessage::Surface)
}

/// Read host lines until EOF. Surface events go to the bridge; global
/// settings reconfigure the connection. Bad lines are logged and skipped.
pub async fn read_host_events<R>(
    input: R,
    connection: ConnectionManager,
    events: mpsc::Sender<SurfaceEvent>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(HostMessage::GlobalSettings(settings)) => {
                connection
                    .update_settings(
                        &settings.server_host,
                        &settings.server_port,
                        &settings.api_key,
                    )
                    .await;
            }
            Ok(HostMessage::Surface(event)) => {
                if events.send(event).await.is_err() {
                    debug!("bridge stopped; input reader exiting");
                    break;
                }
            }
            Err(e) => warn!(error = %e, "ignoring malformed host event"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use habdeck_core::{ConnectionTuning, ControlKind};

    use super::*;

    #[test]
    fn global_settings_line() {
        let msg = parse_line(
            r#"{"event":"globalSettings","serverHost":"openhab.local","serverPort":"8080","apiKey":"oh.x"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            HostMessage::GlobalSettings(GlobalSettings {
                server_host: "openhab.local".into(),
                server_port: "8080".into(),
                api_key: "oh.x".into(),
            })
        );
    }

    #[test]
    fn surface_event_line() {
        let msg = parse_line(r#"{"event":"dialRotate","control":"ctx-1","ticks":-2}"#).unwrap();
        assert_eq!(
            msg,
            HostMessage::Surface(SurfaceEvent::DialRotate {
                control: ControlId::new("ctx-1"),
                ticks: -2,
            })
        );
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(parse_line(r#"{"event":"sendToPlugin"}"#).is_err());
        assert!(parse_line("not json").is_err());
    }

    #[tokio::test]
    async fn render_operations_become_json_lines() {
        let (surface, rx) = StdioSurface::new();
        let control = ControlId::new("ctx-7");
        surface.set_title(&control, "ON");
        surface.set_feedback(&control, &DialFeedback::percent(35));
        surface.show_alert(&control);
        drop(surface);

        let mut out = Vec::new();
        write_commands(rx, &mut out).await.unwrap();

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                serde_json::json!({"event": "setTitle", "control": "ctx-7", "title": "ON"}),
                serde_json::json!({
                    "event": "setFeedback",
                    "control": "ctx-7",
                    "payload": {"indicator": 35, "value": "35%"}
                }),
                serde_json::json!({"event": "showAlert", "control": "ctx-7"}),
            ]
        );
    }

    #[tokio::test]
    async fn host_lines_are_routed() {
        let input = concat!(
            r#"{"event":"willAppear","control":"a","kind":"switch","settings":{"itemName":"Lamp"}}"#,
            "\n",
            "garbage\n",
            "\n",
            r#"{"event":"globalSettings","serverHost":"","serverPort":"","apiKey":""}"#,
            "\n",
            r#"{"event":"keyDown","control":"a"}"#,
            "\n",
        );
        let connection = ConnectionManager::new(ConnectionTuning::default());
        let (tx, mut rx) = mpsc::channel(8);

        read_host_events(input.as_bytes(), connection.clone(), tx)
            .await
            .unwrap();

        let Some(SurfaceEvent::WillAppear { kind, settings, .. }) = rx.recv().await else {
            panic!("expected willAppear");
        };
        assert_eq!(kind, ControlKind::Switch);
        assert_eq!(settings.item_name, "Lamp");
        assert_eq!(
            rx.recv().await,
            Some(SurfaceEvent::KeyDown {
                control: ControlId::new("a")
            })
        );
        assert_eq!(rx.recv().await, None);
        assert!(connection.endpoints().await.is_none());
    }
}
