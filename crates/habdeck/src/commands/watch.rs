//! Live state-change stream.

use std::collections::HashSet;

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing::debug;

use habdeck_core::{ConnectionManager, ConnectionState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct StateChange {
    time: DateTime<Local>,
    item: String,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_value: Option<String>,
}

/// Expects `connection` to have been handed settings already; the event
/// stream is opening or open.
pub async fn handle(
    connection: &ConnectionManager,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let filter: HashSet<String> = args.items.into_iter().collect();
    let color = output::should_color(&global.color);

    let mut changes = std::pin::pin!(connection.item_states());
    let mut state = connection.watch_state();
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());

    if *state.borrow_and_update() == ConnectionState::Disconnected {
        return Err(CliError::ConnectionFailed {
            reason: "event stream could not be opened".into(),
        });
    }

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                match current {
                    ConnectionState::Connected => {
                        if !global.quiet {
                            eprintln!("Watching for state changes (Ctrl-C to stop)");
                        }
                    }
                    ConnectionState::Disconnected => {
                        return Err(CliError::ConnectionFailed {
                            reason: "event stream closed".into(),
                        });
                    }
                    ConnectionState::Connecting => {}
                }
            }
            change = changes.next() => {
                let Some(change) = change else {
                    break;
                };
                let Some(item) = change.item_name() else {
                    continue;
                };
                if !filter.is_empty() && !filter.contains(item) {
                    continue;
                }
                let payload = match change.state() {
                    Ok(payload) => payload,
                    Err(e) => {
                        debug!(item, error = %e, "undecodable state payload");
                        continue;
                    }
                };

                let row = StateChange {
                    time: Local::now(),
                    item: item.to_owned(),
                    value: payload.value,
                    old_value: payload.old_value,
                };
                output::print_output(&render_change(&row, &global.output, color)?, global.quiet);
            }
        }
    }

    connection.disconnect().await;
    Ok(())
}

fn render_change(
    row: &StateChange,
    format: &OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let time = row.time.format("%H:%M:%S").to_string();
            let old = row.old_value.as_deref().unwrap_or("?");
            Ok(if color {
                format!(
                    "{} {} {} → {}",
                    time.dimmed(),
                    row.item.bold(),
                    old.dimmed(),
                    row.value.green()
                )
            } else {
                format!("{time} {} {old} → {}", row.item, row.value)
            })
        }
        // One record per line, whatever the JSON flavour.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(row),
        OutputFormat::Yaml => {
            output::render_yaml(row).map(|yaml| format!("---\n{}", yaml.trim_end()))
        }
        OutputFormat::Plain => Ok(format!("{} {}", row.item, row.value)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> StateChange {
        StateChange {
            time: Local::now(),
            item: "Blind".into(),
            value: "35".into(),
            old_value: Some("40".into()),
        }
    }

    #[test]
    fn plain_is_item_and_value() {
        assert_eq!(
            render_change(&row(), &OutputFormat::Plain, false).unwrap(),
            "Blind 35"
        );
    }

    #[test]
    fn uncolored_table_line() {
        let line = render_change(&row(), &OutputFormat::Table, false).unwrap();
        assert!(line.ends_with("Blind 40 → 35"), "{line}");
    }

    #[test]
    fn json_is_one_line() {
        let line = render_change(&row(), &OutputFormat::Json, false).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["item"], "Blind");
        assert_eq!(value["old_value"], "40");
    }
}
