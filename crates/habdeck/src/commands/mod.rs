//! Command dispatch: bridges CLI args -> core calls -> output formatting.

pub mod bridge;
pub mod config_cmd;
pub mod items;
pub mod send;
pub mod state;
pub mod watch;

use secrecy::ExposeSecret;

use habdeck_config::Config;
use habdeck_core::ConnectionManager;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = config::require_server(global, cfg)?;
    let (host, port, token) = (
        settings.host.as_str(),
        settings.port.as_str(),
        settings.api_token.expose_secret(),
    );
    let connection = ConnectionManager::new(cfg.connection_tuning());

    match cmd {
        Command::Items(args) => {
            connection.configure(host, port, token).await;
            items::handle(&connection, args, global).await
        }
        Command::State(args) => {
            connection.configure(host, port, token).await;
            state::handle(&connection, args, global).await
        }
        Command::Send(args) => {
            connection.configure(host, port, token).await;
            send::handle(&connection, args, global).await
        }
        Command::Watch(args) => {
            connection.update_settings(host, port, token).await;
            watch::handle(&connection, args, global).await
        }
        // Bridge, Config and Completions are handled before dispatch
        Command::Bridge | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
