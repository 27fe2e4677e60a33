//! `habdeck bridge`: the control-surface runtime.
//!
//! Host events arrive as JSON lines on stdin; render operations leave as
//! JSON lines on stdout. Logs never go to stdout.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use habdeck_config::Config;
use habdeck_core::{
    ActionRegistry, Bridge, ConnectionManager, DialCoalescer, ItemGateway, Surface,
};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::stdio_surface::{self, StdioSurface};

const SURFACE_QUEUE: usize = 64;

pub async fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let connection = ConnectionManager::new(cfg.connection_tuning());

    let (surface, commands) = StdioSurface::new();
    let writer = tokio::spawn(stdio_surface::write_commands(commands, tokio::io::stdout()));

    let gateway: Arc<dyn ItemGateway> = Arc::new(connection.clone());
    let surface: Arc<dyn Surface> = Arc::new(surface);
    let registry = ActionRegistry::new(gateway, surface);
    let bridge = Bridge::new(
        registry,
        DialCoalescer::new(cfg.dial_tuning()),
        connection.subscribe(),
    );

    // Settings from flags or the config file apply right away; the host
    // may replace them later with a globalSettings line.
    let settings = config::server_settings(global, cfg);
    if settings.is_configured() {
        connection
            .update_settings(
                &settings.host,
                &settings.port,
                settings.api_token.expose_secret(),
            )
            .await;
    }

    let (events_tx, events_rx) = mpsc::channel(SURFACE_QUEUE);
    let reader = tokio::spawn(stdio_surface::read_host_events(
        BufReader::new(tokio::io::stdin()),
        connection.clone(),
        events_tx,
    ));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            interrupt.cancel();
        }
    });

    let registry = bridge.run(events_rx, cancel).await;
    info!(controls = registry.len(), "bridge finished");

    reader.abort();
    connection.disconnect().await;

    // The writer drains once the last surface handle is gone.
    drop(registry);
    match writer.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(error = %e, "surface output failed");
            Err(CliError::Io(e))
        }
        Err(e) => Err(CliError::Io(std::io::Error::other(e))),
    }
}
