mod cli;
mod commands;
mod config;
mod error;
mod output;
mod stdio_surface;

use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::error::{CliError, exit_code};

const LOG_FILE_NAME: &str = "habdeck.log";

fn main() {
    let cli = Cli::parse();
    let cfg = config::load_config_or_default();

    let guard = init_tracing(cli.global.verbose, cli.global.log_file.as_deref(), &cfg);

    // One thread: the bridge is a single cooperative event loop.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(CliError::Io(e)));
            std::process::exit(exit_code::GENERAL);
        }
    };

    let result = runtime.block_on(run(cli, &cfg));
    // Don't wait on a pending stdin read.
    runtime.shutdown_background();

    let code = match result {
        Ok(()) => 0,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };

    drop(guard);
    std::process::exit(code);
}

/// Logs go to stderr, or to a daily-rotated file when `--log-file` or
/// `log.directory` is set. Never to stdout: the bridge owns it.
fn init_tracing(
    verbosity: u8,
    log_file: Option<&Path>,
    cfg: &habdeck_config::Config,
) -> Option<WorkerGuard> {
    let default_filter = match verbosity {
        0 => cfg.log.filter.clone().unwrap_or_else(|| "warn".into()),
        1 => "info".into(),
        2 => "debug".into(),
        _ => "trace".into(),
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let target = match (log_file, cfg.log.directory.as_deref()) {
        (Some(file), _) => Some((
            file.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf(),
            file.file_name()
                .map_or_else(|| LOG_FILE_NAME.into(), |n| n.to_string_lossy().into_owned()),
        )),
        (None, Some(dir)) => Some((dir.to_path_buf(), LOG_FILE_NAME.to_owned())),
        (None, None) => None,
    };

    match target {
        Some((dir, prefix)) => {
            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .init();
            None
        }
    }
}

async fn run(cli: Cli, cfg: &habdeck_config::Config) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a server
        Command::Config(args) => commands::config_cmd::handle(args, cfg, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "habdeck", &mut std::io::stdout());
            Ok(())
        }

        // The host may supply the server later, so no host is required here
        Command::Bridge => commands::bridge::handle(cfg, &cli.global).await,

        cmd => {
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, cfg, &cli.global).await
        }
    }
}
