//! CLI configuration: thin wrapper around `habdeck_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --port, --api-token).

use secrecy::ExposeSecret;

use habdeck_core::ServerSettings;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use habdeck_config::{Config, config_path, load_config_or_default};

/// Server settings with CLI flag overrides applied.
///
/// Precedence per field: flag (or its env var) > config file. The token
/// falls through to the shared credential chain when no flag is given.
pub fn server_settings(global: &GlobalOpts, config: &Config) -> ServerSettings {
    let host = global.host.as_deref().unwrap_or(&config.server.host);
    let port = global.port.as_deref().unwrap_or(&config.server.port);

    match global.api_token {
        Some(ref token) => ServerSettings::new(host, port, token),
        None => {
            let token = habdeck_config::resolve_api_token(&config.server);
            ServerSettings::new(host, port, token.expose_secret())
        }
    }
}

/// Like [`server_settings`], but a missing host is an error.
pub fn require_server(global: &GlobalOpts, config: &Config) -> Result<ServerSettings, CliError> {
    let settings = server_settings(global, config);
    if settings.is_configured() {
        Ok(settings)
    } else {
        Err(CliError::NoServer {
            path: config_path().display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["habdeck"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn flags_override_file() {
        let cli = parse(&["--host", "10.0.0.9", "--api-token", "flag-token", "items"]);
        let mut config = Config::default();
        config.server.host = "openhab.local".into();
        config.server.port = "8443".into();

        let settings = server_settings(&cli.global, &config);
        assert_eq!(settings.host, "10.0.0.9");
        assert_eq!(settings.port, "8443");
        assert_eq!(settings.api_token.expose_secret(), "flag-token");
    }

    #[test]
    fn missing_host_is_reported() {
        let cli = parse(&["--api-token", "", "items"]);
        let config = Config::default();
        assert!(matches!(
            require_server(&cli.global, &config),
            Err(CliError::NoServer { .. })
        ));
    }
}
