//! Config subcommand handlers.

use dialoguer::{Input, Password, Select};
use secrecy::SecretString;

use habdeck_config::{Config, save_config, store_api_token};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn redacted(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    if shown.server.api_token.is_some() {
        shown.server.api_token = Some(REDACTED.into());
    }
    shown
}

pub fn handle(args: ConfigArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let path = config::config_path();
            eprintln!("habdeck configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            let host: String = Input::new()
                .with_prompt("openHAB host")
                .default(cfg.server.host.clone())
                .allow_empty(false)
                .interact_text()
                .map_err(prompt_err)?;

            let port: String = Input::new()
                .with_prompt("openHAB HTTP port (empty for default)")
                .default(cfg.server.port.clone())
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;

            let token = Password::new()
                .with_prompt("API token (empty for anonymous access)")
                .allow_empty_password(true)
                .interact()
                .map_err(prompt_err)?;

            let mut new_cfg = cfg.clone();
            new_cfg.server.host = host;
            new_cfg.server.port = port;

            if !token.is_empty() {
                let store_choices = &[
                    "Store in system keyring (recommended)",
                    "Save to config file (plaintext)",
                ];
                let selection = Select::new()
                    .with_prompt("Where to store the API token?")
                    .items(store_choices)
                    .default(0)
                    .interact()
                    .map_err(prompt_err)?;

                if selection == 0 {
                    store_api_token(&SecretString::from(token))?;
                    new_cfg.server.api_token = None;
                    eprintln!("   ✓ API token stored in system keyring");
                } else {
                    new_cfg.server.api_token = Some(token);
                }
            }

            new_cfg.validate()?;
            let path = save_config(&new_cfg)?;
            eprintln!("\n✓ Configuration written to {}", path.display());
            eprintln!("\n  Test it: habdeck items");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let shown = redacted(cfg);
            let out = output::render_single(
                &global.output,
                &shown,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("<unprintable: {e}>")),
                |c| c.server.host.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken => {
            let token = Password::new()
                .with_prompt("API token")
                .interact()
                .map_err(prompt_err)?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "api_token".into(),
                    reason: "value cannot be empty".into(),
                });
            }

            store_api_token(&SecretString::from(token))?;
            eprintln!("✓ API token stored in system keyring");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_never_prints_the_token() {
        let mut cfg = Config::default();
        cfg.server.api_token = Some("oh.secret".into());

        let shown = redacted(&cfg);
        assert_eq!(shown.server.api_token.as_deref(), Some(REDACTED));

        let mut anonymous = Config::default();
        anonymous.server.api_token_env = Some("OPENHAB_TOKEN".into());
        assert_eq!(redacted(&anonymous), anonymous);
    }
}
