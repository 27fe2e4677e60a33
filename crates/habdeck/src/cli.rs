//! Clap derive structures for the `habdeck` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// habdeck -- openHAB items on a Stream Deck, and from the shell
#[derive(Debug, Parser)]
#[command(
    name = "habdeck",
    version,
    about = "Bridge openHAB items to a Stream Deck control surface",
    long_about = "Reads and commands openHAB items from the command line, streams\n\
        live state changes, and runs the control-surface bridge over a\n\
        line-delimited JSON protocol on stdin/stdout.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// openHAB host name or IP (overrides config)
    #[arg(long, env = "HABDECK_HOST", global = true)]
    pub host: Option<String>,

    /// openHAB HTTP port; empty for the scheme default
    #[arg(long, env = "HABDECK_PORT", global = true)]
    pub port: Option<String>,

    /// openHAB API token
    #[arg(long, env = "HABDECK_API_TOKEN", global = true, hide_env_values = true)]
    pub api_token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HABDECK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Write logs to this file (rotated daily) instead of stderr
    #[arg(long, env = "HABDECK_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List item names known to the server
    #[command(alias = "ls")]
    Items(ItemsArgs),

    /// Show an item's current state
    State(StateArgs),

    /// Send a command to an item
    Send(SendArgs),

    /// Stream item state changes until interrupted
    Watch(WatchArgs),

    /// Run the control-surface bridge on stdin/stdout
    Bridge,

    /// Manage configuration and the stored API token
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Item commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ItemsArgs {
    /// Drop the cached item list before fetching
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct StateArgs {
    /// Item name
    pub item: String,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Item name
    pub item: String,

    /// Command value, e.g. ON, OFF, 40, UP
    pub value: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only show these items (default: all)
    pub items: Vec<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Show the effective configuration (token redacted)
    Show,

    /// Print the config file location
    Path,

    /// Store the API token in the system keyring
    SetToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
