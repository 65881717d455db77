//! Clap derive structures for the `keemple` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// keemple -- control Keemple smart-home devices from the command line
#[derive(Debug, Parser)]
#[command(
    name = "keemple",
    version,
    about = "Control Keemple smart-home devices from the command line",
    long_about = "Talks to the Keemple cloud: lists switches, blinds and heaters,\n\
        sends commands, and watches device state as it changes.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "KEEMPLE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Account phone number or e-mail (overrides profile)
    #[arg(long, short = 'a', env = "KEEMPLE_ACCOUNT", global = true, hide_env = true)]
    pub account: Option<String>,

    /// Country dialing code (overrides profile)
    #[arg(long, env = "KEEMPLE_COUNTRY_CODE", global = true, hide_env = true)]
    pub country_code: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, env = "KEEMPLE_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "KEEMPLE_OUTPUT",
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

    /// Skip TLS certificate verification
    #[arg(long, short = 'k', env = "KEEMPLE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "KEEMPLE_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
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
    /// Check that the configured credentials can log in
    Login,

    /// List and inspect devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Turn switches on or off
    #[command(alias = "sw")]
    Switch(SwitchArgs),

    /// Move blinds
    #[command(alias = "blind")]
    Cover(CoverArgs),

    /// Control heaters
    #[command(alias = "heater")]
    Climate(ClimateArgs),

    /// Poll the account and print state changes as they happen
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindFilter {
    Switch,
    Blind,
    Thermostat,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices with their current state
    #[command(alias = "ls")]
    List {
        /// Only devices of this kind
        #[arg(long)]
        kind: Option<KindFilter>,

        /// Only devices in this room ("Unassigned" for none)
        #[arg(long, short = 'r')]
        room: Option<String>,
    },

    /// Show one device as a host entity
    Get {
        /// Device id (e.g. 101 or 102_1), unique id, or name
        device: String,
    },

    /// List rooms and the devices in them
    Rooms,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SWITCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SwitchArgs {
    #[command(subcommand)]
    pub command: SwitchCommand,
}

#[derive(Debug, Subcommand)]
pub enum SwitchCommand {
    /// Turn a switch (or one channel) on
    On {
        /// Device id, unique id, or name
        device: String,
    },

    /// Turn a switch (or one channel) off
    Off {
        /// Device id, unique id, or name
        device: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COVER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CoverArgs {
    #[command(subcommand)]
    pub command: CoverCommand,
}

#[derive(Debug, Subcommand)]
pub enum CoverCommand {
    /// Open a blind fully
    Open {
        /// Device id, unique id, or name
        device: String,
    },

    /// Close a blind fully
    Close {
        /// Device id, unique id, or name
        device: String,
    },

    /// Stop a moving blind
    Stop {
        /// Device id, unique id, or name
        device: String,
    },

    /// Move a blind to a position
    Set {
        /// Device id, unique id, or name
        device: String,

        /// Position, 0 (closed) to 100 (open)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        position: u8,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CLIMATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ClimateArgs {
    #[command(subcommand)]
    pub command: ClimateCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Off,
    Heat,
}

#[derive(Debug, Subcommand)]
pub enum ClimateCommand {
    /// Set the target temperature (5-35 °C, 0.5 steps)
    #[command(alias = "temp")]
    SetTemp {
        /// Device id, unique id, or name
        device: String,

        /// Target temperature in °C
        temperature: f64,
    },

    /// Switch a heater on (heat) or off
    Mode {
        /// Device id, unique id, or name
        device: String,

        /// Operating mode
        mode: ModeArg,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (account, country_code, base_url, timeout, ...)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
