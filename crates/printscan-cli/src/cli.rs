//! CLI argument definitions using clap.

use std::net::Ipv4Addr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use printscan_core::config::BindMode;

/// printscan - find networked printers by UDP broadcast discovery
#[derive(Parser, Debug)]
#[command(name = "printscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the discovery port for this run
    #[arg(long, global = true, env = "PRINTSCAN_PORT")]
    pub port: Option<u16>,

    /// Override the product identity (required `model` value) for this run
    #[arg(long, global = true, env = "PRINTSCAN_MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover devices on the network
    Discover(DiscoverArgs),

    /// List the local interfaces discovery would use
    Interfaces,

    /// Show or change the saved discovery configuration
    Config(ConfigArgs),

    /// Pretend to be a device and answer discovery probes
    Simulate(SimulateArgs),
}

// ==================== Discover ====================

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Watch mode - keep discovering until Ctrl+C
    #[arg(short, long)]
    pub watch: bool,

    /// Discovery duration in seconds (ignored in watch mode)
    #[arg(short, long, default_value = "5")]
    pub duration: u64,

    /// Only show devices whose name matches this pattern (`*` and `?` wildcards)
    #[arg(long)]
    pub name: Option<String>,

    /// Probe only from these local addresses instead of every interface
    #[arg(long, value_delimiter = ',')]
    pub bind: Vec<Ipv4Addr>,
}

// ==================== Config ====================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Print the path of the configuration file
    Path,

    /// Update saved settings
    Set(ConfigSetArgs),

    /// Delete the saved configuration and fall back to defaults
    Reset,
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Discovery port
    #[arg(long = "discovery-port")]
    pub discovery_port: Option<u16>,

    /// Required `model` value
    #[arg(long = "product")]
    pub product_identity: Option<String>,

    /// Seconds between probe rounds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Local port selection for discovery sockets
    #[arg(long, value_enum)]
    pub bind_mode: Option<BindModeArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BindModeArg {
    Auto,
    Explicit,
    Ephemeral,
}

impl From<BindModeArg> for BindMode {
    fn from(arg: BindModeArg) -> Self {
        match arg {
            BindModeArg::Auto => BindMode::Auto,
            BindModeArg::Explicit => BindMode::Explicit,
            BindModeArg::Ephemeral => BindMode::Ephemeral,
        }
    }
}

// ==================== Simulate ====================

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Device name to advertise
    #[arg(long, default_value = "Simulated J1")]
    pub name: String,

    /// Address to advertise (the device's own IP)
    #[arg(long)]
    pub address: Ipv4Addr,

    /// Local address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub listen: Ipv4Addr,

    /// Extra properties as key=value (repeatable)
    #[arg(long = "prop", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() || key.contains(['|', ':']) {
        return Err(format!("invalid property key '{}'", key));
    }
    if value.contains('|') {
        return Err(format!("property value for '{}' cannot contain '|'", key));
    }
    Ok((key.to_string(), value.to_string()))
}
