//! Config command implementation and config loading for the other commands.

use printscan_core::config::{ConfigStore, DiscoveryConfig};
use tracing::warn;

use crate::cli::{ConfigArgs, ConfigCommands, ConfigSetArgs};
use crate::error::CliError;
use crate::output::get_formatter;

/// Saved configuration with per-invocation overrides applied.
///
/// Falls back to defaults when the platform has no config directory.
pub async fn load_config(
    port: Option<u16>,
    model: Option<String>,
) -> Result<DiscoveryConfig, CliError> {
    let mut config = match ConfigStore::open_default() {
        Ok(store) => store.load().await?,
        Err(e) => {
            warn!("Using default configuration: {}", e);
            DiscoveryConfig::default()
        }
    };

    if let Some(port) = port {
        config.discovery_port = port;
    }
    if let Some(model) = model {
        config.product_identity = model;
    }
    config.validate()?;

    Ok(config)
}

/// Run the config command
pub async fn run_config(
    args: ConfigArgs,
    port: Option<u16>,
    model: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let store = ConfigStore::open_default()?;

    match args.command {
        ConfigCommands::Show => {
            let config = load_config(port, model).await?;
            println!("{}", formatter.format_config(&config, store.path()));
        }
        ConfigCommands::Path => {
            println!("{}", store.path().display());
        }
        ConfigCommands::Set(set) => {
            let mut config = store.load().await?;
            apply_settings(&mut config, set)?;
            store.save(&config).await?;
            println!("{}", formatter.format_config(&config, store.path()));
        }
        ConfigCommands::Reset => {
            store.reset().await?;
            println!(
                "{}",
                formatter.format_message("Configuration reset to defaults.")
            );
        }
    }

    Ok(())
}

fn apply_settings(config: &mut DiscoveryConfig, set: ConfigSetArgs) -> Result<(), CliError> {
    if set.discovery_port.is_none()
        && set.product_identity.is_none()
        && set.interval.is_none()
        && set.bind_mode.is_none()
    {
        return Err(CliError::InvalidArgument(
            "nothing to set; pass at least one option".to_string(),
        ));
    }

    if let Some(port) = set.discovery_port {
        config.discovery_port = port;
    }
    if let Some(product) = set.product_identity {
        config.product_identity = product;
    }
    if let Some(interval) = set.interval {
        config.probe_interval_secs = interval;
    }
    if let Some(mode) = set.bind_mode {
        config.bind_mode = mode.into();
    }

    Ok(())
}
