//! Simulate command: answer discovery probes as a fake device.

use std::collections::HashMap;
use std::net::SocketAddr;

use colored::*;
use printscan_core::config::DiscoveryConfig;
use printscan_core::discovery::DeviceResponder;
use printscan_core::protocol::{DeviceAdvertisement, MODEL_PROPERTY};

use crate::cli::SimulateArgs;
use crate::error::CliError;
use crate::output::get_formatter;

/// Run the simulate command until Ctrl+C
pub async fn run_simulate(
    args: SimulateArgs,
    config: DiscoveryConfig,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let advertisement = build_advertisement(&args, &config.product_identity);

    let listen = SocketAddr::from((args.listen, config.discovery_port));
    let responder = DeviceResponder::bind(listen, &advertisement)?;

    if !json {
        println!(
            "Simulating {} on {} (press Ctrl+C to stop)",
            advertisement.device_id.bold(),
            responder.local_addr()?
        );
        println!("{}", advertisement.to_wire().dimmed());
    }

    tokio::select! {
        result = responder.run() => result?,
        _ = tokio::signal::ctrl_c() => {}
    }

    println!("{}", formatter.format_message("Simulator stopped."));
    Ok(())
}

/// `model` defaults to the configured product; `--prop model=...` replaces it.
fn build_advertisement(args: &SimulateArgs, product_identity: &str) -> DeviceAdvertisement {
    let mut properties: HashMap<String, String> = HashMap::new();
    properties.insert(MODEL_PROPERTY.to_string(), product_identity.to_string());
    properties.extend(args.properties.iter().cloned());

    DeviceAdvertisement::new(args.name.clone(), args.address.to_string(), properties)
}
