//! Table-formatted output for CLI.

use std::path::Path;

use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use printscan_core::config::DiscoveryConfig;
use printscan_core::net::NetworkAddress;
use printscan_core::registry::DeviceRecord;

use super::{format_properties, OutputFormatter};

pub struct TableOutput;

impl TableOutput {
    pub fn new() -> Self {
        Self
    }

    fn status_cell(status: Option<&String>) -> Cell {
        match status.map(String::as_str) {
            Some("IDLE") => Cell::new("IDLE").fg(Color::Green),
            Some(s @ ("PRINTING" | "RUNNING" | "BUSY")) => Cell::new(s).fg(Color::Yellow),
            Some(s @ ("ERROR" | "FAULT")) => Cell::new(s).fg(Color::Red),
            Some(s) => Cell::new(s),
            None => Cell::new("-"),
        }
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableOutput {
    fn format_devices(&self, devices: &[DeviceRecord]) -> String {
        if devices.is_empty() {
            return "No devices found.".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Name", "Address", "Model", "Status", "Interface", "Seen"]);

        for device in devices {
            table.add_row(vec![
                Cell::new(&device.name),
                Cell::new(&device.address),
                Cell::new(device.model().unwrap_or("-")),
                Self::status_cell(device.properties.get("status")),
                Cell::new(device.interface.to_string()),
                Cell::new(
                    device
                        .discovered_at
                        .with_timezone(&chrono::Local)
                        .format("%H:%M:%S")
                        .to_string(),
                ),
            ]);
        }

        format!("{}\n\nFound {} device(s)", table, devices.len())
    }

    fn format_new_device(&self, device: &DeviceRecord) -> String {
        format!(
            "{} {} {} {}",
            "+".green().bold(),
            device.name.bold(),
            format!("@ {}", device.address).cyan(),
            format_properties(device).dimmed()
        )
    }

    fn format_interfaces(&self, interfaces: &[NetworkAddress]) -> String {
        if interfaces.is_empty() {
            return "No usable IPv4 interfaces found.".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Interface", "IPv4 Address", "Broadcast"]);

        for iface in interfaces {
            table.add_row(vec![
                Cell::new(&iface.interface),
                Cell::new(iface.ip.to_string()),
                Cell::new(iface.broadcast.to_string()),
            ]);
        }

        table.to_string()
    }

    fn format_config(&self, config: &DiscoveryConfig, path: &Path) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Config file: {}", path.display().to_string().dimmed()));
        lines.push(format!("  Discovery port:   {}", config.discovery_port));
        lines.push(format!("  Probe interval:   {}s", config.probe_interval_secs));
        lines.push(format!("  Product identity: {}", config.product_identity.bold()));
        lines.push(format!("  Bind mode:        {}", config.bind_mode.as_str()));
        lines.push(format!("  Max datagram:     {} bytes", config.max_datagram_size));

        lines.join("\n")
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}
