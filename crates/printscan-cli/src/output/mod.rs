//! Output formatting for CLI results.

pub mod json;
pub mod table;

pub use json::JsonOutput;
pub use table::TableOutput;

use std::path::Path;

use printscan_core::config::DiscoveryConfig;
use printscan_core::net::NetworkAddress;
use printscan_core::registry::DeviceRecord;

/// Output formatter trait
pub trait OutputFormatter {
    /// Format device list
    fn format_devices(&self, devices: &[DeviceRecord]) -> String;

    /// Format a single newly discovered device (watch mode)
    fn format_new_device(&self, device: &DeviceRecord) -> String;

    /// Format the interfaces discovery would probe from
    fn format_interfaces(&self, interfaces: &[NetworkAddress]) -> String;

    /// Format the effective configuration and where it is stored
    fn format_config(&self, config: &DiscoveryConfig, path: &Path) -> String;

    /// Format a generic message
    fn format_message(&self, message: &str) -> String;
}

/// Get the appropriate formatter based on JSON flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput::new())
    } else {
        Box::new(TableOutput::new())
    }
}

/// Properties as `k=v` pairs in key order.
pub(crate) fn format_properties(device: &DeviceRecord) -> String {
    let mut pairs: Vec<(&String, &String)> = device.properties.iter().collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}
