//! JSON-formatted output for CLI.

use std::path::Path;

use printscan_core::config::DiscoveryConfig;
use printscan_core::net::NetworkAddress;
use printscan_core::registry::DeviceRecord;
use serde::Serialize;
use serde_json::json;

use super::OutputFormatter;

pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }

    fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn format_devices(&self, devices: &[DeviceRecord]) -> String {
        let output = json!({
            "devices": devices,
            "count": devices.len()
        });
        Self::to_json(&output)
    }

    fn format_new_device(&self, device: &DeviceRecord) -> String {
        // One object per line so watch output can be consumed as NDJSON.
        serde_json::to_string(device).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_interfaces(&self, interfaces: &[NetworkAddress]) -> String {
        Self::to_json(&json!({
            "interfaces": interfaces,
            "count": interfaces.len()
        }))
    }

    fn format_config(&self, config: &DiscoveryConfig, path: &Path) -> String {
        Self::to_json(&json!({
            "path": path.display().to_string(),
            "config": config
        }))
    }

    fn format_message(&self, message: &str) -> String {
        Self::to_json(&json!({ "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    fn device() -> DeviceRecord {
        DeviceRecord {
            device_id: "Device J1@172.18.0.2".to_string(),
            name: "Device J1".to_string(),
            address: "172.18.0.2".to_string(),
            properties: HashMap::from([("model".to_string(), "J1".to_string())]),
            interface: Ipv4Addr::new(172, 18, 0, 1),
            discovered_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_format_devices() {
        let output = JsonOutput::new().format_devices(&[device()]);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["count"], 1);
        assert_eq!(value["devices"][0]["deviceId"], "Device J1@172.18.0.2");
        assert_eq!(value["devices"][0]["properties"]["model"], "J1");
        assert_eq!(value["devices"][0]["interface"], "172.18.0.1");
    }

    #[test]
    fn test_new_device_is_single_line() {
        let output = JsonOutput::new().format_new_device(&device());
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_format_config() {
        let output = JsonOutput::new()
            .format_config(&DiscoveryConfig::default(), Path::new("/tmp/config.json"));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["config"]["discoveryPort"], 20054);
        assert_eq!(value["config"]["bindMode"], "auto");
    }
}
