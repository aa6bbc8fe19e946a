//! Discover command implementation.

use std::io::{self, Write};
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use printscan_core::config::DiscoveryConfig;
use printscan_core::registry::DeviceRecord;
use regex::Regex;

use crate::cli::DiscoverArgs;
use crate::device::discovery::{discover_devices, watch_devices, DiscoveryOptions};
use crate::error::CliError;
use crate::output::{get_formatter, OutputFormatter};

/// Run the discover command
pub async fn run_discover(
    args: DiscoverArgs,
    config: DiscoveryConfig,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let name_filter = args.name.as_deref().map(name_pattern).transpose()?;

    let options = DiscoveryOptions {
        config,
        bind: args.bind,
        duration: Duration::from_secs(args.duration),
    };

    if args.watch {
        run_watch_mode(options, name_filter, formatter.as_ref(), json).await
    } else {
        run_oneshot_mode(options, name_filter, formatter.as_ref(), json).await
    }
}

async fn run_oneshot_mode(
    options: DiscoveryOptions,
    name_filter: Option<Regex>,
    formatter: &dyn OutputFormatter,
    json: bool,
) -> Result<(), CliError> {
    let spinner = if json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "Discovering {} devices for {} seconds...",
            options.config.product_identity,
            options.duration.as_secs()
        ));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };

    let result = discover_devices(options).await;
    spinner.finish_and_clear();

    let devices = filter_devices(result?, name_filter.as_ref());
    println!("{}", formatter.format_devices(&devices));

    if devices.is_empty() {
        return Err(CliError::NoDevicesFound);
    }

    Ok(())
}

async fn run_watch_mode(
    options: DiscoveryOptions,
    name_filter: Option<Regex>,
    formatter: &dyn OutputFormatter,
    json: bool,
) -> Result<(), CliError> {
    if !json {
        println!(
            "Watching for {} devices every {}s (press Ctrl+C to stop)...\n",
            options.config.product_identity.bold(),
            options.config.probe_interval_secs
        );
    }

    let mut shown = 0usize;
    watch_devices(options, |device| {
        if !name_matches(device, name_filter.as_ref()) {
            return;
        }
        shown += 1;
        println!("{}", formatter.format_new_device(device));
        io::stdout().flush().ok();
    })
    .await?;

    if !json {
        println!("\n{}", format!("Saw {} device(s)", shown).dimmed());
    }

    Ok(())
}

/// Compile a `*`/`?` wildcard pattern into an anchored regex.
fn name_pattern(pattern: &str) -> Result<Regex, CliError> {
    let regex_pattern = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{}$", regex_pattern))
        .map_err(|e| CliError::InvalidArgument(format!("invalid name pattern: {}", e)))
}

fn name_matches(device: &DeviceRecord, filter: Option<&Regex>) -> bool {
    filter.map_or(true, |re| re.is_match(&device.name))
}

fn filter_devices(devices: Vec<DeviceRecord>, filter: Option<&Regex>) -> Vec<DeviceRecord> {
    devices
        .into_iter()
        .filter(|d| name_matches(d, filter))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    fn record(name: &str) -> DeviceRecord {
        DeviceRecord {
            device_id: format!("{}@10.0.0.9", name),
            name: name.to_string(),
            address: "10.0.0.9".to_string(),
            properties: HashMap::from([("model".to_string(), "J1".to_string())]),
            interface: Ipv4Addr::new(10, 0, 0, 1),
            discovered_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_name_pattern_wildcards() {
        let re = name_pattern("Lab-*").unwrap();
        assert!(re.is_match("Lab-J1"));
        assert!(re.is_match("Lab-"));
        assert!(!re.is_match("Office Lab-J1"));

        let re = name_pattern("J?").unwrap();
        assert!(re.is_match("J1"));
        assert!(!re.is_match("J10"));
    }

    #[test]
    fn test_name_pattern_escapes_regex_syntax() {
        let re = name_pattern("Printer (A).*").unwrap();
        assert!(re.is_match("Printer (A).local"));
        assert!(!re.is_match("Printer A.local"));
    }

    #[test]
    fn test_filter_devices() {
        let devices = vec![record("Lab-J1"), record("Office J1"), record("Lab-J2")];

        let re = name_pattern("Lab-*").unwrap();
        let filtered = filter_devices(devices.clone(), Some(&re));
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|d| d.name.starts_with("Lab-")));

        assert_eq!(filter_devices(devices, None).len(), 3);
    }
}
