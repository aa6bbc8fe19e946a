//! Discovery for the CLI.
//!
//! Wires core's scheduler and lifecycle controller to an in-memory registry, a
//! profile fixed to the configured product, and Ctrl+C as the shutdown signal.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use printscan_core::config::DiscoveryConfig;
use printscan_core::discovery::{
    DiscoveryScheduler, LifecycleController, LifecycleEvent, StaticProfile,
};
use printscan_core::net::{InterfaceSource, NetworkAddress, StaticInterfaces, SystemInterfaces};
use printscan_core::registry::{DeviceRecord, InMemoryRegistry};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::error::{CliError, DiscoveryError};

/// Discovery options
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub config: DiscoveryConfig,
    /// Restrict probing to these local addresses; empty means every interface
    pub bind: Vec<Ipv4Addr>,
    /// How long one-shot discovery listens for replies
    pub duration: Duration,
}

/// A running discovery engine and the registry it fills.
struct Engine {
    registry: Arc<InMemoryRegistry>,
    controller: Arc<LifecycleController>,
}

impl Engine {
    fn new(options: &DiscoveryOptions) -> Result<Self, CliError> {
        let interfaces = interface_source(&options.bind)?;
        let registry = Arc::new(InMemoryRegistry::new());
        let scheduler =
            DiscoveryScheduler::new(options.config.clone(), interfaces, registry.clone());

        // The CLI has no profile switching: the active profile is always the product.
        let profile = Arc::new(StaticProfile::new(Some(
            options.config.product_identity.clone(),
        )));
        let controller = Arc::new(LifecycleController::new(scheduler, profile));

        Ok(Self {
            registry,
            controller,
        })
    }

    fn scheduler(&self) -> &Arc<DiscoveryScheduler> {
        self.controller.scheduler()
    }
}

/// Every interface, or only the requested local addresses.
fn interface_source(bind: &[Ipv4Addr]) -> Result<Arc<dyn InterfaceSource>, CliError> {
    if bind.is_empty() {
        return Ok(Arc::new(SystemInterfaces));
    }

    let available = SystemInterfaces
        .enumerate()
        .map_err(DiscoveryError::Enumerate)?;
    let selected = select_interfaces(&available, bind)?;
    Ok(Arc::new(StaticInterfaces(selected)))
}

fn select_interfaces(
    available: &[NetworkAddress],
    bind: &[Ipv4Addr],
) -> Result<Vec<NetworkAddress>, CliError> {
    bind.iter()
        .map(|ip| {
            available
                .iter()
                .find(|a| a.ip == *ip)
                .cloned()
                .ok_or_else(|| {
                    CliError::InvalidArgument(format!(
                        "{} is not a usable local IPv4 address",
                        ip
                    ))
                })
        })
        .collect()
}

/// List the interfaces discovery would run on.
pub fn list_interfaces() -> Result<Vec<NetworkAddress>, CliError> {
    let interfaces = SystemInterfaces
        .enumerate()
        .map_err(DiscoveryError::Enumerate)?;
    Ok(interfaces)
}

/// Probe once, listen for `options.duration`, and return what was registered.
pub async fn discover_devices(options: DiscoveryOptions) -> Result<Vec<DeviceRecord>, CliError> {
    let engine = Engine::new(&options)?;

    engine.controller.on_profile_changed().await;
    engine.scheduler().trigger_immediate().await?;

    tokio::time::sleep(options.duration).await;
    engine.controller.on_shutdown().await;

    Ok(engine.registry.devices())
}

/// Discover continuously, calling `on_device` for each newly registered device,
/// until Ctrl+C.
pub async fn watch_devices<F>(options: DiscoveryOptions, mut on_device: F) -> Result<(), CliError>
where
    F: FnMut(&DeviceRecord),
{
    let engine = Engine::new(&options)?;
    let mut new_devices = engine.registry.subscribe();

    let (events, rx) = mpsc::channel(4);
    let lifecycle = {
        let controller = engine.controller.clone();
        tokio::spawn(async move { controller.run(rx).await })
    };

    let _ = events.send(LifecycleEvent::ProfileChanged).await;
    engine.scheduler().trigger_immediate().await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            record = new_devices.recv() => match record {
                Ok(record) => on_device(&record),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Display fell behind; {} device notification(s) skipped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    let _ = events.send(LifecycleEvent::ShuttingDown).await;
    lifecycle
        .await
        .map_err(|e| CliError::Other(format!("Discovery task failed: {}", e)))?;

    Ok(())
}
