//! Hand-off of discovered devices to the device registry.
//!
//! The registry itself belongs to the host application; this module only needs
//! lookup-by-id and insert from it. [`InMemoryRegistry`] is a ready-made
//! implementation for hosts without their own store.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::protocol::{DeviceAdvertisement, MODEL_PROPERTY};

/// Capacity of the new-device notification channel.
const EVENT_CAPACITY: usize = 64;

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Registry key, `name@address`
    pub device_id: String,
    pub name: String,
    /// Address the device reported for itself
    pub address: String,
    pub properties: HashMap<String, String>,
    /// Local address of the interface the advertisement arrived on
    pub interface: Ipv4Addr,
    pub discovered_at: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn from_advertisement(adv: &DeviceAdvertisement, interface: Ipv4Addr) -> Self {
        Self {
            device_id: adv.device_id.clone(),
            name: adv.name.clone(),
            address: adv.address.clone(),
            properties: adv.properties.clone(),
            interface,
            discovered_at: Utc::now(),
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.properties.get(MODEL_PROPERTY).map(String::as_str)
    }
}

/// Keyed store of discovered devices, owned by the host application.
pub trait DeviceRegistry: Send + Sync {
    fn lookup(&self, device_id: &str) -> Option<DeviceRecord>;

    fn insert(&self, record: DeviceRecord);
}

/// Process-local registry.
///
/// Inserting an id that is already present keeps the existing record.
pub struct InMemoryRegistry {
    devices: RwLock<HashMap<String, DeviceRecord>>,
    events: broadcast::Sender<DeviceRecord>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            devices: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// All devices, sorted by id.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<DeviceRecord> = devices.values().cloned().collect();
        list.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        list
    }

    pub fn len(&self) -> usize {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive every record inserted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceRecord> {
        self.events.subscribe()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry for InMemoryRegistry {
    fn lookup(&self, device_id: &str) -> Option<DeviceRecord> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .cloned()
    }

    fn insert(&self, record: DeviceRecord) {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        if devices.contains_key(&record.device_id) {
            return;
        }
        devices.insert(record.device_id.clone(), record.clone());
        drop(devices);

        // No subscribers is fine.
        let _ = self.events.send(record);
    }
}

/// The only write path from discovery into the registry.
pub struct RegistryBridge {
    registry: Arc<dyn DeviceRegistry>,
    write_lock: Mutex<()>,
}

impl RegistryBridge {
    pub fn new(registry: Arc<dyn DeviceRegistry>) -> Self {
        Self {
            registry,
            write_lock: Mutex::new(()),
        }
    }

    /// Insert the advertised device unless its id is already registered.
    ///
    /// Returns whether a new record was created. A known device is never
    /// replaced, even if its address or properties changed.
    pub fn register(&self, adv: &DeviceAdvertisement, interface: Ipv4Addr) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.registry.lookup(&adv.device_id).is_some() {
            return false;
        }

        info!(
            "Discovered {} device: {}@{} via {}",
            adv.model().unwrap_or("unknown"),
            adv.name,
            adv.address,
            interface
        );
        self.registry
            .insert(DeviceRecord::from_advertisement(adv, interface));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_advertisement;

    const IFACE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);

    fn bridge() -> (RegistryBridge, Arc<InMemoryRegistry>) {
        let registry = Arc::new(InMemoryRegistry::new());
        (RegistryBridge::new(registry.clone()), registry)
    }

    #[test]
    fn test_register_new_device() {
        let (bridge, registry) = bridge();
        let adv = parse_advertisement(b"Device J1@172.18.0.2|model:J1|status:IDLE").unwrap();

        assert!(bridge.register(&adv, IFACE));

        let record = registry.lookup("Device J1@172.18.0.2").unwrap();
        assert_eq!(record.name, "Device J1");
        assert_eq!(record.address, "172.18.0.2");
        assert_eq!(record.properties["status"], "IDLE");
        assert_eq!(record.interface, IFACE);
        assert_eq!(record.model(), Some("J1"));
    }

    #[test]
    fn test_record_model_matches_advertisement() {
        let adv = parse_advertisement(b"X@1.2.3.4|status:IDLE|model:A350").unwrap();
        let record = DeviceRecord::from_advertisement(&adv, IFACE);

        assert_eq!(record.model(), adv.model());
        assert_eq!(record.model(), Some("A350"));
    }

    #[test]
    fn test_register_is_idempotent_first_wins() {
        let (bridge, registry) = bridge();
        let first = parse_advertisement(b"X@1.2.3.4|model:J1|status:IDLE").unwrap();
        let second = parse_advertisement(b"X@1.2.3.4|model:J1|status:PRINTING|extra:1").unwrap();

        assert!(bridge.register(&first, IFACE));
        let stored = registry.lookup("X@1.2.3.4").unwrap();

        assert!(!bridge.register(&second, Ipv4Addr::new(10, 0, 0, 1)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("X@1.2.3.4").unwrap(), stored);
        assert_eq!(stored.properties["status"], "IDLE");
    }

    #[test]
    fn test_in_memory_insert_keeps_existing() {
        let registry = InMemoryRegistry::new();
        let adv = parse_advertisement(b"X@1.2.3.4|model:J1").unwrap();
        let original = DeviceRecord::from_advertisement(&adv, IFACE);
        let mut replacement = original.clone();
        replacement.name = "other".to_string();

        registry.insert(original.clone());
        registry.insert(replacement);

        assert_eq!(registry.devices(), vec![original]);
    }

    #[test]
    fn test_devices_sorted_by_id() {
        let (bridge, registry) = bridge();
        for raw in ["b@10.0.0.2|model:J1", "a@10.0.0.3|model:J1", "c@10.0.0.1|model:J1"] {
            bridge.register(&parse_advertisement(raw.as_bytes()).unwrap(), IFACE);
        }

        let ids: Vec<String> = registry.devices().into_iter().map(|d| d.device_id).collect();
        assert_eq!(ids, vec!["a@10.0.0.3", "b@10.0.0.2", "c@10.0.0.1"]);
    }

    #[tokio::test]
    async fn test_subscribe_sees_only_new_devices() {
        let (bridge, registry) = bridge();
        let mut events = registry.subscribe();
        let adv = parse_advertisement(b"X@1.2.3.4|model:J1").unwrap();

        bridge.register(&adv, IFACE);
        bridge.register(&adv, IFACE);

        let record = events.recv().await.unwrap();
        assert_eq!(record.device_id, "X@1.2.3.4");
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_registration_creates_one_record() {
        let (bridge, registry) = bridge();
        let bridge = Arc::new(bridge);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let bridge = bridge.clone();
                std::thread::spawn(move || {
                    let raw = format!("X@1.2.3.4|model:J1|seq:{}", i);
                    let adv = parse_advertisement(raw.as_bytes()).unwrap();
                    bridge.register(&adv, IFACE)
                })
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|created| *created)
            .count();

        assert_eq!(created, 1);
        assert_eq!(registry.len(), 1);
    }
}
