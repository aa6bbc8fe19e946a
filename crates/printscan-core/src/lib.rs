//! printscan core library.
//!
//! Finds networked printers by broadcasting a discovery probe on every local IPv4
//! interface, parsing the replies, and registering the devices whose model matches
//! the configured product identity.

pub mod config;
pub mod discovery;
pub mod error;
pub mod net;
pub mod protocol;
pub mod registry;

pub use config::{BindMode, ConfigStore, DiscoveryConfig};
pub use discovery::{DiscoveryScheduler, LifecycleController, LifecycleEvent};
pub use error::{CoreError, DiscoveryError, ParseError, Result};
pub use registry::{DeviceRecord, DeviceRegistry, InMemoryRegistry};
