//! Discovery engine: scheduling, lifecycle, and a device-side responder.

pub mod lifecycle;
pub mod responder;
pub mod scheduler;

pub use lifecycle::{LifecycleController, LifecycleEvent, ProfileSource, StaticProfile};
pub use responder::DeviceResponder;
pub use scheduler::{accept_advertisement, DiscoveryScheduler, RoundReport};
