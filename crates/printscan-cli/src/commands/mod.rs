//! Command implementations.

pub mod config;
pub mod discover;
pub mod interfaces;
pub mod simulate;

pub use config::{load_config, run_config};
pub use discover::run_discover;
pub use interfaces::run_interfaces;
pub use simulate::run_simulate;
