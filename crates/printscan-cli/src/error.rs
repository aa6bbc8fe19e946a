//! Error types for the printscan CLI.
//!
//! CliError wraps CoreError from the shared library and adds CLI-specific variants.

use printscan_core::error::CoreError;
use thiserror::Error;

pub use printscan_core::error::{ConfigError, DiscoveryError};

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const NO_DEVICES: i32 = 3;
    pub const INVALID_ARGS: i32 = 4;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No devices found")]
    NoDevicesFound,

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e {
                CoreError::Discovery(_) => exit_codes::NETWORK_ERROR,
                CoreError::Config(ConfigError::Invalid(_)) => exit_codes::INVALID_ARGS,
                CoreError::Config(_) => exit_codes::GENERAL_ERROR,
            },
            CliError::Io(_) => exit_codes::NETWORK_ERROR,
            CliError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
            CliError::NoDevicesFound => exit_codes::NO_DEVICES,
            CliError::Other(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

// Conversions from core error subtypes to CliError
impl From<DiscoveryError> for CliError {
    fn from(e: DiscoveryError) -> Self {
        CliError::Core(CoreError::Discovery(e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Core(CoreError::Config(e))
    }
}
