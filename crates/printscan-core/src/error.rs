//! Error types for printscan core.

use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Reasons an inbound datagram could not be turned into an advertisement.
///
/// These never leave the receive path: a datagram that fails to parse is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("payload is not valid UTF-8")]
    InvalidEncoding,

    #[error("first segment is not of the form name@address")]
    MalformedHeader,
}

/// Socket and interface errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to enumerate network interfaces: {0}")]
    Enumerate(#[source] std::io::Error),

    #[error("Failed to bind discovery socket on {address}: {source}")]
    Bind {
        address: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send probe to {target}: {source}")]
    Send {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Channel on {0} is closed")]
    ChannelClosed(Ipv4Addr),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("No data directory available on this platform")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        assert_eq!(
            ParseError::InvalidEncoding.to_string(),
            "payload is not valid UTF-8"
        );
    }

    #[test]
    fn test_core_error_from_discovery_error() {
        let err: CoreError = DiscoveryError::ChannelClosed(Ipv4Addr::new(10, 0, 0, 2)).into();
        assert!(format!("{}", err).contains("Channel on 10.0.0.2 is closed"));
    }

    #[test]
    fn test_bind_error_mentions_address() {
        let err = DiscoveryError::Bind {
            address: Ipv4Addr::new(192, 168, 1, 20),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("192.168.1.20"));
    }

    #[test]
    fn test_config_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = ConfigError::from(json_err).into();
        assert!(matches!(err, CoreError::Config(ConfigError::Parse(_))));
    }
}
