//! Discovery wire protocol.
//!
//! Probes are the literal bytes `discover`; replies are pipe-delimited text of the
//! form `<name>@<address>|<key>:<value>|...`.

pub mod advertisement;

pub use advertisement::{parse_advertisement, DeviceAdvertisement, MODEL_PROPERTY};

/// UDP port devices listen on for probes and reply from.
pub const DISCOVERY_PORT: u16 = 20054;

/// Payload of every discovery probe.
pub const PROBE_PAYLOAD: &[u8] = b"discover";

/// Whether a datagram is a discovery probe.
pub fn is_probe(data: &[u8]) -> bool {
    data == PROBE_PAYLOAD
}
