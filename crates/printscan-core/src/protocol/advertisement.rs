//! Device advertisement parsing and rendering.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

const SEGMENT_SEPARATOR: char = '|';
const IDENTITY_SEPARATOR: char = '@';
const PROPERTY_SEPARATOR: char = ':';

/// Property carrying the product model of the advertising device.
pub const MODEL_PROPERTY: &str = "model";

/// A parsed reply to a discovery probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAdvertisement {
    /// Full identity segment, `name@address`
    pub device_id: String,
    /// Device name (left of `@`)
    pub name: String,
    /// Address as reported by the device (right of `@`)
    pub address: String,
    /// Remaining `key:value` segments
    pub properties: HashMap<String, String>,
}

impl DeviceAdvertisement {
    /// Build an advertisement from its parts. The id is derived from name and address.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        properties: HashMap<String, String>,
    ) -> Self {
        let name = name.into();
        let address = address.into();
        Self {
            device_id: format!("{}{}{}", name, IDENTITY_SEPARATOR, address),
            name,
            address,
            properties,
        }
    }

    /// The `model` property, if the device reported one.
    pub fn model(&self) -> Option<&str> {
        self.properties.get(MODEL_PROPERTY).map(String::as_str)
    }

    /// Whether the advertised model is exactly `product_identity`.
    pub fn matches_model(&self, product_identity: &str) -> bool {
        self.model() == Some(product_identity)
    }

    /// Render in wire format. Properties are emitted in key order.
    pub fn to_wire(&self) -> String {
        let mut keys: Vec<&String> = self.properties.keys().collect();
        keys.sort();

        let mut out = self.device_id.clone();
        for key in keys {
            out.push(SEGMENT_SEPARATOR);
            out.push_str(key);
            out.push(PROPERTY_SEPARATOR);
            out.push_str(&self.properties[key]);
        }
        out
    }
}

/// Parse a raw reply datagram.
///
/// Segments after the first that lack a `:` are skipped. A key seen twice keeps
/// its last value.
pub fn parse_advertisement(data: &[u8]) -> Result<DeviceAdvertisement, ParseError> {
    let msg = std::str::from_utf8(data).map_err(|_| ParseError::InvalidEncoding)?;

    let mut segments = msg.split(SEGMENT_SEPARATOR);
    let device_id = segments.next().unwrap_or_default();

    let (name, address) = device_id
        .split_once(IDENTITY_SEPARATOR)
        .ok_or(ParseError::MalformedHeader)?;
    if address.contains(IDENTITY_SEPARATOR) {
        return Err(ParseError::MalformedHeader);
    }

    let properties = segments
        .filter_map(|segment| segment.split_once(PROPERTY_SEPARATOR))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    Ok(DeviceAdvertisement {
        device_id: device_id.to_string(),
        name: name.to_string(),
        address: address.to_string(),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_advertisement() {
        let adv = parse_advertisement(b"Device J1@172.18.0.2|model:J1|status:IDLE").unwrap();

        assert_eq!(adv.device_id, "Device J1@172.18.0.2");
        assert_eq!(adv.name, "Device J1");
        assert_eq!(adv.address, "172.18.0.2");
        assert_eq!(adv.properties.len(), 2);
        assert_eq!(adv.properties["model"], "J1");
        assert_eq!(adv.properties["status"], "IDLE");
    }

    #[test]
    fn test_parse_header_only() {
        let adv = parse_advertisement(b"printer@10.0.0.7").unwrap();
        assert_eq!(adv.name, "printer");
        assert_eq!(adv.address, "10.0.0.7");
        assert!(adv.properties.is_empty());
        assert_eq!(adv.model(), None);
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let inputs: [&[u8]; 3] = [
            &[0xff, 0xfe, 0xfd],
            b"name@1.2.3.4|model:\xc3\x28",
            &[b'a', b'@', 0x80],
        ];
        for input in inputs {
            assert_eq!(
                parse_advertisement(input),
                Err(ParseError::InvalidEncoding),
                "input: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_missing_identity_separator() {
        for input in ["", "discover", "no-at-sign|model:J1", "|name@1.2.3.4", "model:J1|x@y"] {
            assert_eq!(
                parse_advertisement(input.as_bytes()),
                Err(ParseError::MalformedHeader),
                "input: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_rejects_double_identity_separator() {
        assert_eq!(
            parse_advertisement(b"a@b@1.2.3.4|model:J1"),
            Err(ParseError::MalformedHeader)
        );
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let adv = parse_advertisement(b"X@1.2.3.4|model:J1|model:J2").unwrap();
        assert_eq!(adv.properties.len(), 1);
        assert_eq!(adv.properties["model"], "J2");
    }

    #[test]
    fn test_segments_without_colon_ignored() {
        let adv = parse_advertisement(b"X@1.2.3.4|model:J1|garbage").unwrap();
        let expected: HashMap<String, String> =
            [("model".to_string(), "J1".to_string())].into_iter().collect();
        assert_eq!(adv.properties, expected);
    }

    #[test]
    fn test_value_split_on_first_colon() {
        let adv = parse_advertisement(b"X@1.2.3.4|url:http://1.2.3.4:8080|empty:").unwrap();
        assert_eq!(adv.properties["url"], "http://1.2.3.4:8080");
        assert_eq!(adv.properties["empty"], "");
    }

    #[test]
    fn test_matches_model() {
        let adv = parse_advertisement(b"X@1.2.3.4|model:J1").unwrap();
        assert!(adv.matches_model("J1"));
        assert!(!adv.matches_model("j1"));

        let no_model = parse_advertisement(b"X@1.2.3.4|status:IDLE").unwrap();
        assert!(!no_model.matches_model("J1"));
    }

    #[test]
    fn test_to_wire_sorts_properties() {
        let props = [
            ("status".to_string(), "IDLE".to_string()),
            ("model".to_string(), "J1".to_string()),
        ]
        .into_iter()
        .collect();
        let adv = DeviceAdvertisement::new("Device J1", "172.18.0.2", props);

        assert_eq!(adv.device_id, "Device J1@172.18.0.2");
        assert_eq!(adv.to_wire(), "Device J1@172.18.0.2|model:J1|status:IDLE");
        assert_eq!(parse_advertisement(adv.to_wire().as_bytes()).unwrap(), adv);
    }
}
