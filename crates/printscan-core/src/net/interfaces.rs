//! Local IPv4 interface enumeration.

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

use serde::Serialize;

/// A local IPv4 address and the broadcast address of its subnet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NetworkAddress {
    /// Interface name as reported by the OS
    pub interface: String,
    pub ip: Ipv4Addr,
    pub broadcast: Ipv4Addr,
}

impl NetworkAddress {
    pub fn new(interface: impl Into<String>, ip: Ipv4Addr, broadcast: Ipv4Addr) -> Self {
        Self {
            interface: interface.into(),
            ip,
            broadcast,
        }
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, broadcast {})", self.ip, self.interface, self.broadcast)
    }
}

/// One address entry of one interface, before filtering.
#[derive(Debug, Clone)]
pub struct AddressEntry {
    pub interface: String,
    pub ip: IpAddr,
    pub netmask: IpAddr,
    pub broadcast: Option<IpAddr>,
}

impl From<if_addrs::Interface> for AddressEntry {
    fn from(iface: if_addrs::Interface) -> Self {
        let (ip, netmask, broadcast) = match iface.addr {
            if_addrs::IfAddr::V4(v4) => (
                IpAddr::V4(v4.ip),
                IpAddr::V4(v4.netmask),
                v4.broadcast.map(IpAddr::V4),
            ),
            if_addrs::IfAddr::V6(v6) => (
                IpAddr::V6(v6.ip),
                IpAddr::V6(v6.netmask),
                v6.broadcast.map(IpAddr::V6),
            ),
        };
        Self {
            interface: iface.name,
            ip,
            netmask,
            broadcast,
        }
    }
}

/// Source of the local addresses discovery should run on.
pub trait InterfaceSource: Send + Sync {
    /// Snapshot of the qualifying addresses at call time.
    fn enumerate(&self) -> io::Result<Vec<NetworkAddress>>;
}

/// Enumerates the host's interfaces through the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn enumerate(&self) -> io::Result<Vec<NetworkAddress>> {
        let entries = if_addrs::get_if_addrs()?
            .into_iter()
            .map(AddressEntry::from);
        Ok(qualifying_addresses(entries))
    }
}

/// A fixed address list, used when the caller pins discovery to known interfaces.
#[derive(Debug, Default, Clone)]
pub struct StaticInterfaces(pub Vec<NetworkAddress>);

impl InterfaceSource for StaticInterfaces {
    fn enumerate(&self) -> io::Result<Vec<NetworkAddress>> {
        Ok(self.0.clone())
    }
}

/// Keep non-loopback IPv4 entries, one per distinct IP, in enumeration order.
pub fn qualifying_addresses<I>(entries: I) -> Vec<NetworkAddress>
where
    I: IntoIterator<Item = AddressEntry>,
{
    let mut seen = HashSet::new();
    let mut addresses = Vec::new();

    for entry in entries {
        let (ip, netmask) = match (entry.ip, entry.netmask) {
            (IpAddr::V4(ip), IpAddr::V4(netmask)) => (ip, netmask),
            _ => continue,
        };
        if ip.is_loopback() || !seen.insert(ip) {
            continue;
        }

        let broadcast = match entry.broadcast {
            Some(IpAddr::V4(broadcast)) => broadcast,
            _ => subnet_broadcast(ip, netmask),
        };

        addresses.push(NetworkAddress {
            interface: entry.interface,
            ip,
            broadcast,
        });
    }

    addresses
}

/// Directed broadcast address of the subnet `ip` lives in.
pub fn subnet_broadcast(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn v4_entry(name: &str, ip: [u8; 4], mask: [u8; 4], broadcast: Option<[u8; 4]>) -> AddressEntry {
        AddressEntry {
            interface: name.to_string(),
            ip: IpAddr::V4(Ipv4Addr::from(ip)),
            netmask: IpAddr::V4(Ipv4Addr::from(mask)),
            broadcast: broadcast.map(|b| IpAddr::V4(Ipv4Addr::from(b))),
        }
    }

    #[test]
    fn test_subnet_broadcast() {
        assert_eq!(
            subnet_broadcast(Ipv4Addr::new(192, 168, 1, 42), Ipv4Addr::new(255, 255, 255, 0)),
            Ipv4Addr::new(192, 168, 1, 255)
        );
        assert_eq!(
            subnet_broadcast(Ipv4Addr::new(172, 18, 0, 2), Ipv4Addr::new(255, 255, 0, 0)),
            Ipv4Addr::new(172, 18, 255, 255)
        );
        assert_eq!(
            subnet_broadcast(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 255, 255, 255)),
            Ipv4Addr::new(10, 1, 2, 3)
        );
    }

    #[test]
    fn test_excludes_loopback_and_ipv6() {
        let entries = vec![
            v4_entry("lo", [127, 0, 0, 1], [255, 0, 0, 0], None),
            AddressEntry {
                interface: "eth0".to_string(),
                ip: IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
                netmask: IpAddr::V6(Ipv6Addr::new(0xffff, 0xffff, 0xffff, 0xffff, 0, 0, 0, 0)),
                broadcast: None,
            },
            v4_entry("eth0", [192, 168, 1, 42], [255, 255, 255, 0], Some([192, 168, 1, 255])),
        ];

        let addresses = qualifying_addresses(entries);

        assert_eq!(
            addresses,
            vec![NetworkAddress::new(
                "eth0",
                Ipv4Addr::new(192, 168, 1, 42),
                Ipv4Addr::new(192, 168, 1, 255)
            )]
        );
    }

    #[test]
    fn test_derives_missing_broadcast() {
        let entries = vec![v4_entry("wlan0", [10, 0, 5, 9], [255, 255, 252, 0], None)];

        let addresses = qualifying_addresses(entries);

        assert_eq!(addresses[0].broadcast, Ipv4Addr::new(10, 0, 7, 255));
    }

    #[test]
    fn test_one_entry_per_ip() {
        let entries = vec![
            v4_entry("eth0", [192, 168, 1, 42], [255, 255, 255, 0], None),
            v4_entry("eth0:1", [192, 168, 1, 42], [255, 255, 255, 0], None),
            v4_entry("eth1", [10, 0, 0, 2], [255, 0, 0, 0], None),
        ];

        let addresses = qualifying_addresses(entries);

        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].interface, "eth0");
        assert_eq!(addresses[1].ip, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_static_interfaces() {
        let fixed = StaticInterfaces(vec![NetworkAddress::new(
            "test",
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 255, 255, 255),
        )]);
        assert_eq!(fixed.enumerate().unwrap().len(), 1);
    }

    #[test]
    fn test_system_interfaces_never_yield_loopback() {
        let addresses = SystemInterfaces.enumerate().unwrap();
        assert!(addresses.iter().all(|a| !a.ip.is_loopback()));
    }
}
