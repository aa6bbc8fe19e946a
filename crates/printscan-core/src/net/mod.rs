//! Local network plumbing: interface enumeration and per-interface broadcast sockets.

pub mod channel;
pub mod interfaces;

pub use channel::{BindStrategy, BroadcastChannel, ChannelSet, InboundDatagram};
pub use interfaces::{InterfaceSource, NetworkAddress, StaticInterfaces, SystemInterfaces};
