//! Per-interface broadcast sockets.
//!
//! Each qualifying local address gets one UDP socket bound to it. Probes leave
//! through that socket towards the subnet broadcast address and replies come back
//! to it, so every reply can be attributed to the interface it arrived on.

use std::collections::HashSet;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, error, info, trace, warn};

use super::interfaces::NetworkAddress;
use crate::config::BindMode;
use crate::error::DiscoveryError;
use crate::protocol::PROBE_PAYLOAD;

/// How each channel chooses its local port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStrategy {
    /// Bind the first address to `base`, the next to `base + 1`, and so on.
    ///
    /// Windows only delivers broadcast replies to sockets bound to an explicit port.
    ExplicitPort { base: u16 },
    /// Bind every address to an OS-assigned port.
    Ephemeral,
}

impl BindStrategy {
    /// Resolve the configured mode for the current platform.
    pub fn resolve(mode: BindMode, discovery_port: u16) -> Self {
        match mode {
            BindMode::Explicit => BindStrategy::ExplicitPort {
                base: discovery_port,
            },
            BindMode::Ephemeral => BindStrategy::Ephemeral,
            BindMode::Auto if cfg!(windows) => BindStrategy::ExplicitPort {
                base: discovery_port,
            },
            BindMode::Auto => BindStrategy::Ephemeral,
        }
    }
}

/// A datagram received on a channel.
#[derive(Debug, Clone)]
pub struct InboundDatagram {
    pub payload: Bytes,
    pub sender: SocketAddr,
}

/// Create a non-blocking, broadcast-capable UDP socket bound to `ip:port`.
fn create_broadcast_socket(ip: Ipv4Addr, port: u16) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_broadcast(true)?;
    if port != 0 {
        socket.set_reuse_address(true)?;
    }

    let addr = SocketAddr::from((ip, port));
    socket.bind(&addr.into())?;

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Transport-level sanity check on a reply's source.
fn is_valid_sender(sender: &SocketAddr) -> bool {
    !sender.ip().is_unspecified() && sender.port() != 0
}

/// One bound UDP socket scoped to one local address.
#[derive(Debug)]
pub struct BroadcastChannel {
    address: NetworkAddress,
    socket: UdpSocket,
    local_addr: SocketAddr,
    max_datagram_size: usize,
    closed: AtomicBool,
    shutdown: Notify,
}

impl BroadcastChannel {
    /// Bind a channel to `address` on `port` (0 for ephemeral).
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(
        address: NetworkAddress,
        port: u16,
        max_datagram_size: usize,
    ) -> Result<Self, DiscoveryError> {
        let ip = address.ip;
        let bind_err = move |source| DiscoveryError::Bind { address: ip, source };

        let std_socket = create_broadcast_socket(ip, port).map_err(bind_err)?;
        let socket = UdpSocket::from_std(std_socket).map_err(bind_err)?;
        let local_addr = socket.local_addr().map_err(bind_err)?;

        Ok(Self {
            address,
            socket,
            local_addr,
            max_datagram_size,
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    pub fn local_ip(&self) -> Ipv4Addr {
        self.address.ip
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Broadcast the discovery probe to `port` on this channel's subnet.
    pub async fn send_probe(&self, port: u16) -> Result<(), DiscoveryError> {
        let target = SocketAddr::from((self.address.broadcast, port));
        self.send_to(PROBE_PAYLOAD, target).await
    }

    /// Send an arbitrary datagram out of this channel.
    pub async fn send_to(&self, payload: &[u8], target: SocketAddr) -> Result<(), DiscoveryError> {
        if self.is_closed() {
            return Err(DiscoveryError::ChannelClosed(self.address.ip));
        }

        self.socket
            .send_to(payload, target)
            .await
            .map_err(|source| DiscoveryError::Send { target, source })?;
        trace!("Sent {} bytes from {} to {}", payload.len(), self.local_addr, target);

        Ok(())
    }

    /// Wait until the socket has pending data.
    pub async fn readable(&self) -> io::Result<()> {
        self.socket.readable().await
    }

    /// Take every datagram currently queued on the socket without waiting.
    ///
    /// Datagrams from an unspecified sender, and datagrams longer than the
    /// configured maximum, are dropped whole.
    pub fn drain(&self) -> Vec<InboundDatagram> {
        let mut datagrams = Vec::new();
        if self.is_closed() {
            return datagrams;
        }

        // One spare byte: a datagram that reaches it is over the limit.
        let mut buf = vec![0u8; self.max_datagram_size + 1];
        loop {
            match self.socket.try_recv_from(&mut buf) {
                Ok((len, sender)) => {
                    if !is_valid_sender(&sender) {
                        trace!("Dropping datagram with invalid sender {}", sender);
                        continue;
                    }
                    if len > self.max_datagram_size {
                        debug!(
                            "Dropping oversized datagram from {} (over {} bytes)",
                            sender, self.max_datagram_size
                        );
                        continue;
                    }
                    datagrams.push(InboundDatagram {
                        payload: Bytes::copy_from_slice(&buf[..len]),
                        sender,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    // Readiness stays set, so the next notification resumes the drain.
                    debug!("Receive error on {}: {}", self.local_addr, e);
                    break;
                }
            }
        }

        datagrams
    }

    /// Close the channel. Safe to call any number of times.
    pub fn abort(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Aborting discovery channel on {}", self.local_addr);
            self.shutdown.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once [`abort`](Self::abort) has been called.
    pub async fn closed(&self) {
        let notified = self.shutdown.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }
}

/// The channels of one discovery session, at most one per local address.
#[derive(Debug, Default)]
pub struct ChannelSet {
    channels: Vec<Arc<BroadcastChannel>>,
}

impl ChannelSet {
    /// Bind one channel per distinct address.
    ///
    /// Addresses that fail to bind are logged and skipped; the rest still get channels.
    /// With explicit ports, each successfully bound channel takes the next port.
    pub fn prepare(
        addresses: Vec<NetworkAddress>,
        strategy: BindStrategy,
        max_datagram_size: usize,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut next_port = match strategy {
            BindStrategy::ExplicitPort { base } => Some(base),
            BindStrategy::Ephemeral => None,
        };
        let mut channels = Vec::new();

        for address in addresses {
            if !seen.insert(address.ip) {
                continue;
            }

            let port = match (strategy, next_port) {
                (BindStrategy::Ephemeral, _) => 0,
                (BindStrategy::ExplicitPort { .. }, Some(port)) => port,
                (BindStrategy::ExplicitPort { .. }, None) => {
                    warn!("No local port left for {}; skipping it", address);
                    continue;
                }
            };

            info!("Discovering devices on network interface: {}", address);
            match BroadcastChannel::bind(address, port, max_datagram_size) {
                Ok(channel) => {
                    if port != 0 {
                        next_port = port.checked_add(1);
                    }
                    channels.push(Arc::new(channel));
                }
                Err(e) => error!("{}", e),
            }
        }

        Self { channels }
    }

    pub fn channels(&self) -> &[Arc<BroadcastChannel>] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Whether any channel has been aborted since the set was prepared.
    pub fn has_closed(&self) -> bool {
        self.channels.iter().any(|c| c.is_closed())
    }

    /// Abort every channel and forget them.
    pub fn abort_all(&mut self) {
        for channel in self.channels.drain(..) {
            channel.abort();
        }
    }
}
