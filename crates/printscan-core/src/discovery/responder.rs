//! Device-side half of the protocol: answers probes with an advertisement.
//!
//! Used to simulate a printer on the network during development and in tests.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::protocol::{is_probe, DeviceAdvertisement};

/// Create a socket that can receive broadcasts on `addr`.
fn create_listen_socket(addr: SocketAddr) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    socket.set_broadcast(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Replies to every probe it receives with a fixed advertisement.
pub struct DeviceResponder {
    socket: UdpSocket,
    reply: Vec<u8>,
}

impl DeviceResponder {
    /// Listen for probes on `addr`, usually `0.0.0.0:20054`.
    pub fn bind(addr: SocketAddr, advertisement: &DeviceAdvertisement) -> io::Result<Self> {
        let socket = UdpSocket::from_std(create_listen_socket(addr)?)?;
        info!(
            "Answering probes on {} as {}",
            socket.local_addr()?,
            advertisement.device_id
        );

        Ok(Self {
            socket,
            reply: advertisement.to_wire().into_bytes(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait for the next probe and answer it. Returns the prober's address.
    ///
    /// Non-probe datagrams are ignored.
    pub async fn respond_once(&self) -> io::Result<SocketAddr> {
        let mut buf = [0u8; 64];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            if !is_probe(&buf[..len]) {
                continue;
            }

            self.socket.send_to(&self.reply, from).await?;
            debug!("Answered probe from {}", from);
            return Ok(from);
        }
    }

    /// Answer probes until an I/O error occurs.
    pub async fn run(&self) -> io::Result<()> {
        loop {
            self.respond_once().await?;
        }
    }
}
