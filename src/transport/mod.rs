//! UDP transport layer: one datagram in, one datagram out.
//!
//! This module exposes the [`Transport`] seam the session layer sends and
//! receives through, plus the two implementations:
//! - [`UdpTransport`] for real, non-blocking UDP sockets.
//! - [`SimTransport`] for a deterministic in-memory network used by tests.
//!
//! All reliability and sequencing logic lives above this layer; a
//! transport only moves framed packets and reports who they came from.

pub mod sim;

pub use sim::{SimNetwork, SimTransport};

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
};

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::{
    constants::{MAX_MSG_SIZE, PACKET_HEADER_SIZE},
    header::PacketHeader,
};

/// Socket-shaped seam between the session layer and the network.
///
/// Receiving is non-blocking and drains at most one datagram per call;
/// the facade loops until `None` each tick.
pub trait Transport {
    fn send_to(&mut self, buf: &[u8], to: SocketAddr) -> io::Result<usize>;

    /// Non-blocking receive; `Ok(None)` means nothing is queued right now.
    fn try_recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// A non-blocking std UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<UdpTransport> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        Ok(UdpTransport { socket })
    }

    /// Bind a socket that may also send to the broadcast address. Used by
    /// the session search and the hosting side's advertisement listener.
    pub fn bind_broadcast(addr: impl ToSocketAddrs) -> io::Result<UdpTransport> {
        let transport = UdpTransport::bind(addr)?;
        transport.socket.set_broadcast(true)?;
        Ok(transport)
    }
}

impl Transport for UdpTransport {
    fn send_to(&mut self, buf: &[u8], to: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, to)
    }

    fn try_recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(Some((len, from))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Prepends the 3-byte packet header to a finished message body.
pub(crate) fn frame_packet(header: PacketHeader, body: &[u8]) -> Bytes {
    let mut pkt = BytesMut::with_capacity(PACKET_HEADER_SIZE + body.len());
    header.encode(&mut pkt);
    pkt.put_slice(body);
    pkt.freeze()
}

/// Best-effort datagram send. Size violations and socket errors are
/// logged and swallowed; retrying lost data is the reliability engine's
/// job, not the transport's. Returns the bytes handed to the socket, for
/// rate accounting.
pub(crate) fn send_packet<T: Transport>(transport: &mut T, to: SocketAddr, pkt: &[u8]) -> usize {
    if pkt.len() > MAX_MSG_SIZE {
        tracing::warn!(to = %to, len = pkt.len(), "dropping oversize outgoing packet");
        return 0;
    }
    match transport.send_to(pkt, to) {
        Ok(sent) => sent,
        Err(e) => {
            tracing::debug!(to = %to, error = ?e, "udp send failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::seqnum::SeqNum;

    #[test]
    fn frame_prepends_header() {
        let header = PacketHeader::new(SeqNum::new(5), true);
        let pkt = frame_packet(header, &[0xAA, 0xBB]);
        assert_eq!(pkt.len(), PACKET_HEADER_SIZE + 2);
        assert_eq!(&pkt[..], &[0x05, 0x00, 0x01, 0xAA, 0xBB]);
    }

    #[test]
    fn oversize_packet_is_not_sent() {
        let net = SimNetwork::new();
        let mut a = net.bind(0);
        let b = net.bind(0);
        let big = vec![0u8; MAX_MSG_SIZE + 1];
        let sent = send_packet(&mut a, b.local_addr().unwrap(), &big);
        assert_eq!(sent, 0);
    }
}
