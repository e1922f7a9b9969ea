//! Per-peer connection state and the session data model.
//!
//! A [`HostProfile`] is everything the engine remembers about one remote
//! peer: the accumulation buffers messages batch into, the in-flight
//! reliable packets, the four channel sequence counters, and the timers
//! the facade sweeps each tick. The reliability engine itself lives in
//! the `reliability` sibling as further impl blocks on the profile.

pub mod discovery;
mod reliability;

use std::{net::SocketAddr, time::Duration};

use bytes::{Bytes, BytesMut};

use crate::protocol::{constants::MAX_MSG_BODY_SIZE, seqnum::SeqNum};

/// Stable identity of a connected peer. Assigned by the host at accept
/// time; unlike the address it survives NAT rebinding.
pub type NetHostId = u8;

/// Process-wide-unique identifier binding a replicated actor instance
/// across all connected peers.
pub type NetId = u32;

/// The hosting side always owns id 0; clients get 1 and up.
pub const SERVER_HOST_ID: NetHostId = 0;

/// A network endpoint: where packets go, and who that is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetHost {
    pub addr: SocketAddr,
    pub id: NetHostId,
}

/// Connection role of the local process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetStatus {
    /// Not part of any session.
    #[default]
    Local,
    /// Connect sent, waiting for Accept or Reject.
    Connecting,
    /// Connected to a remote host.
    Client,
    /// Hosting a session.
    Server,
}

/// Discovery snapshot of a joinable session, rebuilt from every
/// advertisement that arrives while a search is running.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    pub host: NetHost,
    pub name: String,
    pub version: u32,
    pub max_players: u8,
    pub num_players: u8,
}

/// One reliable packet being tracked for retransmission (outgoing) or
/// parked out of order (incoming).
#[derive(Debug, Clone)]
pub struct ReliablePacket {
    pub seq: SeqNum,
    pub payload: Bytes,
    /// Time since the packet last went to the socket.
    pub since_send: Duration,
    /// Time since the packet was first sent; the RTT sample source.
    pub age: Duration,
    pub num_sends: u32,
}

impl ReliablePacket {
    pub(crate) fn new(seq: SeqNum, payload: Bytes) -> ReliablePacket {
        ReliablePacket {
            seq,
            payload,
            since_send: Duration::ZERO,
            age: Duration::ZERO,
            num_sends: 1,
        }
    }
}

/// Everything the engine tracks about one remote peer.
pub struct HostProfile {
    pub host: NetHost,

    // Outgoing messages accumulate here until a flush turns a buffer
    // into one framed packet.
    pub(crate) reliable_buf: BytesMut,
    pub(crate) unreliable_buf: BytesMut,

    pub(crate) outgoing: Vec<ReliablePacket>,
    pub(crate) incoming: Vec<ReliablePacket>,

    // One counter per direction per channel.
    pub(crate) seq_out_reliable: SeqNum,
    pub(crate) seq_in_reliable: SeqNum,
    pub(crate) seq_out_unreliable: SeqNum,
    pub(crate) seq_in_unreliable: Option<SeqNum>,

    pub(crate) since_recv: Duration,
    pub(crate) since_ping: Duration,
    pub(crate) rtt: Option<f32>,

    /// The peer finished loading the level and may receive replication.
    pub(crate) ready: bool,

    /// Framed packets waiting for the socket.
    pub(crate) outbox: Vec<Bytes>,
}

impl HostProfile {
    pub fn new(host: NetHost) -> HostProfile {
        HostProfile {
            host,
            reliable_buf: BytesMut::with_capacity(MAX_MSG_BODY_SIZE),
            unreliable_buf: BytesMut::with_capacity(MAX_MSG_BODY_SIZE),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            seq_out_reliable: SeqNum::ZERO,
            seq_in_reliable: SeqNum::ZERO,
            seq_out_unreliable: SeqNum::ZERO,
            seq_in_unreliable: None,
            since_recv: Duration::ZERO,
            since_ping: Duration::ZERO,
            rtt: None,
            ready: false,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> NetHostId {
        self.host.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.host.addr
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Smoothed round-trip estimate, once at least one ack produced a
    /// sample.
    pub fn ping(&self) -> Option<Duration> {
        self.rtt.map(Duration::from_secs_f32)
    }

    /// Reliable packets received ahead of sequence and parked for
    /// in-order delivery.
    pub fn has_incoming_packet(&self) -> bool {
        !self.incoming.is_empty()
    }

    pub(crate) fn note_recv(&mut self) {
        self.since_recv = Duration::ZERO;
    }

    pub(crate) fn tick_timers(&mut self, dt: Duration) {
        self.since_recv += dt;
        self.since_ping += dt;
    }
}
