use bitflags::bitflags;
use std::time::Duration;

/// Default UDP port the game socket binds on the hosting side.
pub const DEFAULT_GAME_PORT: u16 = 5151;

/// Default UDP port session advertisements are broadcast to.
pub const DEFAULT_DISCOVERY_PORT: u16 = 15151;

/// Size of the scratch buffers used for socket reads and writes.
pub const RECV_BUFFER_SIZE: usize = 1024;
pub const SEND_BUFFER_SIZE: usize = 1024;

/// Maximum number of message-body bytes carried by one packet. Kept well
/// under typical MTUs so a datagram never needs IP fragmentation.
pub const MAX_MSG_BODY_SIZE: usize = 500;

/// Every datagram starts with a 2-byte sequence number and a 1-byte flag set.
pub const PACKET_HEADER_SIZE: usize = 3;

pub const MAX_MSG_SIZE: usize = PACKET_HEADER_SIZE + MAX_MSG_BODY_SIZE;

/// Maximum length of an advertised session name. The wire field is one byte
/// longer to guarantee NUL termination.
pub const SESSION_NAME_LEN: usize = 15;

/// Maximum parameter count for a remote function call.
pub const MAX_NET_FUNC_PARAMS: usize = 8;

/*
 * Timing
 */

/// Keepalive cadence per connected peer.
pub const PING_INTERVAL: Duration = Duration::from_millis(1000);

/// Cadence of discovery probes while a session search is running.
pub const BROADCAST_INTERVAL: Duration = Duration::from_millis(5000);

/// Time allowed for the connect handshake to complete before giving up.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Time between re-sending the connect probe while the handshake is pending.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

/// A peer that stays silent this long is dropped like a disconnect.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_millis(15000);

/// Un-acked reliable packets older than this are retransmitted.
pub const RESEND_INTERVAL: Duration = Duration::from_millis(500);

/// Byte-rate accounting window.
pub const STATS_WINDOW: Duration = Duration::from_millis(1000);

bitflags! {
    /// Flag byte of the packet header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct PacketFlags: u8 {
        /// The packet rides the reliable channel and must be acknowledged.
        const RELIABLE = 0b0000_0001;
    }
}

/// Magic prefix of a discovery datagram; anything else is not ours.
pub const DISCOVERY_MAGIC: u32 = 0x5243_5354;

/// Actors visited per tick for the Low/Medium/High replication tiers.
pub const TIER_VISIT_COUNTS: [usize; 3] = [1, 2, 4];
