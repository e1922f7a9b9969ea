pub mod control;
pub mod discovery;
pub mod handshake;
pub mod level;
pub mod replication;
mod error;
mod registry;

pub use control::*;
pub use discovery::*;
pub use error::DecodeError;
pub use handshake::*;
pub use level::*;
pub use registry::NetMsg;
pub use replication::*;

use bytes::{Buf, BufMut};

/// Stable discriminant for every message that can appear on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Connect = 0,
    Accept = 1,
    Reject = 2,
    Disconnect = 3,
    Kick = 4,
    LoadLevel = 5,
    Ready = 6,
    SpawnActor = 7,
    SpawnBlueprint = 8,
    DestroyActor = 9,
    Ping = 10,
    Replicate = 11,
    ReplicateScript = 12,
    Invoke = 13,
    InvokeScript = 14,
    Broadcast = 15,
    Ack = 16,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Option<MsgType> {
        Some(match v {
            0 => MsgType::Connect,
            1 => MsgType::Accept,
            2 => MsgType::Reject,
            3 => MsgType::Disconnect,
            4 => MsgType::Kick,
            5 => MsgType::LoadLevel,
            6 => MsgType::Ready,
            7 => MsgType::SpawnActor,
            8 => MsgType::SpawnBlueprint,
            9 => MsgType::DestroyActor,
            10 => MsgType::Ping,
            11 => MsgType::Replicate,
            12 => MsgType::ReplicateScript,
            13 => MsgType::Invoke,
            14 => MsgType::InvokeScript,
            15 => MsgType::Broadcast,
            16 => MsgType::Ack,
            _ => return None,
        })
    }
}

/// Trait implemented by all concrete message body types.
///
/// Implementations are responsible for encoding/decoding only the
/// message body; the leading type byte is handled by `NetMsg`.
pub trait MsgBody: Sized {
    /// The fixed type discriminant used to identify this message on the wire.
    const TYPE: MsgType;

    /// Channel the message travels on. Fixed per type, except that the
    /// replicate/invoke messages override [`MsgBody::reliable`] with a
    /// runtime flag so the same kind can be sent at either priority.
    const RELIABLE: bool;

    fn reliable(&self) -> bool {
        Self::RELIABLE
    }

    /// Encode the body of this message into the destination buffer.
    fn encode_body(&self, dst: &mut impl BufMut);

    /// Decode the body of this message from the source buffer.
    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_discriminant_maps_back() {
        for v in 0..=16u8 {
            let ty = MsgType::from_u8(v).unwrap();
            assert_eq!(ty as u8, v);
        }
        assert!(MsgType::from_u8(17).is_none());
        assert!(MsgType::from_u8(0xFF).is_none());
    }
}
