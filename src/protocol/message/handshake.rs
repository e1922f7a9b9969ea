//! Connection handshake and teardown messages.

use bytes::{Buf, BufMut};

use crate::{
    protocol::{
        message::{DecodeError, MsgBody, MsgType},
        wire::WireEncodable,
    },
    session::NetHostId,
};

/// Why a connection attempt was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectReason {
    GameCodeMismatch,
    VersionMismatch,
    SessionFull,
    /// Never sent on the wire; raised locally when the connect timer expires.
    Timeout,
}

impl WireEncodable for RejectReason {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        (*self as u8).encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let v = u8::decode_wire(src)?;
        let e = match v {
            0 => RejectReason::GameCodeMismatch,
            1 => RejectReason::VersionMismatch,
            2 => RejectReason::SessionFull,
            3 => RejectReason::Timeout,
            _ => return Err(DecodeError::UnknownRejectReason(v)),
        };
        Ok(e)
    }
}

/// Why the host removed a connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KickReason {
    ByHost,
    Banned,
}

impl WireEncodable for KickReason {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        (*self as u8).encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let v = u8::decode_wire(src)?;
        let e = match v {
            0 => KickReason::ByHost,
            1 => KickReason::Banned,
            _ => return Err(DecodeError::UnknownKickReason(v)),
        };
        Ok(e)
    }
}

/// First message of the handshake; sent unreliably and re-probed on a
/// timer until the host answers or the attempt times out.
#[derive(Debug, Clone, PartialEq)]
pub struct Connect {
    pub game_code: u32,
    pub version: u32,
}

impl MsgBody for Connect {
    const TYPE: MsgType = MsgType::Connect;
    const RELIABLE: bool = false;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.game_code.encode_wire(dst);
        self.version.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            game_code: u32::decode_wire(src)?,
            version: u32::decode_wire(src)?,
        })
    }
}

/// Positive handshake answer carrying the id the host assigned to us.
#[derive(Debug, Clone, PartialEq)]
pub struct Accept {
    pub host_id: NetHostId,
}

impl MsgBody for Accept {
    const TYPE: MsgType = MsgType::Accept;
    const RELIABLE: bool = true;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.host_id.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            host_id: NetHostId::decode_wire(src)?,
        })
    }
}

/// Negative handshake answer. Sent best-effort to a peer we never made a
/// profile for, so it cannot be reliable.
#[derive(Debug, Clone, PartialEq)]
pub struct Reject {
    pub reason: RejectReason,
}

impl MsgBody for Reject {
    const TYPE: MsgType = MsgType::Reject;
    const RELIABLE: bool = false;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.reason.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            reason: RejectReason::decode_wire(src)?,
        })
    }
}

/// Graceful goodbye. Best-effort by design: the sender frees its peer
/// state immediately and never waits for this to arrive.
#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect;

impl MsgBody for Disconnect {
    const TYPE: MsgType = MsgType::Disconnect;
    const RELIABLE: bool = false;

    fn encode_body(&self, _dst: &mut impl BufMut) {}

    fn decode_body(_src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Disconnect)
    }
}

/// Host-initiated removal, same best-effort contract as [`Disconnect`].
#[derive(Debug, Clone, PartialEq)]
pub struct Kick {
    pub reason: KickReason,
}

impl MsgBody for Kick {
    const TYPE: MsgType = MsgType::Kick;
    const RELIABLE: bool = false;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.reason.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            reason: KickReason::decode_wire(src)?,
        })
    }
}
