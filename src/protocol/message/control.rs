//! Channel control messages.

use bytes::{Buf, BufMut};

use crate::protocol::{
    message::{DecodeError, MsgBody, MsgType},
    seqnum::SeqNum,
    wire::WireEncodable,
};

/// Empty-bodied reliable keepalive. Its acknowledgement doubles as the
/// round-trip-time probe on an otherwise idle connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Ping;

impl MsgBody for Ping {
    const TYPE: MsgType = MsgType::Ping;
    const RELIABLE: bool = true;

    fn encode_body(&self, _dst: &mut impl BufMut) {}

    fn decode_body(_src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Ping)
    }
}

/// Acknowledges one reliable packet sequence. Acks ride the unreliable
/// channel; an acknowledgement is never itself acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub sequence: SeqNum,
}

impl MsgBody for Ack {
    const TYPE: MsgType = MsgType::Ack;
    const RELIABLE: bool = false;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.sequence.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            sequence: SeqNum::decode_wire(src)?,
        })
    }
}
