use bytes::{Buf, BufMut};

use crate::protocol::{
    constants::{PACKET_HEADER_SIZE, PacketFlags},
    message::DecodeError,
    seqnum::SeqNum,
    wire::WireEncodable,
};

/// Leading bytes of every datagram: channel sequence number plus flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub sequence: SeqNum,
    pub flags: PacketFlags,
}

impl PacketHeader {
    pub fn new(sequence: SeqNum, reliable: bool) -> PacketHeader {
        let flags = if reliable {
            PacketFlags::RELIABLE
        } else {
            PacketFlags::empty()
        };
        PacketHeader { sequence, flags }
    }

    pub fn is_reliable(&self) -> bool {
        self.flags.contains(PacketFlags::RELIABLE)
    }

    pub fn encode(&self, dst: &mut impl BufMut) {
        self.sequence.encode_wire(dst);
        dst.put_u8(self.flags.bits());
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < PACKET_HEADER_SIZE {
            return Err(DecodeError::UnexpectedEof);
        }
        let sequence = SeqNum::decode_wire(src)?;
        let flags = PacketFlags::from_bits_truncate(src.get_u8());
        Ok(PacketHeader { sequence, flags })
    }
}
