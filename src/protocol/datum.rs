use crate::protocol::{message::DecodeError, wire::WireEncodable};
use bytes::{Buf, BufMut};

/// Tagged dynamic value used for replicated actor fields and remote
/// function parameters. The wire form is a one-byte tag followed by the
/// payload of the tagged type.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Bool(bool),
    Int(i32),
    Float(f32),
    Byte(u8),
    Short(i16),
    Str(String),
    Vector([f32; 3]),
    Color([f32; 4]),
}

const TAG_BOOL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_BYTE: u8 = 3;
const TAG_SHORT: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_VECTOR: u8 = 6;
const TAG_COLOR: u8 = 7;

impl Datum {
    pub fn tag(&self) -> u8 {
        match self {
            Datum::Bool(_) => TAG_BOOL,
            Datum::Int(_) => TAG_INT,
            Datum::Float(_) => TAG_FLOAT,
            Datum::Byte(_) => TAG_BYTE,
            Datum::Short(_) => TAG_SHORT,
            Datum::Str(_) => TAG_STR,
            Datum::Vector(_) => TAG_VECTOR,
            Datum::Color(_) => TAG_COLOR,
        }
    }

    /// Encoded size in bytes, tag included. Used to pack replication
    /// payloads against the message body limit without encoding twice.
    pub fn wire_size(&self) -> usize {
        1 + match self {
            Datum::Bool(_) => 1,
            Datum::Int(_) => 4,
            Datum::Float(_) => 4,
            Datum::Byte(_) => 1,
            Datum::Short(_) => 2,
            Datum::Str(s) => 2 + s.len().min(u16::MAX as usize),
            Datum::Vector(_) => 12,
            Datum::Color(_) => 16,
        }
    }
}

impl WireEncodable for Datum {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.tag());
        match self {
            Datum::Bool(v) => v.encode_wire(dst),
            Datum::Int(v) => v.encode_wire(dst),
            Datum::Float(v) => v.encode_wire(dst),
            Datum::Byte(v) => v.encode_wire(dst),
            Datum::Short(v) => v.encode_wire(dst),
            Datum::Str(v) => v.encode_wire(dst),
            Datum::Vector(v) => v.encode_wire(dst),
            Datum::Color(v) => v.encode_wire(dst),
        }
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let tag = u8::decode_wire(src)?;
        Ok(match tag {
            TAG_BOOL => Datum::Bool(bool::decode_wire(src)?),
            TAG_INT => Datum::Int(i32::decode_wire(src)?),
            TAG_FLOAT => Datum::Float(f32::decode_wire(src)?),
            TAG_BYTE => Datum::Byte(u8::decode_wire(src)?),
            TAG_SHORT => Datum::Short(i16::decode_wire(src)?),
            TAG_STR => Datum::Str(String::decode_wire(src)?),
            TAG_VECTOR => Datum::Vector(<[f32; 3]>::decode_wire(src)?),
            TAG_COLOR => Datum::Color(<[f32; 4]>::decode_wire(src)?),
            other => return Err(DecodeError::UnknownDatumTag(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip(d: Datum) {
        let mut buf = BytesMut::new();
        d.encode_wire(&mut buf);
        assert_eq!(buf.len(), d.wire_size());
        let mut slice = buf.freeze();
        assert_eq!(Datum::decode_wire(&mut slice).unwrap(), d);
        assert!(!slice.has_remaining());
    }

    #[test]
    fn every_variant_roundtrips() {
        roundtrip(Datum::Bool(true));
        roundtrip(Datum::Int(-40_000));
        roundtrip(Datum::Float(3.5));
        roundtrip(Datum::Byte(0xAB));
        roundtrip(Datum::Short(-2));
        roundtrip(Datum::Str("crate_13".into()));
        roundtrip(Datum::Vector([1.0, -2.0, 0.25]));
        roundtrip(Datum::Color([0.1, 0.2, 0.3, 1.0]));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut slice: &[u8] = &[0xEE, 0x00];
        assert!(matches!(
            Datum::decode_wire(&mut slice),
            Err(DecodeError::UnknownDatumTag(0xEE))
        ));
    }

    #[test]
    fn truncated_payload_is_an_eof() {
        let mut slice: &[u8] = &[TAG_INT, 0x01, 0x02];
        assert!(matches!(
            Datum::decode_wire(&mut slice),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
