use crate::protocol::message::DecodeError;
use bytes::{Buf, BufMut};
use std::mem;

/// Trait for types that know how to encode/decode themselves using
/// the little-endian wire format shared by every message body.
pub trait WireEncodable: Sized {
    /// Encode this value into the destination buffer.
    fn encode_wire(&self, dst: &mut impl BufMut);

    /// Decode a value of this type from the source buffer.
    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError>;
}

macro_rules! impl_wire_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl WireEncodable for $ty {
            fn encode_wire(&self, dst: &mut impl BufMut) {
                dst.$put(*self as _);
            }

            fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
                let size = mem::size_of::<$ty>();
                if src.remaining() < size {
                    return Err(DecodeError::UnexpectedEof);
                }
                Ok(src.$get() as $ty)
            }
        }
    };
}

// Unsigned little-endian ints:
impl_wire_int!(u16, put_u16_le, get_u16_le);
impl_wire_int!(u32, put_u32_le, get_u32_le);
impl_wire_int!(u64, put_u64_le, get_u64_le);

// Signed little-endian ints:
impl_wire_int!(i16, put_i16_le, get_i16_le);
impl_wire_int!(i32, put_i32_le, get_i32_le);
impl_wire_int!(i64, put_i64_le, get_i64_le);

// Floats, also little-endian:
impl_wire_int!(f32, put_f32_le, get_f32_le);
impl_wire_int!(f64, put_f64_le, get_f64_le);

impl WireEncodable for u8 {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_u8(*self);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(src.get_u8())
    }
}

impl WireEncodable for i8 {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_i8(*self);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(src.get_i8())
    }
}

impl WireEncodable for bool {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_u8(if *self { 1 } else { 0 });
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(src.get_u8() == 1)
    }
}

/// Strings travel as a u16 byte count followed by UTF-8 bytes.
impl WireEncodable for String {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        let len = self.len().min(u16::MAX as usize);
        dst.put_u16_le(len as u16);
        dst.put_slice(&self.as_bytes()[..len]);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let len = u16::decode_wire(src)? as usize;
        if src.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        let raw = src.copy_to_bytes(len);
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl WireEncodable for [f32; 3] {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        for v in self {
            dst.put_f32_le(*v);
        }
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < 12 {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok([src.get_f32_le(), src.get_f32_le(), src.get_f32_le()])
    }
}

impl WireEncodable for [f32; 4] {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        for v in self {
            dst.put_f32_le(*v);
        }
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < 16 {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok([
            src.get_f32_le(),
            src.get_f32_le(),
            src.get_f32_le(),
            src.get_f32_le(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn ints_are_little_endian() {
        let mut buf = BytesMut::new();
        0x1234_u16.encode_wire(&mut buf);
        assert_eq!(&buf[..], &[0x34, 0x12]);

        let mut buf = BytesMut::new();
        0x1122_3344_u32.encode_wire(&mut buf);
        assert_eq!(&buf[..], &[0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn string_roundtrip() {
        let s = "arena_02".to_string();
        let mut buf = BytesMut::new();
        s.encode_wire(&mut buf);
        let mut slice = buf.freeze();
        assert_eq!(String::decode_wire(&mut slice).unwrap(), s);
    }

    #[test]
    fn string_rejects_bad_utf8() {
        let mut buf = BytesMut::new();
        buf.put_u16_le(2);
        buf.put_slice(&[0xff, 0xfe]);
        let mut slice = buf.freeze();
        assert!(matches!(
            String::decode_wire(&mut slice),
            Err(DecodeError::InvalidUtf8)
        ));
    }

    #[test]
    fn truncated_input_is_an_eof() {
        let mut slice: &[u8] = &[0x01];
        assert!(matches!(
            u32::decode_wire(&mut slice),
            Err(DecodeError::UnexpectedEof)
        ));

        let mut buf = BytesMut::new();
        buf.put_u16_le(10);
        buf.put_slice(b"abc");
        let mut slice = buf.freeze();
        assert!(matches!(
            String::decode_wire(&mut slice),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
