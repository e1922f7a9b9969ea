//! LAN discovery advertisement. Unlike the rest of the catalog this is a
//! fixed-layout datagram exchanged with hosts we have no connection to,
//! so it is gated by a magic number before anything else is believed.

use bytes::{Buf, BufMut};

use crate::protocol::{
    constants::{DISCOVERY_MAGIC, SESSION_NAME_LEN},
    message::{DecodeError, MsgBody, MsgType},
    wire::WireEncodable,
};

/// The session name travels in a fixed field one byte longer than the
/// maximum name, so it is always NUL-terminated on the wire.
const NAME_FIELD_LEN: usize = SESSION_NAME_LEN + 1;

/// Session advertisement, and also the probe requesting one. A probe
/// carries an empty name and zero player counts; the socket a copy
/// arrives on tells the two apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub game_code: u32,
    pub version: u32,
    pub name: String,
    pub max_players: u8,
    pub num_players: u8,
}

impl Broadcast {
    /// Probe form: everything a searcher knows before any host answered.
    pub fn probe(game_code: u32, version: u32) -> Broadcast {
        Broadcast {
            game_code,
            version,
            name: String::new(),
            max_players: 0,
            num_players: 0,
        }
    }
}

/// Cuts `name` at the field limit without splitting a UTF-8 codepoint.
fn truncate_name(name: &str) -> &str {
    if name.len() <= SESSION_NAME_LEN {
        return name;
    }
    let mut end = 0;
    for (idx, ch) in name.char_indices() {
        if idx + ch.len_utf8() > SESSION_NAME_LEN {
            break;
        }
        end = idx + ch.len_utf8();
    }
    &name[..end]
}

impl MsgBody for Broadcast {
    const TYPE: MsgType = MsgType::Broadcast;
    const RELIABLE: bool = false;

    fn encode_body(&self, dst: &mut impl BufMut) {
        DISCOVERY_MAGIC.encode_wire(dst);
        self.game_code.encode_wire(dst);
        self.version.encode_wire(dst);

        let name = truncate_name(&self.name).as_bytes();
        dst.put_slice(name);
        dst.put_bytes(0, NAME_FIELD_LEN - name.len());

        self.max_players.encode_wire(dst);
        self.num_players.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let magic = u32::decode_wire(src)?;
        if magic != DISCOVERY_MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let game_code = u32::decode_wire(src)?;
        let version = u32::decode_wire(src)?;

        if src.remaining() < NAME_FIELD_LEN {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut raw = [0u8; NAME_FIELD_LEN];
        src.copy_to_slice(&mut raw);
        let len = raw.iter().position(|b| *b == 0).unwrap_or(SESSION_NAME_LEN);
        let name = std::str::from_utf8(&raw[..len])
            .map_err(|_| DecodeError::InvalidUtf8)?
            .to_string();

        Ok(Self {
            game_code,
            version,
            name,
            max_players: u8::decode_wire(src)?,
            num_players: u8::decode_wire(src)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn advertisement_roundtrip() {
        let msg = Broadcast {
            game_code: 7,
            version: 1,
            name: "crate lobby".into(),
            max_players: 9,
            num_players: 3,
        };
        let mut buf = BytesMut::new();
        msg.encode_body(&mut buf);
        let mut slice = buf.freeze();
        assert_eq!(Broadcast::decode_body(&mut slice).unwrap(), msg);
    }

    #[test]
    fn body_layout_is_fixed_size() {
        let mut short = BytesMut::new();
        Broadcast::probe(7, 1).encode_body(&mut short);
        let mut long = BytesMut::new();
        Broadcast {
            game_code: 7,
            version: 1,
            name: "a much longer session name".into(),
            max_players: 2,
            num_players: 2,
        }
        .encode_body(&mut long);
        assert_eq!(short.len(), long.len());
    }

    #[test]
    fn overlong_name_is_cut_to_the_field() {
        let msg = Broadcast {
            game_code: 1,
            version: 1,
            name: "0123456789abcdef_overflow".into(),
            max_players: 2,
            num_players: 1,
        };
        let mut buf = BytesMut::new();
        msg.encode_body(&mut buf);
        let mut slice = buf.freeze();
        let decoded = Broadcast::decode_body(&mut slice).unwrap();
        assert_eq!(decoded.name, "0123456789abcde");
        assert_eq!(decoded.name.len(), SESSION_NAME_LEN);
    }

    #[test]
    fn multibyte_name_is_cut_on_a_char_boundary() {
        let msg = Broadcast {
            game_code: 1,
            version: 1,
            name: "серверная".into(), // 2 bytes per char
            max_players: 2,
            num_players: 1,
        };
        let mut buf = BytesMut::new();
        msg.encode_body(&mut buf);
        let mut slice = buf.freeze();
        let decoded = Broadcast::decode_body(&mut slice).unwrap();
        assert_eq!(decoded.name, "серверн");
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut buf = BytesMut::new();
        0xDEAD_BEEF_u32.encode_wire(&mut buf);
        buf.put_bytes(0, 26);
        let mut slice = buf.freeze();
        assert!(matches!(
            Broadcast::decode_body(&mut slice),
            Err(DecodeError::BadMagic(0xDEAD_BEEF))
        ));
    }
}
