//! State replication and remote call messages. These four are the only
//! types whose channel is chosen at runtime: the same message kind is
//! sent reliably when forced and unreliably on the tier cadence.

use bytes::{Buf, BufMut};

use crate::{
    protocol::{
        constants::MAX_NET_FUNC_PARAMS,
        datum::Datum,
        message::{DecodeError, MsgBody, MsgType},
        wire::WireEncodable,
    },
    session::NetId,
};

/// Bytes of a replicate body before any field pairs: type byte, net id,
/// channel flag and field count.
pub const REPLICATE_BASE_SIZE: usize = 1 + 4 + 1 + 1;

/// Each field pair costs its datum size plus one index byte.
pub const FIELD_INDEX_SIZE: usize = 1;

fn encode_fields(fields: &[(u8, Datum)], dst: &mut impl BufMut) {
    dst.put_u8(fields.len().min(u8::MAX as usize) as u8);
    for (index, value) in fields {
        index.encode_wire(dst);
        value.encode_wire(dst);
    }
}

fn decode_fields(src: &mut impl Buf) -> Result<Vec<(u8, Datum)>, DecodeError> {
    let count = u8::decode_wire(src)?;
    let mut fields = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let index = u8::decode_wire(src)?;
        let value = Datum::decode_wire(src)?;
        fields.push((index, value));
    }
    Ok(fields)
}

fn decode_params(src: &mut impl Buf) -> Result<Vec<Datum>, DecodeError> {
    let count = u8::decode_wire(src)?;
    if count as usize > MAX_NET_FUNC_PARAMS {
        return Err(DecodeError::TooManyParams(count));
    }
    let mut params = Vec::with_capacity(count as usize);
    for _ in 0..count {
        params.push(Datum::decode_wire(src)?);
    }
    Ok(params)
}

/// Changed-field update for the actor bound to `net_id`. Carries only the
/// field indices the sender decided to include, not the whole actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Replicate {
    pub net_id: NetId,
    pub fields: Vec<(u8, Datum)>,
    pub reliable: bool,
}

impl MsgBody for Replicate {
    const TYPE: MsgType = MsgType::Replicate;
    const RELIABLE: bool = false;

    fn reliable(&self) -> bool {
        self.reliable
    }

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.net_id.encode_wire(dst);
        self.reliable.encode_wire(dst);
        encode_fields(&self.fields, dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            net_id: NetId::decode_wire(src)?,
            reliable: bool::decode_wire(src)?,
            fields: decode_fields(src)?,
        })
    }
}

/// [`Replicate`] for blueprint actors; the receiver routes the fields to
/// the actor's script table instead of native properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateScript {
    pub net_id: NetId,
    pub fields: Vec<(u8, Datum)>,
    pub reliable: bool,
}

impl MsgBody for ReplicateScript {
    const TYPE: MsgType = MsgType::ReplicateScript;
    const RELIABLE: bool = false;

    fn reliable(&self) -> bool {
        self.reliable
    }

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.net_id.encode_wire(dst);
        self.reliable.encode_wire(dst);
        encode_fields(&self.fields, dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            net_id: NetId::decode_wire(src)?,
            reliable: bool::decode_wire(src)?,
            fields: decode_fields(src)?,
        })
    }
}

/// Remote call on the actor bound to `net_id`: function index plus up to
/// eight tagged parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoke {
    pub net_id: NetId,
    pub func: u8,
    pub params: Vec<Datum>,
    pub reliable: bool,
}

fn encode_invoke(
    net_id: NetId,
    func: u8,
    params: &[Datum],
    reliable: bool,
    dst: &mut impl BufMut,
) {
    net_id.encode_wire(dst);
    func.encode_wire(dst);
    reliable.encode_wire(dst);
    dst.put_u8(params.len().min(MAX_NET_FUNC_PARAMS) as u8);
    for p in params.iter().take(MAX_NET_FUNC_PARAMS) {
        p.encode_wire(dst);
    }
}

impl MsgBody for Invoke {
    const TYPE: MsgType = MsgType::Invoke;
    const RELIABLE: bool = false;

    fn reliable(&self) -> bool {
        self.reliable
    }

    fn encode_body(&self, dst: &mut impl BufMut) {
        encode_invoke(self.net_id, self.func, &self.params, self.reliable, dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            net_id: NetId::decode_wire(src)?,
            func: u8::decode_wire(src)?,
            reliable: bool::decode_wire(src)?,
            params: decode_params(src)?,
        })
    }
}

/// [`Invoke`] for blueprint actors, dispatched into the script VM.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeScript {
    pub net_id: NetId,
    pub func: u8,
    pub params: Vec<Datum>,
    pub reliable: bool,
}

impl MsgBody for InvokeScript {
    const TYPE: MsgType = MsgType::InvokeScript;
    const RELIABLE: bool = false;

    fn reliable(&self) -> bool {
        self.reliable
    }

    fn encode_body(&self, dst: &mut impl BufMut) {
        encode_invoke(self.net_id, self.func, &self.params, self.reliable, dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            net_id: NetId::decode_wire(src)?,
            func: u8::decode_wire(src)?,
            reliable: bool::decode_wire(src)?,
            params: decode_params(src)?,
        })
    }
}
