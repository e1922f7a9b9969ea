//! Level flow and actor lifetime messages. All of these mutate world
//! state on the receiver, so every one rides the reliable channel.

use bytes::{Buf, BufMut};

use crate::{
    protocol::{
        message::{DecodeError, MsgBody, MsgType},
        wire::WireEncodable,
    },
    session::NetId,
};

/// Tells a client which level to bring up. The client answers with
/// [`Ready`](crate::protocol::message::Ready) once the load finished.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadLevel {
    pub name: String,
}

impl MsgBody for LoadLevel {
    const TYPE: MsgType = MsgType::LoadLevel;
    const RELIABLE: bool = true;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.name.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            name: String::decode_wire(src)?,
        })
    }
}

/// Client-side level load finished; the host may start replicating to us.
#[derive(Debug, Clone, PartialEq)]
pub struct Ready;

impl MsgBody for Ready {
    const TYPE: MsgType = MsgType::Ready;
    const RELIABLE: bool = true;

    fn encode_body(&self, _dst: &mut impl BufMut) {}

    fn decode_body(_src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Ready)
    }
}

/// Instantiate a native actor type on the receiver and bind it to the
/// given net id.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnActor {
    pub type_id: u32,
    pub net_id: NetId,
}

impl MsgBody for SpawnActor {
    const TYPE: MsgType = MsgType::SpawnActor;
    const RELIABLE: bool = true;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.type_id.encode_wire(dst);
        self.net_id.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            type_id: u32::decode_wire(src)?,
            net_id: NetId::decode_wire(src)?,
        })
    }
}

/// Instantiate a blueprint (script-defined actor) by asset name.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnBlueprint {
    pub name: String,
    pub net_id: NetId,
}

impl MsgBody for SpawnBlueprint {
    const TYPE: MsgType = MsgType::SpawnBlueprint;
    const RELIABLE: bool = true;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.name.encode_wire(dst);
        self.net_id.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            name: String::decode_wire(src)?,
            net_id: NetId::decode_wire(src)?,
        })
    }
}

/// Remove the actor bound to the given net id.
#[derive(Debug, Clone, PartialEq)]
pub struct DestroyActor {
    pub net_id: NetId,
}

impl MsgBody for DestroyActor {
    const TYPE: MsgType = MsgType::DestroyActor;
    const RELIABLE: bool = true;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.net_id.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            net_id: NetId::decode_wire(src)?,
        })
    }
}
