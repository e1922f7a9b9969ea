use bytes::{Buf, BufMut};

use crate::protocol::message::{
    Accept, Ack, Broadcast, Connect, DecodeError, DestroyActor, Disconnect, Invoke, InvokeScript,
    Kick, LoadLevel, MsgBody, MsgType, Ping, Ready, Reject, Replicate, ReplicateScript,
    SpawnActor, SpawnBlueprint,
};

/// INTERNAL
/// Generates the closed NetMsg enum that every networking loop uses to
/// encode and decode messages. Listing a type here and giving its body an
/// arm in `MsgType` is all it takes to put it on the wire.
macro_rules! define_net_msgs {
    (
        $(
            $name:ident,
        )+
    ) => {
        /// One variant per concrete message type; the registry the whole
        /// catalog dispatches through.
        #[derive(Debug, Clone, PartialEq)]
        pub enum NetMsg {
            $(
                $name($name),
            )+
        }

        impl NetMsg {
            /// Decode one message (type byte plus body) from the buffer.
            pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
                if !src.has_remaining() {
                    return Err(DecodeError::UnexpectedEof);
                }
                let raw = src.get_u8();
                let ty = MsgType::from_u8(raw).ok_or(DecodeError::UnknownMsgType(raw))?;
                Ok(match ty {
                    $(
                        MsgType::$name => {
                            NetMsg::$name(<$name as MsgBody>::decode_body(src)?)
                        }
                    )+
                })
            }

            pub fn msg_type(&self) -> MsgType {
                match self {
                    $(
                        NetMsg::$name(_inner) => <$name as MsgBody>::TYPE,
                    )+
                }
            }

            /// Encode this message, type byte included.
            pub fn encode(&self, dst: &mut impl BufMut) {
                dst.put_u8(self.msg_type() as u8);
                match self {
                    $(
                        NetMsg::$name(inner) => inner.encode_body(dst),
                    )+
                }
            }

            /// Channel this message rides on.
            pub fn is_reliable(&self) -> bool {
                match self {
                    $(
                        NetMsg::$name(inner) => inner.reliable(),
                    )+
                }
            }
        }

        $(
            impl From<$name> for NetMsg {
                fn from(inner: $name) -> NetMsg {
                    NetMsg::$name(inner)
                }
            }
        )+
    }
}

define_net_msgs! {
    Connect,
    Accept,
    Reject,
    Disconnect,
    Kick,
    LoadLevel,
    Ready,
    SpawnActor,
    SpawnBlueprint,
    DestroyActor,
    Ping,
    Replicate,
    ReplicateScript,
    Invoke,
    InvokeScript,
    Broadcast,
    Ack,
}
