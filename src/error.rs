use thiserror::Error;

use crate::session::{NetHostId, NetId, NetStatus};

/// Errors surfaced by [`NetworkManager`](crate::NetworkManager)
/// operations. Wire-level problems never show up here; malformed or
/// misbehaving remote traffic is logged and dropped inside the tick.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation is not valid in the current connection status.
    #[error("operation requires status {expected:?}, current status is {actual:?}")]
    WrongStatus {
        expected: NetStatus,
        actual: NetStatus,
    },

    /// The operation needs a live session and there is none.
    #[error("not in a session (current status {0:?})")]
    NotInSession(NetStatus),

    /// The encoded message would not fit one packet body.
    #[error("message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("too many net func params: {0}")]
    TooManyParams(usize),

    #[error("no connected client with host id {0}")]
    UnknownClient(NetHostId),

    #[error("no replicated actor bound to net id {0}")]
    UnknownActor(NetId),
}
