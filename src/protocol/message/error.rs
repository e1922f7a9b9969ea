use thiserror::Error;

/// Errors that may occur while decoding wire values or message bodies.
///
/// This type is kept small and generic so it can be shared by all
/// `WireEncodable` implementations and message bodies.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The buffer did not contain enough bytes to decode the requested value.
    #[error("Unexpected EoF, not enough bytes to read requested type.")]
    UnexpectedEof,

    /// A message type byte was not recognised by the registry.
    #[error("Unknown message type: {0}")]
    UnknownMsgType(u8),

    /// A discovery datagram did not start with the expected magic number.
    #[error("Bad discovery magic: 0x{0:08X}")]
    BadMagic(u32),

    /// A string field held bytes that are not valid UTF-8.
    #[error("String field is not valid UTF-8.")]
    InvalidUtf8,

    /// A remote call carried more parameters than the protocol allows.
    #[error("Remote call carries {0} parameters, more than the limit.")]
    TooManyParams(u8),

    /// A datum tag value that does not map to any known variant.
    #[error("Unknown datum tag: {0}")]
    UnknownDatumTag(u8),

    /// A reject reason value that does not map to any known variant.
    #[error("Unknown reject reason byte: {0}")]
    UnknownRejectReason(u8),

    /// A kick reason value that does not map to any known variant.
    #[error("Unknown kick reason byte: {0}")]
    UnknownKickReason(u8),
}
