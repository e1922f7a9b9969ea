//! Wire protocol primitives, the message catalog, and related state.
//!
//! This module houses constants, message definitions, encoding helpers and
//! the packet header used by the higher-level session and transport layers.

pub mod constants;
pub mod datum;
pub mod header;
pub mod message;
pub mod seqnum;
pub mod wire;
