use crate::protocol::{message::DecodeError, wire::WireEncodable};
use bytes::{Buf, BufMut};

const HALF: u16 = 0x8000;

/// Wrapping 16-bit sequence number.
///
/// Ordering is circular, so there is no `Ord` impl; use [`SeqNum::less`],
/// which stays correct across wraparound as long as two live sequence
/// numbers are never more than half the space (0x8000) apart.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct SeqNum(u16);

impl SeqNum {
    pub const ZERO: SeqNum = SeqNum(0);

    pub fn new(v: u16) -> SeqNum {
        SeqNum(v)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    // clone mutations.

    pub fn next(&self) -> SeqNum {
        SeqNum(self.0.wrapping_add(1))
    }

    pub fn prev(&self) -> SeqNum {
        SeqNum(self.0.wrapping_sub(1))
    }

    /// Circular less-than: `self < other` iff the wrapped distance from
    /// `other` back to `self` exceeds half the sequence space.
    pub fn less(&self, other: SeqNum) -> bool {
        self.0.wrapping_sub(other.0) > HALF
    }

    pub fn less_eq(&self, other: SeqNum) -> bool {
        *self == other || self.less(other)
    }
}

impl std::fmt::Display for SeqNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl WireEncodable for SeqNum {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        self.0.encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(SeqNum(u16::decode_wire(src)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_on_next() {
        let max = SeqNum::new(u16::MAX);
        assert_eq!(max.next().value(), 0);
    }

    #[test]
    fn ordering_handles_wrap() {
        let a = SeqNum::new(u16::MAX);
        let b = a.next();
        assert!(a.less(b));
        assert!(!b.less(a));
    }

    #[test]
    fn plain_ordering() {
        assert!(SeqNum::new(3).less(SeqNum::new(4)));
        assert!(!SeqNum::new(4).less(SeqNum::new(3)));
        assert!(!SeqNum::new(4).less(SeqNum::new(4)));
    }

    #[test]
    fn half_window_is_not_less_either_way() {
        let a = SeqNum::new(0);
        let b = SeqNum::new(HALF);
        assert!(!a.less(b));
        assert!(!b.less(a));
    }

    #[test]
    fn less_eq_accepts_equal() {
        let s = SeqNum::new(77);
        assert!(s.less_eq(s));
        assert!(s.less_eq(s.next()));
        assert!(!s.next().less_eq(s));
    }
}
