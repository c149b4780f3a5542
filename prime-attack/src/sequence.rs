//! ARQ sequence counters
//!
//! PRIME ARQ connections number packets with 6-bit identifiers. The attack
//! keeps two of them: the packet id it stamps on its next message and the
//! acknowledgement it sends for the last packet seen from the meter.

use prime_mac::ArqHeader;
use std::fmt;

/// 6-bit ARQ sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SeqNo(u8);

impl SeqNo {
    /// Number of distinct sequence numbers
    pub const MODULUS: u8 = 64;

    pub const ZERO: SeqNo = SeqNo(0);

    /// Create a sequence number, keeping the 6 low bits
    pub const fn new(value: u8) -> Self {
        Self(value & 0x3F)
    }

    /// Following sequence number, wrapping after 63
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % Self::MODULUS)
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packet and acknowledgement counters of the dialogue with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceState {
    /// PKTID stamped on the next outbound message
    pub pkt_id: SeqNo,
    /// ACKID stamped on the next outbound message
    pub ack_id: SeqNo,
}

impl SequenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero both counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Move both counters one step forward
    ///
    /// Used after each association probe to scan the sequence space until the
    /// target accepts one of them.
    pub fn advance(&mut self) {
        self.pkt_id = self.pkt_id.next();
        self.ack_id = self.ack_id.next();
    }

    /// Resynchronise on an accepted inbound packet
    ///
    /// The next PKTID follows the first NACK if the target reports one, else
    /// its ACK; a packet with neither leaves PKTID unchanged. The next ACKID
    /// acknowledges the inbound packet.
    pub fn accept(&mut self, arq: &ArqHeader) {
        if let Some(nack) = arq.nack_ids.first() {
            self.pkt_id = SeqNo::new(*nack);
        } else if let Some(ack) = arq.ack_id {
            self.pkt_id = SeqNo::new(ack);
        }
        self.ack_id = SeqNo::new(arq.pkt_id).next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_wraps_modulo_64() {
        for n in 0..64u8 {
            assert_eq!(SeqNo::new(n).next().value(), (n + 1) % 64);
        }
        assert_eq!(SeqNo::new(63).next(), SeqNo::ZERO);
    }

    #[test]
    fn test_new_masks_to_six_bits() {
        assert_eq!(SeqNo::new(0x41).value(), 1);
        assert_eq!(SeqNo::new(0xFF).value(), 63);
    }

    #[test]
    fn test_advance_and_reset() {
        let mut seq = SequenceState::new();
        for _ in 0..65 {
            seq.advance();
        }
        assert_eq!(seq.pkt_id.value(), 1);
        assert_eq!(seq.ack_id.value(), 1);

        seq.reset();
        assert_eq!(seq, SequenceState::default());
    }

    #[test]
    fn test_accept_prefers_nack() {
        let mut seq = SequenceState::new();
        seq.accept(&ArqHeader {
            pkt_id: 9,
            ack_id: Some(4),
            nack_ids: vec![2, 3],
            ..Default::default()
        });
        assert_eq!(seq.pkt_id.value(), 2);
        assert_eq!(seq.ack_id.value(), 10);
    }

    #[test]
    fn test_accept_uses_ack() {
        let mut seq = SequenceState::new();
        seq.accept(&ArqHeader {
            pkt_id: 63,
            ack_id: Some(12),
            ..Default::default()
        });
        assert_eq!(seq.pkt_id.value(), 12);
        assert_eq!(seq.ack_id, SeqNo::ZERO);
    }

    #[test]
    fn test_accept_without_ack_keeps_pkt_id() {
        let mut seq = SequenceState {
            pkt_id: SeqNo::new(7),
            ack_id: SeqNo::new(7),
        };
        seq.accept(&ArqHeader {
            pkt_id: 20,
            ..Default::default()
        });
        assert_eq!(seq.pkt_id.value(), 7);
        assert_eq!(seq.ack_id.value(), 21);
    }
}
