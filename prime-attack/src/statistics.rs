//! Attack statistics collection

/// Counters of one attack run
///
/// Updated by the driver as it goes and returned in the final report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttackStatistics {
    /// Frames written to the medium
    pub frames_sent: u64,
    /// Association requests sent while scanning sequence numbers
    pub probes_sent: u64,
    /// Literal resends of the current message
    pub retransmissions: u64,
    /// Frames delivered by the transport
    pub frames_received: u64,
    /// Frames dropped by the correlator
    pub frames_rejected: u64,
    /// Frames from the target that did not acknowledge the message in flight
    pub sequence_errors: u64,
    /// Error responses from the target
    pub protocol_errors: u64,
    /// Transient transport failures
    pub send_failures: u64,
    /// Messages that could not be composed
    pub compose_failures: u64,
    /// State changes
    pub transitions: u64,
    /// Disconnect/reconnect round trips completed
    pub blink_cycles: u64,
}

impl AttackStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_frames_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub fn increment_probes_sent(&mut self) {
        self.probes_sent += 1;
    }

    pub fn increment_retransmissions(&mut self) {
        self.retransmissions += 1;
    }

    pub fn increment_frames_received(&mut self) {
        self.frames_received += 1;
    }

    pub fn increment_frames_rejected(&mut self) {
        self.frames_rejected += 1;
    }

    pub fn increment_sequence_errors(&mut self) {
        self.sequence_errors += 1;
    }

    pub fn increment_protocol_errors(&mut self) {
        self.protocol_errors += 1;
    }

    pub fn increment_send_failures(&mut self) {
        self.send_failures += 1;
    }

    pub fn increment_compose_failures(&mut self) {
        self.compose_failures += 1;
    }

    pub fn increment_transitions(&mut self) {
        self.transitions += 1;
    }

    pub fn increment_blink_cycles(&mut self) {
        self.blink_cycles += 1;
    }

    /// Fraction of received frames the correlator dropped
    pub fn rejection_rate(&self) -> f64 {
        if self.frames_received == 0 {
            return 0.0;
        }
        self.frames_rejected as f64 / self.frames_received as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_clear() {
        let mut stats = AttackStatistics::new();
        stats.increment_frames_received();
        stats.increment_frames_received();
        stats.increment_frames_rejected();
        stats.increment_blink_cycles();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.rejection_rate(), 0.5);
        assert_eq!(stats.blink_cycles, 1);

        stats.clear();
        assert_eq!(stats, AttackStatistics::default());
        assert_eq!(stats.rejection_rate(), 0.0);
    }
}
