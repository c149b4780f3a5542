//! Start, cancel and end

use crate::driver::BlinkAttack;
use crate::event::AttackEvent;
use crate::sequence::SeqNo;
use crate::state::AttackState;
use prime_asn1::ApduBuilder;
use prime_core::{PrimeError, PrimeResult};
use prime_transport::FrameTransport;
use tokio::time::Instant;

impl<T: FrameTransport, B: ApduBuilder> BlinkAttack<T, B> {
    /// Whether the attack has been started and has not finished yet
    pub fn is_running(&self) -> bool {
        self.state != AttackState::Idle && !self.is_finished()
    }

    /// Start probing the target
    ///
    /// Zeroes the sequence counters, enters `Sequencing` and arms both
    /// timers. Nothing is sent before the first resend tick.
    ///
    /// # Errors
    /// `PrimeError::Protocol` if the attack is already running. A finished
    /// attack may be started again.
    pub fn start(&mut self) -> PrimeResult<()> {
        if self.is_running() {
            return Err(PrimeError::Protocol("Attack already running".to_string()));
        }

        self.sequence.reset();
        self.expected_ack = SeqNo::ZERO;
        self.current = None;
        self.cancelled = false;
        self.timed_out = false;
        self.ended = false;
        self.terminal_reported = false;
        self.statistics.clear();
        self.state = AttackState::Idle;

        log::info!(
            "Starting blink attack on {} LCID={} in {}",
            self.config().node_id(),
            self.config().conn_id(),
            self.config().sna()
        );
        self.emit(AttackEvent::Started);
        self.emit(AttackEvent::Progress(0.0));
        self.set_state(AttackState::Sequencing);

        let now = Instant::now();
        self.deadline.arm(now);
        self.resend.arm(now);
        self.status("Sending AARQ probes".to_string());
        Ok(())
    }

    /// Release the target and stop
    ///
    /// The deadline is stopped and the release request goes out right away;
    /// the attack reports `Cancelled` after the next resend tick. Has no
    /// effect on a finished attack.
    pub async fn cancel(&mut self) -> PrimeResult<()> {
        if self.is_finished() {
            log::debug!("Cancel ignored, attack already finished");
            return Ok(());
        }

        self.deadline.disarm();
        if !self.cancelled {
            self.cancelled = true;
            self.status("Attack cancelled".to_string());
        }
        if self.state == AttackState::Releasing {
            return Ok(());
        }
        self.enter(AttackState::Releasing).await
    }

    /// Stop both timers and report completion
    ///
    /// Idempotent. Completion is not reported if the attack already timed
    /// out, was cancelled or completed.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.resend.disarm();
        self.deadline.disarm();
        self.ended = true;
        self.current = None;
        log::info!("Attack ended in {}", self.state);
        self.report_terminal(AttackEvent::Completed);
    }
}

#[cfg(test)]
mod tests {
    use crate::driver::BlinkAttack;
    use crate::event::AttackEvent;
    use crate::handle::AttackOutcome;
    use crate::state::AttackState;
    use crate::testing::{sent_tag, target};
    use prime_transport::{channel_transport, ChannelPeer, ChannelTransport};
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    fn attack() -> (
        BlinkAttack<ChannelTransport>,
        ChannelPeer,
        mpsc::UnboundedReceiver<AttackEvent>,
    ) {
        let (transport, peer) = channel_transport();
        let (tx, rx) = mpsc::unbounded_channel();
        (BlinkAttack::new(target(), transport, tx).unwrap(), peer, rx)
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<AttackEvent>) -> Vec<AttackEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    #[tokio::test]
    async fn test_start_arms_timers() {
        let (mut attack, _peer, mut events) = attack();
        assert!(!attack.is_running());

        assert_ok!(attack.start());
        assert!(attack.is_running());
        assert_eq!(attack.state(), AttackState::Sequencing);
        assert_eq!(attack.sequence().pkt_id.value(), 0);
        assert!(attack.resend.is_armed());
        assert!(attack.deadline.is_armed());
        assert_err!(attack.start());

        assert_eq!(
            drain(&mut events),
            vec![
                AttackEvent::Started,
                AttackEvent::Progress(0.0),
                AttackEvent::Progress(0.5),
                AttackEvent::Status("Sending AARQ probes".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_while_sequencing() {
        let (mut attack, mut peer, mut events) = attack();
        attack.start().unwrap();
        attack.on_resend_tick().await.unwrap();
        peer.drain_sent();

        attack.cancel().await.unwrap();
        assert_eq!(attack.state(), AttackState::Releasing);
        assert!(attack.is_cancelled());
        assert!(!attack.deadline.is_armed());
        assert_eq!(sent_tag(&target(), &peer.try_recv_sent().unwrap()), 0x62);

        // A second cancel changes nothing
        attack.cancel().await.unwrap();
        assert!(peer.try_recv_sent().is_none());

        attack.on_resend_tick().await.unwrap();
        assert_eq!(sent_tag(&target(), &peer.try_recv_sent().unwrap()), 0x62);
        assert_eq!(attack.state(), AttackState::Completed);

        let events = drain(&mut events);
        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal, vec![&AttackEvent::Cancelled]);
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == AttackEvent::Status("Attack cancelled".to_string()))
                .count(),
            1
        );
        assert_eq!(attack.report().outcome, AttackOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_before_start_releases() {
        let (mut attack, mut peer, _events) = attack();
        attack.cancel().await.unwrap();
        assert_eq!(attack.state(), AttackState::Releasing);
        assert_eq!(sent_tag(&target(), &peer.try_recv_sent().unwrap()), 0x62);
    }

    #[tokio::test]
    async fn test_end_twice_reports_once() {
        let (mut attack, mut peer, mut events) = attack();
        attack.start().unwrap();
        drain(&mut events);

        attack.end();
        attack.end();
        assert!(!attack.resend.is_armed());
        assert!(!attack.deadline.is_armed());
        assert_eq!(drain(&mut events), vec![AttackEvent::Completed]);

        attack.on_resend_tick().await.unwrap();
        attack.cancel().await.unwrap();
        assert!(peer.try_recv_sent().is_none());
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_restart_after_finish() {
        let (mut attack, _peer, mut events) = attack();
        attack.start().unwrap();
        attack.on_deadline();
        assert!(!attack.is_running());

        assert_ok!(attack.start());
        assert!(!attack.is_timed_out());
        assert_eq!(attack.state(), AttackState::Sequencing);
        let events = drain(&mut events);
        assert_eq!(events.iter().filter(|e| **e == AttackEvent::Started).count(), 2);
    }
}
