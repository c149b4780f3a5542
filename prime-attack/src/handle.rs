//! Running an attack in the background
//!
//! `spawn` wires an attack to its transport, starts it and moves the driver
//! loop into a tokio task. The returned `AttackHandle` is how the operator
//! talks to it: commands go in, events come out, and `join` yields the final
//! report.

use crate::driver::BlinkAttack;
use crate::event::AttackEvent;
use crate::state::AttackState;
use crate::statistics::AttackStatistics;
use prime_asn1::{ApduBuilder, DlmsApduBuilder};
use prime_core::{AttackConfig, PrimeError, PrimeResult};
use prime_transport::{delivery_channel, FrameTransport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Release the target, then stop
    Cancel,
    /// Stop immediately
    End,
}

/// How an attack finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    Completed,
    Cancelled,
    TimedOut,
}

/// Final report of an attack
#[derive(Debug, Clone, PartialEq)]
pub struct AttackReport {
    pub outcome: AttackOutcome,
    pub final_state: AttackState,
    pub cancelled: bool,
    pub statistics: AttackStatistics,
}

/// Handle to a spawned attack
///
/// Dropping the handle ends the attack.
pub struct AttackHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<AttackEvent>,
    task: JoinHandle<PrimeResult<AttackReport>>,
}

impl AttackHandle {
    /// Request a graceful release
    pub fn cancel(&self) -> PrimeResult<()> {
        self.send(Command::Cancel)
    }

    /// Stop the attack
    pub fn end(&self) -> PrimeResult<()> {
        self.send(Command::End)
    }

    fn send(&self, command: Command) -> PrimeResult<()> {
        self.commands.send(command).map_err(|_| PrimeError::Closed)
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the attack has finished and every event has been
    /// read.
    pub async fn next_event(&mut self) -> Option<AttackEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<AttackEvent> {
        self.events.try_recv().ok()
    }

    /// Whether the driver task has returned
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the attack to finish
    ///
    /// # Errors
    /// The driver's own error, or `PrimeError::Protocol` if the task panicked
    /// or was aborted.
    pub async fn join(self) -> PrimeResult<AttackReport> {
        self.task
            .await
            .map_err(|e| PrimeError::Protocol(format!("Attack task failed: {}", e)))?
    }
}

/// Start an attack with the default DLMS codec
///
/// Must be called from within a tokio runtime.
pub fn spawn<T>(config: AttackConfig, transport: T) -> PrimeResult<AttackHandle>
where
    T: FrameTransport + 'static,
{
    spawn_with_builder(config, transport, DlmsApduBuilder::new())
}

/// Start an attack with a custom APDU codec
///
/// # Errors
/// Configuration errors, subscription errors from the transport, or
/// `PrimeError::Transport` outside a tokio runtime.
pub fn spawn_with_builder<T, B>(
    config: AttackConfig,
    transport: T,
    builder: B,
) -> PrimeResult<AttackHandle>
where
    T: FrameTransport + 'static,
    B: ApduBuilder + 'static,
{
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| PrimeError::Transport(format!("No async runtime: {}", e)))?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let mut attack = BlinkAttack::with_builder(config, transport, builder, event_tx)?;

    let (delivery, inbox) = delivery_channel();
    attack.subscribe(delivery)?;
    attack.start()?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let task = runtime.spawn(attack.run(inbox, command_rx));

    Ok(AttackHandle {
        commands: command_tx,
        events: event_rx,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{reply_to, sent_tag, target, ACTION_SUCCESS, AARE_ACCEPTED, EXCEPTION};
    use prime_transport::channel_transport;
    use std::time::Duration;

    /// Read events up to the terminal one
    async fn until_terminal(handle: &mut AttackHandle) -> AttackEvent {
        loop {
            match handle.next_event().await {
                Some(event) if event.is_terminal() => return event,
                Some(_) => {}
                None => panic!("no terminal event"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_target_times_out() {
        let (transport, mut peer) = channel_transport();
        let config = target()
            .with_timeout(Duration::from_millis(5_500))
            .with_resend_interval(Duration::from_secs(1));

        let mut handle = spawn(config.clone(), transport).unwrap();
        assert_eq!(until_terminal(&mut handle).await, AttackEvent::Timeout);

        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, AttackOutcome::TimedOut);
        assert_eq!(report.final_state, AttackState::Sequencing);

        let sent = peer.drain_sent();
        assert_eq!(sent.len(), 5);
        assert!(sent.iter().all(|raw| sent_tag(&config, raw) == 0x60));
        assert_eq!(report.statistics.probes_sent, 5);

        // The driver is gone: nothing more is sent
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(peer.try_recv_sent().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_meter_blinks_until_ended() {
        let (transport, mut peer) = channel_transport();
        let config = target();
        let mut handle = spawn(config.clone(), transport).unwrap();

        let meter_config = config.clone();
        let meter = tokio::spawn(async move {
            let mut answered = 0;
            while let Some(raw) = peer.recv_sent().await {
                let answer = match sent_tag(&meter_config, &raw) {
                    0x60 => AARE_ACCEPTED,
                    0xC3 => ACTION_SUCCESS,
                    _ => continue,
                };
                if peer.inject(reply_to(&meter_config, &raw, answer)).await.is_err() {
                    break;
                }
                answered += 1;
            }
            answered
        });

        let mut full_progress = 0;
        while full_progress < 4 {
            match handle.next_event().await {
                Some(AttackEvent::Progress(p)) if p == 1.0 => full_progress += 1,
                Some(_) => {}
                None => panic!("attack stopped early"),
            }
        }
        handle.end().unwrap();

        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, AttackOutcome::Completed);
        assert!(report.statistics.blink_cycles >= 1);
        assert!(report.statistics.frames_received >= 4);
        assert!(meter.await.unwrap() >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_response_releases() {
        let (transport, mut peer) = channel_transport();
        let config = target();
        let mut handle = spawn(config.clone(), transport).unwrap();

        let probe = peer.recv_sent().await.unwrap();
        peer.inject(reply_to(&config, &probe, EXCEPTION)).await.unwrap();
        let release = peer.recv_sent().await.unwrap();
        assert_eq!(sent_tag(&config, &release), 0x62);

        assert_eq!(until_terminal(&mut handle).await, AttackEvent::Completed);
        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, AttackOutcome::Completed);
        assert_eq!(report.final_state, AttackState::Completed);
        assert_eq!(report.statistics.protocol_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_through_handle() {
        let (transport, mut peer) = channel_transport();
        let config = target();
        let mut handle = spawn(config.clone(), transport).unwrap();

        let _probe = peer.recv_sent().await.unwrap();
        handle.cancel().unwrap();
        assert_eq!(sent_tag(&config, &peer.recv_sent().await.unwrap()), 0x62);

        assert_eq!(until_terminal(&mut handle).await, AttackEvent::Cancelled);
        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, AttackOutcome::Cancelled);
        assert!(report.cancelled);
    }

    #[tokio::test]
    async fn test_dropping_handle_ends_attack() {
        let (transport, mut peer) = channel_transport();
        let handle = spawn(target(), transport).unwrap();
        drop(handle);
        // The driver exits and drops the transport
        assert!(peer.recv_sent().await.is_none());
    }

    #[test]
    fn test_spawn_needs_runtime() {
        let (transport, _peer) = channel_transport();
        assert!(matches!(
            spawn(target(), transport),
            Err(PrimeError::Transport(_))
        ));
    }
}
