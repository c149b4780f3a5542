//! Attack state machine
//!
//! The attack walks the target through four phases:
//!
//! ```text
//! Sequencing --AARE--> Disconnecting --action ok--> Connecting
//!      |                   ^    |                       |
//!      |                   |    +------error----+       |
//!      |                   +----action ok-------|-------+
//!      +------error------------------------> Releasing <-- error
//!                                                | tick
//!                                            Completed
//! ```
//!
//! `transition` is the whole table: every `(state, event)` pair is matched
//! and yields the next state together with what the driver has to send.

use crate::composer::MessageKind;
use prime_asn1::ApduTag;

/// AARE returned by meters refusing the association
///
/// It carries the success tag, so it is recognised by its exact bytes. Any
/// other refusal sharing the tag is taken for an accepted association.
pub const AARE_REJECTION_TEMPLATE: [u8; 43] = [
    0x61, 0x29, 0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01, 0xA2, 0x03,
    0x02, 0x01, 0x01, 0xA3, 0x05, 0xA1, 0x03, 0x02, 0x01, 0x0D, 0xBE, 0x10, 0x04, 0x0E, 0x08,
    0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x1C, 0x1D, 0x00, 0x80, 0x00, 0x07,
];

/// Attack state
///
/// # State Transitions
/// ```text
/// Idle -> Sequencing (on start)
/// Sequencing -> Disconnecting (on accepted AARE)
/// Disconnecting -> Connecting (on action success)
/// Connecting -> Disconnecting (on action success)
/// any -> Releasing (on error response or cancel)
/// Releasing -> Completed (on resend tick)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttackState {
    /// Not started
    #[default]
    Idle,
    /// Probing the target with association requests
    Sequencing,
    /// Waiting for the answer to `remote_disconnect`
    Disconnecting,
    /// Waiting for the answer to `remote_reconnect`
    Connecting,
    /// Releasing the association
    Releasing,
    /// Release sent, nothing left to do
    Completed,
}

impl AttackState {
    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackState::Idle => "Idle",
            AttackState::Sequencing => "Sequencing",
            AttackState::Disconnecting => "Disconnecting",
            AttackState::Connecting => "Connecting",
            AttackState::Releasing => "Releasing",
            AttackState::Completed => "Completed",
        }
    }

    /// Coarse progress reported on entry, if the state has one
    pub fn progress(&self) -> Option<f32> {
        match self {
            AttackState::Idle => Some(0.0),
            AttackState::Sequencing => Some(0.5),
            AttackState::Disconnecting | AttackState::Connecting => Some(1.0),
            AttackState::Releasing | AttackState::Completed => None,
        }
    }

    /// Message sent in this state
    pub fn message_kind(&self) -> Option<MessageKind> {
        match self {
            AttackState::Sequencing => Some(MessageKind::AssociationRequest),
            AttackState::Disconnecting => Some(MessageKind::DisconnectRequest),
            AttackState::Connecting => Some(MessageKind::ConnectRequest),
            AttackState::Releasing => Some(MessageKind::ReleaseRequest),
            AttackState::Idle | AttackState::Completed => None,
        }
    }
}

impl std::fmt::Display for AttackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a correlated response means to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// confirmedServiceError or exception-response
    Error,
    AssociationAccepted,
    /// AARE equal to the rejection template
    AssociationRejected,
    /// action-response
    MethodSuccess,
    Other,
}

impl ResponseClass {
    /// Classify a response by its leading tag
    pub fn classify(tag: u8, payload: &[u8]) -> Self {
        match ApduTag::from_byte(tag) {
            Some(tag) if tag.is_error() => ResponseClass::Error,
            Some(ApduTag::Aare) if payload == &AARE_REJECTION_TEMPLATE[..] => {
                ResponseClass::AssociationRejected
            }
            Some(ApduTag::Aare) => ResponseClass::AssociationAccepted,
            Some(ApduTag::ActionResponse) => ResponseClass::MethodSuccess,
            _ => ResponseClass::Other,
        }
    }
}

/// Input of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Response(ResponseClass),
    /// Resend timer fired
    Tick,
}

/// Output of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Enter the next state: compose and send its message
    Enter,
    /// Send an association request with the current counters, then advance
    /// them
    Probe,
    /// Resend the current message unchanged
    Retransmit,
    /// Resend the release, stop the timers and report the end
    Finish,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: AttackState,
    pub action: Action,
}

impl Transition {
    fn to(next: AttackState, action: Action) -> Self {
        Self { next, action }
    }

    fn stay(state: AttackState, action: Action) -> Self {
        Self { next: state, action }
    }
}

/// Transition table
pub fn transition(state: AttackState, event: Event) -> Transition {
    use AttackState::*;
    use ResponseClass::*;

    match (state, event) {
        (Idle | Completed, _) => Transition::stay(state, Action::Ignore),

        (Sequencing, Event::Response(Error)) => Transition::to(Releasing, Action::Enter),
        (Sequencing, Event::Response(AssociationAccepted)) => {
            Transition::to(Disconnecting, Action::Enter)
        }
        (Sequencing, Event::Response(AssociationRejected | MethodSuccess | Other)) => {
            Transition::stay(Sequencing, Action::Probe)
        }
        (Sequencing, Event::Tick) => Transition::stay(Sequencing, Action::Probe),

        (Disconnecting | Connecting, Event::Response(Error)) => {
            Transition::to(Releasing, Action::Enter)
        }
        (Disconnecting, Event::Response(MethodSuccess)) => {
            Transition::to(Connecting, Action::Enter)
        }
        (Connecting, Event::Response(MethodSuccess)) => {
            Transition::to(Disconnecting, Action::Enter)
        }
        (
            Disconnecting | Connecting,
            Event::Response(AssociationAccepted | AssociationRejected | Other),
        ) => Transition::stay(state, Action::Ignore),
        (Disconnecting | Connecting, Event::Tick) => Transition::stay(state, Action::Retransmit),

        (Releasing, Event::Response(_)) => Transition::stay(Releasing, Action::Ignore),
        (Releasing, Event::Tick) => Transition::to(Completed, Action::Finish),
    }
}
