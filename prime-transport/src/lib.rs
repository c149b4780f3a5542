//! Transport layer for PRIME attack tooling
//!
//! This crate provides the `FrameTransport` seam between the attack and the
//! power-line medium, the synchronous delivery channel used to push inbound
//! frames, an in-memory transport, and a UDP bridge transport.

pub mod channel;
pub mod delivery;
pub mod transport;
pub mod udp;

pub use channel::{channel_transport, ChannelPeer, ChannelTransport};
pub use delivery::{delivery_channel, FrameDelivery, FrameInbox, InboundFrame, PendingFrame};
pub use transport::FrameTransport;
pub use udp::{decode_datagram, encode_datagram, UdpSettings, UdpTransport, MAX_UDP_PAYLOAD_SIZE};
