//! Inbound frame correlation
//!
//! Power-line channels are shared and noisy: most frames reaching the
//! concentrator are either corrupt or meant for someone else. The correlator
//! filters them down to uplink answers from the target that acknowledge the
//! message in flight. A rejected frame is expected traffic, not an error.

use crate::sequence::{SeqNo, SequenceState};
use crate::state::AttackState;
use bytes::Bytes;
use prime_asn1::ApduTag;
use prime_core::AttackConfig;
use prime_mac::{PacketBody, PrimeFrame};
use prime_transport::InboundFrame;
use std::fmt;

/// An accepted response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlated {
    /// Leading byte of the APDU
    pub tag: u8,
    /// Whole APDU, tag included
    pub payload: Bytes,
}

impl Correlated {
    pub fn apdu_tag(&self) -> Option<ApduTag> {
        ApduTag::from_byte(self.tag)
    }
}

/// Why a frame was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Undecodable, truncated or failing a checksum
    Malformed(String),
    /// Control packet
    NotData,
    /// Sent by a base node or switch rather than by the meter
    Downlink,
    WrongSubnetwork,
    WrongConnection { lcid: u16 },
    WrongNode { sid: u8, lnid: u16 },
    /// PKTID does not acknowledge the message in flight
    UnexpectedPacket { expected: SeqNo, got: SeqNo },
    EmptyPayload,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Malformed(reason) => write!(f, "malformed frame: {}", reason),
            Rejection::NotData => write!(f, "control packet"),
            Rejection::Downlink => write!(f, "downlink frame"),
            Rejection::WrongSubnetwork => write!(f, "other subnetwork"),
            Rejection::WrongConnection { lcid } => write!(f, "other connection (LCID={})", lcid),
            Rejection::WrongNode { sid, lnid } => {
                write!(f, "other node (SID={}, LNID={})", sid, lnid)
            }
            Rejection::UnexpectedPacket { expected, got } => {
                write!(f, "PKTID={} while expecting {}", got, expected)
            }
            Rejection::EmptyPayload => write!(f, "empty payload"),
        }
    }
}

/// Match an inbound frame against the target and the message in flight
///
/// Outside `Idle` the inbound PKTID must equal `expected_ack`, the ACKID of
/// the last message sent. On acceptance `sequence` is resynchronised on the
/// frame's ARQ subheader; on rejection it is left untouched.
///
/// # Arguments
/// * `inbound` - Frame as delivered by the transport
/// * `config` - Target of the attack
/// * `expected_ack` - ACKID of the last transmitted message
/// * `state` - Current attack state
/// * `sequence` - Counters to update on acceptance
pub fn correlate(
    inbound: &InboundFrame,
    config: &AttackConfig,
    expected_ack: SeqNo,
    state: AttackState,
    sequence: &mut SequenceState,
) -> Result<Correlated, Rejection> {
    if inbound.source != config.sna() {
        return Err(Rejection::WrongSubnetwork);
    }
    if inbound.downlink {
        return Err(Rejection::Downlink);
    }

    let frame = PrimeFrame::decode(&inbound.source, &inbound.raw)
        .map_err(|e| Rejection::Malformed(e.to_string()))?;
    if frame.header.downlink {
        return Err(Rejection::Downlink);
    }

    let (arq, data) = match &frame.body {
        PacketBody::Data { arq, data, .. } => (arq, data),
        PacketBody::Control(_) => return Err(Rejection::NotData),
    };

    if frame.packet.lcid != config.conn_id().value() {
        return Err(Rejection::WrongConnection {
            lcid: frame.packet.lcid,
        });
    }
    if frame.packet.sid != config.node_id().sid() || frame.packet.lnid != config.node_id().lnid() {
        return Err(Rejection::WrongNode {
            sid: frame.packet.sid,
            lnid: frame.packet.lnid,
        });
    }

    let got = SeqNo::new(arq.pkt_id);
    if state != AttackState::Idle && got != expected_ack {
        return Err(Rejection::UnexpectedPacket {
            expected: expected_ack,
            got,
        });
    }

    let tag = *data.first().ok_or(Rejection::EmptyPayload)?;
    sequence.accept(arq);

    Ok(Correlated {
        tag,
        payload: data.clone(),
    })
}
