//! Shared fixtures for the unit tests: a target and a meter answering it

use bytes::Bytes;
use prime_core::{AttackConfig, ConnId, Credential, NodeId, Sna};
use prime_mac::{
    ArqHeader, ClHeader, GenericHeader, HeaderType, PacketBody, PacketHeader, PrimeFrame,
    SarHeader,
};
use prime_transport::InboundFrame;

pub const TARGET_SNA: Sna = Sna::new([0x40, 0x40, 0x22, 0x00, 0x00, 0x01]);

/// Successful AARE, shorter than the rejection template
pub const AARE_ACCEPTED: &[u8] = &[
    0x61, 0x0B, 0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01,
];

/// Action-Response-Normal, success
pub const ACTION_SUCCESS: &[u8] = &[0xC7, 0x01, 0xC1, 0x00];

/// Exception-Response
pub const EXCEPTION: &[u8] = &[0xD8, 0x01, 0x01];

pub fn target() -> AttackConfig {
    AttackConfig::new(
        TARGET_SNA,
        NodeId::from_parts(1, 0x23).unwrap(),
        ConnId::new(0x102).unwrap(),
    )
    .with_credential(Credential::new("00000001"))
}

/// Uplink data frame as the target would send it
pub struct Response {
    pub sna: Sna,
    pub lcid: u16,
    pub sid: u8,
    pub lnid: u16,
    pub downlink: bool,
    pub arq: ArqHeader,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn new(config: &AttackConfig, pkt_id: u8, ack_id: u8, payload: &[u8]) -> Self {
        Self {
            sna: config.sna(),
            lcid: config.conn_id().value(),
            sid: config.node_id().sid(),
            lnid: config.node_id().lnid(),
            downlink: false,
            arq: ArqHeader {
                pkt_id,
                flush: false,
                ack_id: Some(ack_id),
                win_size: None,
                nack_ids: Vec::new(),
            },
            payload: payload.to_vec(),
        }
    }

    pub fn frame(&self) -> PrimeFrame {
        let data = Bytes::copy_from_slice(&self.payload);
        let len = self.arq.encoded_len() + 1 + ClHeader::LEN + data.len();
        PrimeFrame {
            header: GenericHeader {
                header_type: HeaderType::Generic,
                downlink: self.downlink,
                level: 0,
            },
            packet: PacketHeader {
                nad: false,
                priority: 2,
                control: false,
                lcid: self.lcid,
                sid: self.sid,
                lnid: self.lnid,
                spad: false,
                len: len as u16,
            },
            body: PacketBody::Data {
                arq: self.arq.clone(),
                sar: SarHeader::single(),
                cl: ClHeader {
                    kind: 0x90,
                    source: 1,
                    destination: 1,
                },
                data,
            },
        }
    }

    pub fn inbound(&self) -> InboundFrame {
        let raw = self.frame().encode(&self.sna).unwrap();
        InboundFrame::new(self.sna, false, raw)
    }
}

/// Answer to a message the attack sent, stamped the way a meter in sync
/// would: PKTID echoes the ACKID received, ACKID acknowledges the PKTID
pub fn reply_to(config: &AttackConfig, sent: &[u8], payload: &[u8]) -> InboundFrame {
    let frame = PrimeFrame::decode(&config.sna(), sent).unwrap();
    let arq = frame.arq().unwrap();
    Response::new(
        config,
        arq.ack_id.unwrap(),
        (arq.pkt_id + 1) & 0x3F,
        payload,
    )
    .inbound()
}

/// Leading APDU byte of a frame the attack sent
pub fn sent_tag(config: &AttackConfig, sent: &[u8]) -> u8 {
    let frame = PrimeFrame::decode(&config.sna(), sent).unwrap();
    frame.data().unwrap()[0]
}
