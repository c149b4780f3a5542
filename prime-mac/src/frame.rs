//! PRIME MAC generic frame structure and encoding/decoding
//!
//! # Frame Layout
//!
//! ```text
//! +----------------+---------------+------------------------------+--------+
//! | Generic header | Packet header | Packet body (LEN bytes)      | CRC    |
//! | 3 bytes        | 6 bytes       | ARQ | SAR | CL | data        | 4 bytes|
//! +----------------+---------------+------------------------------+--------+
//! ```
//!
//! Generic header (16 bits + HCS):
//! `unused:2 | HT:2 | reserved:5 | DO:1 | LEVEL:6 | HCS:8`
//!
//! Packet header (48 bits):
//! `reserved:3 | NAD:1 | PRIO:2 | C:1 | LCID:9 | SID:8 | LNID:14 | SPAD:1 | LEN:9`
//!
//! Data packets on ARQ connections carry an ARQ subheader, a SAR byte and a
//! three byte convergence-layer header before the data. Control packets
//! (C = 1) carry an opaque body.
//!
//! The CRC covers the SNA of the subnetwork followed by every frame byte, so
//! both encoding and decoding need the SNA.

use crate::crc::{CrcCalc, HcsCalc};
use bytes::{BufMut, Bytes, BytesMut};
use prime_core::{PrimeError, PrimeResult, Sna};
use std::fmt;

/// Generic header length, HCS included
pub const GENERIC_HEADER_LEN: usize = 3;

/// Packet header length
pub const PACKET_HEADER_LEN: usize = 6;

/// CRC length
pub const CRC_LEN: usize = 4;

/// Largest value of the 9-bit LEN field
pub const MAX_PACKET_LEN: usize = 0x1FF;

/// MAC header type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    Generic,
    Promotion,
    Beacon,
    Reserved,
}

impl HeaderType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => HeaderType::Generic,
            1 => HeaderType::Promotion,
            2 => HeaderType::Beacon,
            _ => HeaderType::Reserved,
        }
    }

    fn bits(self) -> u8 {
        match self {
            HeaderType::Generic => 0,
            HeaderType::Promotion => 1,
            HeaderType::Beacon => 2,
            HeaderType::Reserved => 3,
        }
    }
}

/// Generic MAC header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericHeader {
    pub header_type: HeaderType,
    /// Direction: `true` for downlink (base node to service node)
    pub downlink: bool,
    /// Switch level of the packet (6 bits)
    pub level: u8,
}

impl GenericHeader {
    fn encode(&self) -> [u8; GENERIC_HEADER_LEN] {
        let word = (u16::from(self.header_type.bits()) << 12)
            | (u16::from(self.downlink) << 6)
            | u16::from(self.level & 0x3F);
        let [b0, b1] = word.to_be_bytes();
        let mut hcs = HcsCalc::new();
        hcs.update_bytes(&[b0, b1]);
        [b0, b1, hcs.value()]
    }

    fn decode(bytes: &[u8]) -> PrimeResult<Self> {
        let mut hcs = HcsCalc::new();
        hcs.update_bytes(&bytes[..2]);
        hcs.validate(bytes[2])?;

        let word = u16::from_be_bytes([bytes[0], bytes[1]]);
        Ok(Self {
            header_type: HeaderType::from_bits((word >> 12) as u8),
            downlink: word & 0x0040 != 0,
            level: (word & 0x3F) as u8,
        })
    }
}

/// Packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// No aggregation at destination
    pub nad: bool,
    /// Priority (2 bits)
    pub priority: u8,
    /// Control packet flag
    pub control: bool,
    /// Local connection identifier, or control type when `control` is set (9 bits)
    pub lcid: u16,
    /// Switch identifier
    pub sid: u8,
    /// Local node identifier (14 bits)
    pub lnid: u16,
    /// Padding flag
    pub spad: bool,
    /// Body length in bytes, CRC excluded (9 bits)
    pub len: u16,
}

impl PacketHeader {
    fn encode(&self) -> [u8; PACKET_HEADER_LEN] {
        let value = (u64::from(self.nad) << 44)
            | (u64::from(self.priority & 0x03) << 42)
            | (u64::from(self.control) << 41)
            | (u64::from(self.lcid & 0x1FF) << 32)
            | (u64::from(self.sid) << 24)
            | (u64::from(self.lnid & 0x3FFF) << 10)
            | (u64::from(self.spad) << 9)
            | u64::from(self.len & 0x1FF);
        let be = value.to_be_bytes();
        let mut bytes = [0u8; PACKET_HEADER_LEN];
        bytes.copy_from_slice(&be[2..]);
        bytes
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut be = [0u8; 8];
        be[2..].copy_from_slice(&bytes[..PACKET_HEADER_LEN]);
        let value = u64::from_be_bytes(be);
        Self {
            nad: (value >> 44) & 0x01 != 0,
            priority: ((value >> 42) & 0x03) as u8,
            control: (value >> 41) & 0x01 != 0,
            lcid: ((value >> 32) & 0x1FF) as u16,
            sid: ((value >> 24) & 0xFF) as u8,
            lnid: ((value >> 10) & 0x3FFF) as u16,
            spad: (value >> 9) & 0x01 != 0,
            len: (value & 0x1FF) as u16,
        }
    }
}

/// ARQ subheader
///
/// # Byte Layout
/// Every byte carries a "more" flag (M, bit 7) telling whether another ARQ
/// byte follows:
/// - first byte: `M | FLUSH | PKTID:6`
/// - acknowledgement: `M | 0 | ACKID:6` (first such byte)
/// - window size: `M | 1 | 0 | WINSIZE:5`
/// - negative acknowledgements: `M | 0 | NACKID:6` (every further such byte)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArqHeader {
    pub pkt_id: u8,
    pub flush: bool,
    pub ack_id: Option<u8>,
    pub win_size: Option<u8>,
    pub nack_ids: Vec<u8>,
}

impl ArqHeader {
    const MORE: u8 = 0x80;

    /// Encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        1 + usize::from(self.ack_id.is_some())
            + usize::from(self.win_size.is_some())
            + self.nack_ids.len()
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        let mut fields = vec![(u8::from(self.flush) << 6) | (self.pkt_id & 0x3F)];
        if let Some(ack) = self.ack_id {
            fields.push(ack & 0x3F);
        }
        if let Some(win) = self.win_size {
            fields.push(0x40 | (win & 0x1F));
        }
        for nack in &self.nack_ids {
            fields.push(nack & 0x3F);
        }

        let last = fields.len() - 1;
        for (i, field) in fields.into_iter().enumerate() {
            buf.put_u8(if i < last { field | Self::MORE } else { field });
        }
    }

    /// Parse the ARQ bytes at the start of `body`, returning the header and
    /// the number of bytes consumed
    fn decode(body: &[u8]) -> PrimeResult<(Self, usize)> {
        let first = *body
            .first()
            .ok_or_else(|| PrimeError::FrameInvalid("Missing ARQ subheader".to_string()))?;

        let mut arq = ArqHeader {
            pkt_id: first & 0x3F,
            flush: first & 0x40 != 0,
            ..Default::default()
        };

        let mut pos = 1;
        let mut more = first & Self::MORE != 0;
        while more {
            let byte = *body.get(pos).ok_or_else(|| {
                PrimeError::FrameInvalid("Truncated ARQ subheader".to_string())
            })?;
            pos += 1;
            more = byte & Self::MORE != 0;

            if byte & 0x40 != 0 {
                arq.win_size = Some(byte & 0x1F);
            } else if arq.ack_id.is_none() {
                arq.ack_id = Some(byte & 0x3F);
            } else {
                arq.nack_ids.push(byte & 0x3F);
            }
        }

        Ok((arq, pos))
    }
}

/// SAR segment type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SarType {
    First,
    Intermediate,
    Last,
    Reserved,
}

/// Segmentation and reassembly header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarHeader {
    pub sar_type: SarType,
    /// NSEGS in the first segment, segment number otherwise (6 bits)
    pub value: u8,
}

impl SarHeader {
    /// Single unsegmented packet
    pub fn single() -> Self {
        Self {
            sar_type: SarType::First,
            value: 0,
        }
    }

    fn encode(&self) -> u8 {
        let ty = match self.sar_type {
            SarType::First => 0,
            SarType::Intermediate => 1,
            SarType::Last => 2,
            SarType::Reserved => 3,
        };
        (ty << 6) | (self.value & 0x3F)
    }

    fn decode(byte: u8) -> Self {
        let sar_type = match byte >> 6 {
            0 => SarType::First,
            1 => SarType::Intermediate,
            2 => SarType::Last,
            _ => SarType::Reserved,
        };
        Self {
            sar_type,
            value: byte & 0x3F,
        }
    }
}

/// Convergence-layer header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClHeader {
    pub kind: u8,
    pub source: u8,
    pub destination: u8,
}

impl ClHeader {
    pub const LEN: usize = 3;
}

/// Packet body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketBody {
    /// Data packet on an ARQ connection
    Data {
        arq: ArqHeader,
        sar: SarHeader,
        cl: ClHeader,
        data: Bytes,
    },
    /// Control packet
    Control(Bytes),
}

impl PacketBody {
    /// Encoded length in bytes, i.e. the value LEN must carry
    pub fn encoded_len(&self) -> usize {
        match self {
            PacketBody::Data { arq, data, .. } => arq.encoded_len() + 1 + ClHeader::LEN + data.len(),
            PacketBody::Control(body) => body.len(),
        }
    }
}

/// PRIME MAC frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeFrame {
    pub header: GenericHeader,
    pub packet: PacketHeader,
    pub body: PacketBody,
}

impl PrimeFrame {
    /// ARQ subheader of a data packet
    pub fn arq(&self) -> Option<&ArqHeader> {
        match &self.body {
            PacketBody::Data { arq, .. } => Some(arq),
            PacketBody::Control(_) => None,
        }
    }

    /// Data of a data packet
    pub fn data(&self) -> Option<&Bytes> {
        match &self.body {
            PacketBody::Data { data, .. } => Some(data),
            PacketBody::Control(_) => None,
        }
    }

    /// Encode the frame for the subnetwork `sna`
    ///
    /// # Errors
    /// Returns `PrimeError::Encoding` if LEN does not match the body or the
    /// body exceeds the 9-bit LEN field.
    pub fn encode(&self, sna: &Sna) -> PrimeResult<Bytes> {
        let body_len = self.body.encoded_len();
        if body_len > MAX_PACKET_LEN {
            return Err(PrimeError::Encoding(format!(
                "Packet body of {} bytes exceeds LEN field",
                body_len
            )));
        }
        if usize::from(self.packet.len) != body_len {
            return Err(PrimeError::Encoding(format!(
                "LEN is {} but body has {} bytes",
                self.packet.len, body_len
            )));
        }

        let mut buf =
            BytesMut::with_capacity(GENERIC_HEADER_LEN + PACKET_HEADER_LEN + body_len + CRC_LEN);
        buf.put_slice(&self.header.encode());
        buf.put_slice(&self.packet.encode());

        match &self.body {
            PacketBody::Data { arq, sar, cl, data } => {
                arq.encode_into(&mut buf);
                buf.put_u8(sar.encode());
                buf.put_slice(&[cl.kind, cl.source, cl.destination]);
                buf.put_slice(data);
            }
            PacketBody::Control(body) => buf.put_slice(body),
        }

        let mut crc = CrcCalc::new();
        crc.update_bytes(sna.as_bytes());
        crc.update_bytes(&buf);
        buf.put_slice(&crc.value_bytes());

        Ok(buf.freeze())
    }

    /// Decode a frame received on the subnetwork `sna`
    ///
    /// # Errors
    /// Returns `PrimeError::FrameInvalid` for truncated input, a non-generic
    /// header, a bad HCS or CRC, or a LEN inconsistent with the frame size.
    pub fn decode(sna: &Sna, raw: &[u8]) -> PrimeResult<Self> {
        let min_len = GENERIC_HEADER_LEN + PACKET_HEADER_LEN + CRC_LEN;
        if raw.len() < min_len {
            return Err(PrimeError::FrameInvalid(format!(
                "Frame too short: {} bytes",
                raw.len()
            )));
        }

        let header = GenericHeader::decode(&raw[..GENERIC_HEADER_LEN])?;
        if header.header_type != HeaderType::Generic {
            return Err(PrimeError::FrameInvalid(format!(
                "Unsupported header type {:?}",
                header.header_type
            )));
        }

        let packet = PacketHeader::decode(&raw[GENERIC_HEADER_LEN..]);
        let body_start = GENERIC_HEADER_LEN + PACKET_HEADER_LEN;
        let body_end = body_start + usize::from(packet.len);
        if body_end + CRC_LEN != raw.len() {
            return Err(PrimeError::FrameInvalid(format!(
                "LEN {} inconsistent with frame of {} bytes",
                packet.len,
                raw.len()
            )));
        }

        let mut crc = CrcCalc::new();
        crc.update_bytes(sna.as_bytes());
        crc.update_bytes(&raw[..body_end]);
        let received = u32::from_be_bytes([
            raw[body_end],
            raw[body_end + 1],
            raw[body_end + 2],
            raw[body_end + 3],
        ]);
        crc.validate(received)?;

        let body = &raw[body_start..body_end];
        let body = if packet.control {
            PacketBody::Control(Bytes::copy_from_slice(body))
        } else {
            let (arq, mut pos) = ArqHeader::decode(body)?;
            if body.len() < pos + 1 + ClHeader::LEN {
                return Err(PrimeError::FrameInvalid(
                    "Truncated SAR/CL headers".to_string(),
                ));
            }
            let sar = SarHeader::decode(body[pos]);
            pos += 1;
            let cl = ClHeader {
                kind: body[pos],
                source: body[pos + 1],
                destination: body[pos + 2],
            };
            pos += ClHeader::LEN;
            PacketBody::Data {
                arq,
                sar,
                cl,
                data: Bytes::copy_from_slice(&body[pos..]),
            }
        };

        Ok(Self {
            header,
            packet,
            body,
        })
    }
}

impl fmt::Display for PrimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} SID={} LNID={} LCID={} LEN={}",
            if self.header.downlink { "DL" } else { "UL" },
            self.packet.sid,
            self.packet.lnid,
            self.packet.lcid,
            self.packet.len
        )?;
        if let Some(arq) = self.arq() {
            write!(f, " PKTID={}", arq.pkt_id)?;
            if let Some(ack) = arq.ack_id {
                write!(f, " ACKID={}", ack)?;
            }
            if !arq.nack_ids.is_empty() {
                write!(f, " NACK={:?}", arq.nack_ids)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sna() -> Sna {
        Sna::new([0x40, 0x40, 0x22, 0x00, 0x00, 0x01])
    }

    fn data_frame(data: &[u8]) -> PrimeFrame {
        let arq = ArqHeader {
            pkt_id: 5,
            flush: false,
            ack_id: Some(7),
            win_size: Some(0x10),
            nack_ids: Vec::new(),
        };
        let body = PacketBody::Data {
            arq,
            sar: SarHeader::single(),
            cl: ClHeader {
                kind: 0x90,
                source: 1,
                destination: 2,
            },
            data: Bytes::copy_from_slice(data),
        };
        PrimeFrame {
            header: GenericHeader {
                header_type: HeaderType::Generic,
                downlink: true,
                level: 2,
            },
            packet: PacketHeader {
                nad: true,
                priority: 2,
                control: false,
                lcid: 0x102,
                sid: 1,
                lnid: 0x0023,
                spad: false,
                len: (data.len() + 7) as u16,
            },
            body,
        }
    }

    #[test]
    fn test_header_bit_layout() {
        let raw = data_frame(&[0x62, 0x00]).encode(&sna()).unwrap();

        // HT=0, DO=1, LEVEL=2
        assert_eq!(&raw[..2], &[0x00, 0x42]);

        // NAD=1, PRIO=2, C=0, LCID=0x102, SID=1, LNID=0x23, LEN=9
        let expected: u64 = (1 << 44) | (2 << 42) | (0x102 << 32) | (1 << 24) | (0x23 << 10) | 9;
        assert_eq!(&raw[3..9], &expected.to_be_bytes()[2..]);

        // ARQ: PKTID with M, ACKID with M, WINSIZE last
        assert_eq!(&raw[9..12], &[0x85, 0x87, 0x50]);
        // SAR, CL
        assert_eq!(&raw[12..16], &[0x00, 0x90, 0x01, 0x02]);
        assert_eq!(&raw[16..18], &[0x62, 0x00]);
        assert_eq!(raw.len(), 18 + CRC_LEN);
    }

    #[test]
    fn test_decode_encoded_frame() {
        let frame = data_frame(&[0x61, 0x03, 0xAA, 0xBB, 0xCC]);
        let raw = frame.encode(&sna()).unwrap();
        let decoded = PrimeFrame::decode(&sna(), &raw).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.data().unwrap().as_ref(), &[0x61, 0x03, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_decode_nack_list() {
        let mut frame = data_frame(&[0xC7]);
        if let PacketBody::Data { arq, .. } = &mut frame.body {
            arq.nack_ids = vec![3, 4];
        }
        frame.packet.len += 2;
        let raw = frame.encode(&sna()).unwrap();
        let decoded = PrimeFrame::decode(&sna(), &raw).unwrap();
        let arq = decoded.arq().unwrap();
        assert_eq!(arq.ack_id, Some(7));
        assert_eq!(arq.nack_ids, vec![3, 4]);
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let raw = data_frame(&[0x61]).encode(&sna()).unwrap();

        let mut bad_hcs = raw.to_vec();
        bad_hcs[2] ^= 0xFF;
        assert!(PrimeFrame::decode(&sna(), &bad_hcs).is_err());

        let mut bad_crc = raw.to_vec();
        let last = bad_crc.len() - 1;
        bad_crc[last] ^= 0x01;
        assert!(PrimeFrame::decode(&sna(), &bad_crc).is_err());

        let other_sna = Sna::new([0; 6]);
        assert!(PrimeFrame::decode(&other_sna, &raw).is_err());

        assert!(PrimeFrame::decode(&sna(), &raw[..raw.len() - 1]).is_err());
        assert!(PrimeFrame::decode(&sna(), &raw[..5]).is_err());
    }

    #[test]
    fn test_decode_rejects_beacon() {
        let mut frame = data_frame(&[0x61]);
        frame.header.header_type = HeaderType::Beacon;
        let raw = frame.encode(&sna()).unwrap();
        assert!(PrimeFrame::decode(&sna(), &raw).is_err());
    }

    #[test]
    fn test_encode_rejects_wrong_len() {
        let mut frame = data_frame(&[0x61]);
        frame.packet.len += 1;
        assert!(frame.encode(&sna()).is_err());
    }

    #[test]
    fn test_control_packet() {
        let frame = PrimeFrame {
            header: GenericHeader {
                header_type: HeaderType::Generic,
                downlink: false,
                level: 0,
            },
            packet: PacketHeader {
                nad: false,
                priority: 0,
                control: true,
                lcid: 3,
                sid: 0,
                lnid: 1,
                spad: false,
                len: 2,
            },
            body: PacketBody::Control(Bytes::from_static(&[0x01, 0x02])),
        };
        let raw = frame.encode(&sna()).unwrap();
        let decoded = PrimeFrame::decode(&sna(), &raw).unwrap();
        assert_eq!(decoded, frame);
        assert!(decoded.arq().is_none());
        assert!(decoded.data().is_none());
    }
}
