//! PRIME MAC layer frames
//!
//! This crate encodes and decodes the generic MAC frames exchanged between a
//! base node and the service nodes of a PRIME subnetwork, including the ARQ,
//! SAR and convergence-layer subheaders of data packets, and the HCS/CRC
//! checksums protecting them.

pub mod crc;
pub mod frame;

pub use crc::{CrcCalc, HcsCalc};
pub use frame::{
    ArqHeader, ClHeader, GenericHeader, HeaderType, PacketBody, PacketHeader, PrimeFrame,
    SarHeader, SarType, CRC_LEN, GENERIC_HEADER_LEN, MAX_PACKET_LEN, PACKET_HEADER_LEN,
};
