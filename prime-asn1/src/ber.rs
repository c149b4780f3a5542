//! BER encoder for the ACSE layer
//!
//! ACSE APDUs (AARQ, RLRQ) are BER encoded as nested TLV (Tag-Length-Value)
//! triplets:
//!
//! ```text
//! [Tag] [Length] [Value]
//! ```
//!
//! ## Tag Encoding
//!
//! ```text
//! Bits: 8 7 6 5 4 3 2 1
//!       C C P T T T T T
//! ```
//! - CC = Class (00=Universal, 01=Application, 10=Context, 11=Private)
//! - P = Primitive (0) or Constructed (1)
//! - TTTTT = Tag number (0-30), or 11111 for the extended form
//!
//! ## Length Encoding
//!
//! - **Short form** (1 byte) for lengths 0-127
//! - **Long form** for longer values: `0x80 | n` followed by `n` big-endian
//!   length bytes
//!
//! Only the encoding direction is needed: inbound responses are classified by
//! their leading tag and never decoded.

use prime_core::{PrimeError, PrimeResult};

/// BER tag class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BerTagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl BerTagClass {
    fn bits(self) -> u8 {
        match self {
            BerTagClass::Universal => 0x00,
            BerTagClass::Application => 0x40,
            BerTagClass::ContextSpecific => 0x80,
            BerTagClass::Private => 0xC0,
        }
    }
}

/// BER tag: class, constructed flag and tag number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BerTag {
    class: BerTagClass,
    constructed: bool,
    number: u32,
}

impl BerTag {
    /// Create a tag
    pub fn new(class: BerTagClass, constructed: bool, number: u32) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    /// Universal class tag
    pub fn universal(constructed: bool, number: u32) -> Self {
        Self::new(BerTagClass::Universal, constructed, number)
    }

    /// Application class tag
    pub fn application(constructed: bool, number: u32) -> Self {
        Self::new(BerTagClass::Application, constructed, number)
    }

    /// Context-specific class tag
    pub fn context_specific(constructed: bool, number: u32) -> Self {
        Self::new(BerTagClass::ContextSpecific, constructed, number)
    }

    /// Encode the tag octets
    ///
    /// Tag numbers above 30 use the extended form: the low five bits are all
    /// set and the number follows in base-128.
    pub fn encode(&self) -> Vec<u8> {
        let mut first = self.class.bits();
        if self.constructed {
            first |= 0x20;
        }

        if self.number <= 30 {
            return vec![first | self.number as u8];
        }

        let mut bytes = vec![first | 0x1F];
        bytes.extend_from_slice(&base128(self.number));
        bytes
    }
}

/// Encode a definite length
pub fn encode_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }

    let be = length.to_be_bytes();
    let skip = be.iter().take_while(|&&b| b == 0).count();
    let mut bytes = Vec::with_capacity(1 + be.len() - skip);
    bytes.push(0x80 | (be.len() - skip) as u8);
    bytes.extend_from_slice(&be[skip..]);
    bytes
}

fn base128(mut value: u32) -> Vec<u8> {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    groups.reverse();
    groups
}

/// Contents octets of an OBJECT IDENTIFIER, without tag and length
///
/// The first two arcs are packed as `40 * X + Y`, the rest in base-128.
/// ACSE carries the mechanism name as such bare contents under an implicit
/// context tag.
pub fn object_identifier_contents(oid: &[u32]) -> PrimeResult<Vec<u8>> {
    if oid.len() < 2 {
        return Err(PrimeError::Encoding(
            "Object identifier must have at least 2 components".to_string(),
        ));
    }

    let first = 40u32
        .checked_mul(oid[0])
        .and_then(|x| x.checked_add(oid[1]))
        .ok_or_else(|| PrimeError::Encoding("OID component too large".to_string()))?;

    let mut bytes = base128(first);
    for &component in &oid[2..] {
        bytes.extend_from_slice(&base128(component));
    }
    Ok(bytes)
}

/// BER encoder accumulating TLVs into a buffer
pub struct BerEncoder {
    buffer: Vec<u8>,
}

impl BerEncoder {
    /// Create a new BER encoder
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Encode a TLV triplet
    ///
    /// # Arguments
    /// * `tag` - BER tag
    /// * `value` - Value bytes (already encoded)
    pub fn encode_tlv(&mut self, tag: &BerTag, value: &[u8]) -> PrimeResult<()> {
        self.buffer.extend_from_slice(&tag.encode());
        self.buffer.extend_from_slice(&encode_length(value.len()));
        self.buffer.extend_from_slice(value);
        Ok(())
    }

    /// Encode an OCTET STRING (universal 4)
    pub fn encode_octet_string(&mut self, value: &[u8]) -> PrimeResult<()> {
        self.encode_tlv(&BerTag::universal(false, 4), value)
    }

    /// Encode an OBJECT IDENTIFIER (universal 6)
    pub fn encode_object_identifier(&mut self, oid: &[u32]) -> PrimeResult<()> {
        let contents = object_identifier_contents(oid)?;
        self.encode_tlv(&BerTag::universal(false, 6), &contents)
    }

    /// Encode a value under a context-specific tag
    pub fn encode_context_specific(
        &mut self,
        tag_number: u32,
        value: &[u8],
        constructed: bool,
    ) -> PrimeResult<()> {
        self.encode_tlv(&BerTag::context_specific(constructed, tag_number), value)
    }

    /// Encode a value under an application tag
    pub fn encode_application(
        &mut self,
        tag_number: u32,
        value: &[u8],
        constructed: bool,
    ) -> PrimeResult<()> {
        self.encode_tlv(&BerTag::application(constructed, tag_number), value)
    }

    /// Get the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for BerEncoder {
    fn default() -> Self {
        Self::new()
    }
}
