//! Addressing identifiers of a PRIME subnetwork
//!
//! A service node inside a PRIME subnetwork is reached through:
//! - the **SNA** (subnetwork address), the 6-byte EUI-48 of the base node
//! - the **node id**, made of the switch identifier (SID, 8 bits) and the
//!   local node identifier (LNID, 14 bits)
//! - the **connection id** (LCID, 9 bits) of the established MAC connection
//! - the **switch level** (6 bits) the node hangs from
//!
//! Textual forms accepted by the configuration layer are hexadecimal, the way
//! management tools print them: `"40:40:22:00:00:01"` for an SNA and
//! `"0x4001"` or `"4001"` for ids.

use crate::error::{PrimeError, PrimeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subnetwork address (EUI-48 of the base node)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sna([u8; 6]);

impl Sna {
    /// Create an SNA from raw bytes
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build an SNA from the 48 low bits of a numeric concentrator id
    ///
    /// The most significant byte of the id lands in the first SNA byte.
    pub fn from_id(id: u64) -> Self {
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (id >> ((5 - i) * 8)) as u8;
        }
        Self(bytes)
    }

    /// Get the SNA as a byte array
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl FromStr for Sna {
    type Err = PrimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .collect();

        if digits.len() != 12 || !digits.is_ascii() {
            return Err(PrimeError::Config(format!(
                "SNA must be 6 bytes, got \"{}\"",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| PrimeError::Config(format!("Invalid SNA byte in \"{}\"", s)))?;
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Sna {
    type Error = PrimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sna> for String {
    fn from(sna: Sna) -> Self {
        sna.to_string()
    }
}

impl fmt::Display for Sna {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for Sna {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sna({})", self)
    }
}

/// Numeric configuration field given either as a number or a hex string
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericField {
    Number(u64),
    Text(String),
}

impl NumericField {
    fn value(self, field: &str) -> PrimeResult<u64> {
        match self {
            NumericField::Number(n) => Ok(n),
            NumericField::Text(text) => parse_hex(&text)
                .ok_or_else(|| PrimeError::Config(format!("Invalid {}: \"{}\"", field, text))),
        }
    }
}

fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

/// Node identifier: switch id (SID) and local node id (LNID)
///
/// The numeric form is `sid << 14 | lnid`, which is how the two packet
/// header subfields are carried in a single id by management tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u32")]
pub struct NodeId(u32);

impl NodeId {
    /// Largest representable node id (8-bit SID, 14-bit LNID)
    pub const MAX: u32 = 0x3F_FFFF;
    /// Mask of the LNID subfield
    pub const LNID_MASK: u32 = 0x3FFF;

    /// Create a node id from its numeric form
    pub fn new(value: u32) -> PrimeResult<Self> {
        if value > Self::MAX {
            return Err(PrimeError::Config(format!(
                "Node id 0x{:X} exceeds 22 bits",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Create a node id from its SID and LNID subfields
    pub fn from_parts(sid: u8, lnid: u16) -> PrimeResult<Self> {
        if u32::from(lnid) > Self::LNID_MASK {
            return Err(PrimeError::Config(format!(
                "LNID 0x{:X} exceeds 14 bits",
                lnid
            )));
        }
        Ok(Self((u32::from(sid) << 14) | u32::from(lnid)))
    }

    /// Switch identifier subfield
    pub fn sid(&self) -> u8 {
        (self.0 >> 14) as u8
    }

    /// Local node identifier subfield
    pub fn lnid(&self) -> u16 {
        (self.0 & Self::LNID_MASK) as u16
    }

    /// Numeric form
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<NodeId> for u32 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = NumericField::deserialize(deserializer)?
            .value("node id")
            .map_err(serde::de::Error::custom)?;
        let value = u32::try_from(value).map_err(serde::de::Error::custom)?;
        NodeId::new(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X} (SID={}, LNID={})", self.0, self.sid(), self.lnid())
    }
}

/// Local connection identifier (LCID) of a MAC connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u16")]
pub struct ConnId(u16);

impl ConnId {
    /// Largest LCID carried by the 9-bit packet header field
    pub const MAX: u16 = 0x1FF;

    /// Create a connection id
    pub fn new(value: u16) -> PrimeResult<Self> {
        if value > Self::MAX {
            return Err(PrimeError::Config(format!(
                "Connection id 0x{:X} exceeds 9 bits",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Numeric value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl From<ConnId> for u16 {
    fn from(id: ConnId) -> Self {
        id.0
    }
}

impl<'de> Deserialize<'de> for ConnId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = NumericField::deserialize(deserializer)?
            .value("connection id")
            .map_err(serde::de::Error::custom)?;
        let value = u16::try_from(value).map_err(serde::de::Error::custom)?;
        ConnId::new(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Switch level of the target node (6-bit LEVEL header field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SwitchLevel(u8);

impl SwitchLevel {
    /// Largest level carried by the header
    pub const MAX: u8 = 0x3F;

    /// Create a switch level
    pub fn new(level: u8) -> PrimeResult<Self> {
        if level > Self::MAX {
            return Err(PrimeError::Config(format!(
                "Switch level {} exceeds 6 bits",
                level
            )));
        }
        Ok(Self(level))
    }

    /// Numeric value
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SwitchLevel {
    type Error = PrimeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SwitchLevel> for u8 {
    fn from(level: SwitchLevel) -> Self {
        level.0
    }
}

/// Low-level-security password presented in the association request
///
/// The password is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a password
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Password bytes as sent on the wire
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Whether the password is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sna_parse_forms() {
        let expected = Sna::new([0x40, 0x40, 0x22, 0x00, 0x00, 0x01]);
        assert_eq!("40:40:22:00:00:01".parse::<Sna>().unwrap(), expected);
        assert_eq!("40-40-22-00-00-01".parse::<Sna>().unwrap(), expected);
        assert_eq!("404022000001".parse::<Sna>().unwrap(), expected);
        assert!("40:40:22:00:00".parse::<Sna>().is_err());
        assert!("40:40:22:00:00:zz".parse::<Sna>().is_err());
    }

    #[test]
    fn test_sna_from_id() {
        let sna = Sna::from_id(0x4040_2200_0001);
        assert_eq!(sna.to_string(), "40:40:22:00:00:01");
    }

    #[test]
    fn test_node_id_split() {
        let id = NodeId::new(0x4001).unwrap();
        assert_eq!(id.sid(), 1);
        assert_eq!(id.lnid(), 1);

        let id = NodeId::from_parts(0xAB, 0x1234).unwrap();
        assert_eq!(id.sid(), 0xAB);
        assert_eq!(id.lnid(), 0x1234);
        assert_eq!(id.value(), (0xAB << 14) | 0x1234);
    }

    #[test]
    fn test_identifier_widths() {
        assert!(NodeId::new(NodeId::MAX + 1).is_err());
        assert!(NodeId::from_parts(0, 0x4000).is_err());
        assert!(ConnId::new(0x200).is_err());
        assert!(SwitchLevel::new(64).is_err());
        assert!(SwitchLevel::new(63).is_ok());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("00000000");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.as_bytes(), b"00000000");
    }
}
