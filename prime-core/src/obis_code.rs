use crate::error::{PrimeError, PrimeResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Extended OBIS notation: `A-B:C.D.E.F`, `A-B:C.D.E*F` or `A-B:C.D.E`
static EXTENDED_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})-(\d{1,3}):(\d{1,3})\.(\d{1,3})\.(\d{1,3})(?:[.*](\d{1,3}))?$")
        .expect("static OBIS pattern compiles")
});

/// Logical name of a COSEM object
///
/// Carried as the `instance-id` of a method descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Disconnect control object of the meter supply relay (0-0:96.3.10.255)
    pub const DISCONNECT_CONTROL: ObisCode = ObisCode {
        bytes: [0x00, 0x00, 0x60, 0x03, 0x0a, 0xff],
    };

    /// Value groups A to F
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    /// Parse `0.0.96.3.10.255`, `0-0:96.3.10.255`, `0-0:96.3.10*255`
    /// or `0-0:96.3.10` (F taken as 255)
    ///
    /// # Errors
    /// `PrimeError::InvalidData` when no notation matches.
    pub fn from_string(s: &str) -> PrimeResult<Self> {
        if let Ok(code) = Self::parse_dot_format(s) {
            return Ok(code);
        }

        if let Ok(code) = Self::parse_extended_format(s) {
            return Ok(code);
        }

        Err(PrimeError::InvalidData(format!("Invalid OBIS code format: {}", s)))
    }

    fn parse_dot_format(s: &str) -> PrimeResult<Self> {
        let mut groups = s.trim().split('.');
        let mut bytes = [0u8; 6];
        for byte in bytes.iter_mut() {
            let group = groups
                .next()
                .ok_or_else(|| PrimeError::InvalidData("Too few OBIS value groups".to_string()))?;
            *byte = parse_group(group)?;
        }
        if groups.next().is_some() {
            return Err(PrimeError::InvalidData("Too many OBIS value groups".to_string()));
        }
        Ok(Self { bytes })
    }

    fn parse_extended_format(s: &str) -> PrimeResult<Self> {
        let captures = EXTENDED_FORMAT
            .captures(s.trim())
            .ok_or_else(|| PrimeError::InvalidData(format!("Not an extended OBIS code: {}", s)))?;

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate().take(5) {
            *byte = parse_group(&captures[i + 1])?;
        }
        bytes[5] = match captures.get(6) {
            Some(f) => parse_group(f.as_str())?,
            None => 0xFF,
        };

        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }
}

fn parse_group(part: &str) -> PrimeResult<u8> {
    part.parse::<u8>()
        .map_err(|_| PrimeError::InvalidData(format!("Invalid byte value: {}", part)))
}

impl FromStr for ObisCode {
    type Err = PrimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.bytes;
        write!(f, "{}-{}:{}.{}.{}.{}", a, b, c, d, e, g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obis_code_from_dot_string() {
        let code = ObisCode::from_string("0.0.96.3.10.255").unwrap();
        assert_eq!(code, ObisCode::DISCONNECT_CONTROL);
    }

    #[test]
    fn test_obis_code_from_extended_string() {
        assert_eq!(
            "0-0:96.3.10.255".parse::<ObisCode>().unwrap(),
            ObisCode::DISCONNECT_CONTROL
        );
        assert_eq!(
            "0-0:96.3.10*255".parse::<ObisCode>().unwrap(),
            ObisCode::DISCONNECT_CONTROL
        );
        assert_eq!(
            "1-0:1.8.0".parse::<ObisCode>().unwrap(),
            ObisCode::new(1, 0, 1, 8, 0, 255)
        );
    }

    #[test]
    fn test_obis_code_rejects_garbage() {
        assert!(ObisCode::from_string("0.0.96.3.10").is_err());
        assert!(ObisCode::from_string("0-0:96.3.300.255").is_err());
        assert!(ObisCode::from_string("disconnect").is_err());
    }

    #[test]
    fn test_disconnect_control_display() {
        assert_eq!(ObisCode::DISCONNECT_CONTROL.to_string(), "0-0:96.3.10.255");
    }
}
