//! Checksums of the PRIME MAC layer
//!
//! - HCS: CRC-8, polynomial 0x07, initial value 0, over the generic header
//! - CRC: CRC-32, polynomial 0x04C11DB7, initial value 0, not reflected, no
//!   final xor, over the SNA followed by the frame

use once_cell::sync::Lazy;
use prime_core::{PrimeError, PrimeResult};

const CRC8_POLY: u8 = 0x07;
const CRC32_POLY: u32 = 0x04C1_1DB7;

/// Precomputed CRC-8 table
static CRC8_TABLE: Lazy<[u8; 256]> = Lazy::new(|| {
    let mut table = [0u8; 256];
    for (b, entry) in table.iter_mut().enumerate() {
        let mut v = b as u8;
        for _ in 0..8 {
            v = if v & 0x80 != 0 { (v << 1) ^ CRC8_POLY } else { v << 1 };
        }
        *entry = v;
    }
    table
});

/// Precomputed CRC-32 table
static CRC32_TABLE: Lazy<[u32; 256]> = Lazy::new(|| {
    let mut table = [0u32; 256];
    for (b, entry) in table.iter_mut().enumerate() {
        let mut v = (b as u32) << 24;
        for _ in 0..8 {
            v = if v & 0x8000_0000 != 0 {
                (v << 1) ^ CRC32_POLY
            } else {
                v << 1
            };
        }
        *entry = v;
    }
    table
});

/// Header check sequence calculator
pub struct HcsCalc {
    value: u8,
}

impl HcsCalc {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Update with a single byte
    pub fn update(&mut self, data: u8) {
        self.value = CRC8_TABLE[(self.value ^ data) as usize];
    }

    /// Update with multiple bytes
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Compare against a received HCS
    pub fn validate(&self, received: u8) -> PrimeResult<()> {
        if self.value != received {
            Err(PrimeError::FrameInvalid(format!(
                "HCS has wrong value: 0x{:02X}, expected 0x{:02X}",
                received, self.value
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for HcsCalc {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame CRC calculator
pub struct CrcCalc {
    value: u32,
}

impl CrcCalc {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Update with a single byte
    pub fn update(&mut self, data: u8) {
        let index = ((self.value >> 24) as u8 ^ data) as usize;
        self.value = (self.value << 8) ^ CRC32_TABLE[index];
    }

    /// Update with multiple bytes
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// CRC as transmitted (big-endian)
    pub fn value_bytes(&self) -> [u8; 4] {
        self.value.to_be_bytes()
    }

    /// Compare against a received CRC
    pub fn validate(&self, received: u32) -> PrimeResult<()> {
        if self.value != received {
            Err(PrimeError::FrameInvalid(format!(
                "CRC has wrong value: 0x{:08X}, expected 0x{:08X}",
                received, self.value
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for CrcCalc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hcs_check_value() {
        let mut calc = HcsCalc::new();
        calc.update_bytes(b"123456789");
        assert_eq!(calc.value(), 0xF4);
    }

    #[test]
    fn test_crc_check_value() {
        let mut calc = CrcCalc::new();
        calc.update_bytes(b"123456789");
        assert_eq!(calc.value(), 0x89A1_897F);
        assert_eq!(calc.value_bytes(), [0x89, 0xA1, 0x89, 0x7F]);
    }

    #[test]
    fn test_validate() {
        let mut calc = CrcCalc::new();
        calc.update_bytes(&[0x01, 0x02]);
        assert!(calc.validate(calc.value()).is_ok());
        assert!(calc.validate(calc.value() ^ 1).is_err());

        let hcs = HcsCalc::new();
        assert!(hcs.validate(0).is_ok());
        assert!(hcs.validate(1).is_err());
    }
}
