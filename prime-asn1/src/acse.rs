//! ISO-ACSE request APDUs
//!
//! This module provides the two ACSE requests a management client sends:
//! - AARQ (Association Request), application tag 0
//! - RLRQ (Release Request), application tag 2
//!
//! # Encoding Format
//!
//! Both are BER encoded with a constructed application tag whose contents are
//! the present fields, each under its own context-specific tag, in ascending
//! tag order.

use crate::ber::{object_identifier_contents, BerEncoder};
use prime_core::PrimeResult;

/// Logical-name referencing, no ciphering (2.16.756.5.8.1.1)
pub const APPLICATION_CONTEXT_LOGICAL_NAME: [u32; 7] = [2, 16, 756, 5, 8, 1, 1];

/// Low-level-security authentication mechanism (2.16.756.5.8.2.1)
pub const MECHANISM_LOW: [u32; 7] = [2, 16, 756, 5, 8, 2, 1];

/// AARQ (Association Request) APDU
///
/// # Structure
/// Only the fields used by a COSEM client are modelled:
/// - Tag 1: application-context-name (required OBJECT IDENTIFIER)
/// - Tag 10: sender-acse-requirements (emitted with an authentication value)
/// - Tag 11: mechanism-name (optional, implicit OBJECT IDENTIFIER)
/// - Tag 12: calling-authentication-value (optional, charstring choice)
/// - Tag 30: user-information (optional, xDLMS InitiateRequest)
#[derive(Debug, Clone, PartialEq)]
pub struct AarqApdu {
    pub application_context_name: Vec<u32>,
    pub mechanism_name: Option<Vec<u32>>,
    pub calling_authentication_value: Option<Vec<u8>>,
    pub user_information: Option<Vec<u8>>,
}

impl AarqApdu {
    /// Create an AARQ with only the application context name
    pub fn new(application_context_name: Vec<u32>) -> Self {
        Self {
            application_context_name,
            mechanism_name: None,
            calling_authentication_value: None,
            user_information: None,
        }
    }

    /// Set the authentication mechanism name
    pub fn with_mechanism_name(mut self, mechanism: &[u32]) -> Self {
        self.mechanism_name = Some(mechanism.to_vec());
        self
    }

    /// Set the calling authentication value (password for low-level security)
    pub fn with_authentication_value(mut self, value: &[u8]) -> Self {
        self.calling_authentication_value = Some(value.to_vec());
        self
    }

    /// Set the user information (encoded InitiateRequest)
    pub fn with_user_information(mut self, initiate_request: Vec<u8>) -> Self {
        self.user_information = Some(initiate_request);
        self
    }

    /// Encode AARQ to BER format
    pub fn encode(&self) -> PrimeResult<Vec<u8>> {
        let mut fields = BerEncoder::new();

        // Tag 1: application-context-name
        let mut context_name = BerEncoder::new();
        context_name.encode_object_identifier(&self.application_context_name)?;
        fields.encode_context_specific(1, context_name.as_bytes(), true)?;

        // Tag 10: sender-acse-requirements, BIT STRING {authentication(0)}
        if self.calling_authentication_value.is_some() {
            fields.encode_context_specific(10, &[0x07, 0x80], false)?;
        }

        // Tag 11: mechanism-name
        if let Some(ref mechanism) = self.mechanism_name {
            let contents = object_identifier_contents(mechanism)?;
            fields.encode_context_specific(11, &contents, false)?;
        }

        // Tag 12: calling-authentication-value, charstring [0]
        if let Some(ref value) = self.calling_authentication_value {
            let mut auth = BerEncoder::new();
            auth.encode_context_specific(0, value, false)?;
            fields.encode_context_specific(12, auth.as_bytes(), true)?;
        }

        // Tag 30: user-information, OCTET STRING holding the xDLMS APDU
        if let Some(ref user_info) = self.user_information {
            let mut octets = BerEncoder::new();
            octets.encode_octet_string(user_info)?;
            fields.encode_context_specific(30, octets.as_bytes(), true)?;
        }

        let mut encoder = BerEncoder::new();
        encoder.encode_application(0, fields.as_bytes(), true)?;
        Ok(encoder.into_bytes())
    }
}

/// Release request reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseRequestReason {
    Normal,
    Urgent,
    UserDefined,
}

impl ReleaseRequestReason {
    pub fn value(self) -> u8 {
        match self {
            ReleaseRequestReason::Normal => 0,
            ReleaseRequestReason::Urgent => 1,
            ReleaseRequestReason::UserDefined => 30,
        }
    }
}

/// RLRQ (Release Request) APDU
#[derive(Debug, Clone, PartialEq)]
pub struct RlrqApdu {
    pub reason: Option<ReleaseRequestReason>,
}

impl RlrqApdu {
    pub fn new(reason: Option<ReleaseRequestReason>) -> Self {
        Self { reason }
    }

    /// Encode RLRQ to BER format
    pub fn encode(&self) -> PrimeResult<Vec<u8>> {
        let mut fields = BerEncoder::new();
        if let Some(reason) = self.reason {
            fields.encode_context_specific(0, &[reason.value()], false)?;
        }

        let mut encoder = BerEncoder::new();
        encoder.encode_application(2, fields.as_bytes(), true)?;
        Ok(encoder.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rlrq_normal() {
        let rlrq = RlrqApdu::new(Some(ReleaseRequestReason::Normal));
        assert_eq!(rlrq.encode().unwrap(), vec![0x62, 0x03, 0x80, 0x01, 0x00]);
    }

    #[test]
    fn test_rlrq_without_reason() {
        assert_eq!(RlrqApdu::new(None).encode().unwrap(), vec![0x62, 0x00]);
    }

    #[test]
    fn test_aarq_minimal() {
        let aarq = AarqApdu::new(APPLICATION_CONTEXT_LOGICAL_NAME.to_vec());
        assert_eq!(
            aarq.encode().unwrap(),
            vec![
                0x60, 0x0B, 0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01
            ]
        );
    }

    #[test]
    fn test_aarq_low_level_security() {
        let aarq = AarqApdu::new(APPLICATION_CONTEXT_LOGICAL_NAME.to_vec())
            .with_mechanism_name(&MECHANISM_LOW)
            .with_authentication_value(b"12345678")
            .with_user_information(vec![0x01, 0x00]);
        let bytes = aarq.encode().unwrap();

        let expected_body: Vec<u8> = [
            &[0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01][..],
            &[0x8A, 0x02, 0x07, 0x80],
            &[0x8B, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x02, 0x01],
            &[0xAC, 0x0A, 0x80, 0x08],
            b"12345678",
            &[0xBE, 0x04, 0x04, 0x02, 0x01, 0x00],
        ]
        .concat();

        assert_eq!(bytes[0], 0x60);
        assert_eq!(bytes[1] as usize, expected_body.len());
        assert_eq!(&bytes[2..], expected_body.as_slice());
    }
}
