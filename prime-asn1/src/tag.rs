//! Leading tags of DLMS APDUs
//!
//! The first byte of every APDU identifies its type. The attack only needs to
//! tell association, action and error responses apart, so inbound payloads
//! are classified by this byte and never fully decoded.

use std::fmt;

/// APDU type identified by the leading byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApduTag {
    /// confirmedServiceError
    ConfirmedServiceError,
    /// AARQ
    Aarq,
    /// AARE
    Aare,
    /// RLRQ
    Rlrq,
    /// RLRE
    Rlre,
    /// action-request
    ActionRequest,
    /// action-response
    ActionResponse,
    /// exception-response
    ExceptionResponse,
}

impl ApduTag {
    pub const CONFIRMED_SERVICE_ERROR: u8 = 0x0E;
    pub const AARQ: u8 = 0x60;
    pub const AARE: u8 = 0x61;
    pub const RLRQ: u8 = 0x62;
    pub const RLRE: u8 = 0x63;
    pub const ACTION_REQUEST: u8 = 0xC3;
    pub const ACTION_RESPONSE: u8 = 0xC7;
    pub const EXCEPTION_RESPONSE: u8 = 0xD8;

    /// Classify a leading byte
    ///
    /// Returns `None` for tags this crate does not know about.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::CONFIRMED_SERVICE_ERROR => Some(ApduTag::ConfirmedServiceError),
            Self::AARQ => Some(ApduTag::Aarq),
            Self::AARE => Some(ApduTag::Aare),
            Self::RLRQ => Some(ApduTag::Rlrq),
            Self::RLRE => Some(ApduTag::Rlre),
            Self::ACTION_REQUEST => Some(ApduTag::ActionRequest),
            Self::ACTION_RESPONSE => Some(ApduTag::ActionResponse),
            Self::EXCEPTION_RESPONSE => Some(ApduTag::ExceptionResponse),
            _ => None,
        }
    }

    /// Wire value
    pub fn value(self) -> u8 {
        match self {
            ApduTag::ConfirmedServiceError => Self::CONFIRMED_SERVICE_ERROR,
            ApduTag::Aarq => Self::AARQ,
            ApduTag::Aare => Self::AARE,
            ApduTag::Rlrq => Self::RLRQ,
            ApduTag::Rlre => Self::RLRE,
            ApduTag::ActionRequest => Self::ACTION_REQUEST,
            ApduTag::ActionResponse => Self::ACTION_RESPONSE,
            ApduTag::ExceptionResponse => Self::EXCEPTION_RESPONSE,
        }
    }

    /// Whether the APDU reports a service or protocol error
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ApduTag::ConfirmedServiceError | ApduTag::ExceptionResponse
        )
    }
}

impl fmt::Display for ApduTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApduTag::ConfirmedServiceError => "confirmed-service-error",
            ApduTag::Aarq => "AARQ",
            ApduTag::Aare => "AARE",
            ApduTag::Rlrq => "RLRQ",
            ApduTag::Rlre => "RLRE",
            ApduTag::ActionRequest => "action-request",
            ApduTag::ActionResponse => "action-response",
            ApduTag::ExceptionResponse => "exception-response",
        };
        write!(f, "{} (0x{:02X})", name, self.value())
    }
}
