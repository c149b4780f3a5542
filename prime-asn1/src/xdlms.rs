//! xDLMS APDUs carried inside or after the association
//!
//! This module provides the A-XDR encoded pieces of the COSEM application
//! layer needed to drive the disconnect control object:
//! - `InitiateRequest`, carried as AARQ user information
//! - `ActionRequestNormal`, invoking one method of one object
//! - `DataValue`, the method invocation parameter
//!
//! # A-XDR
//!
//! A-XDR differs from BER: fixed-size types carry no tag or length, optional
//! fields are prefixed by a presence byte (`0x00` absent, `0x01` present) and
//! DEFAULT fields encode `0x00` when the default is used.

use crate::ber::encode_length;
use prime_core::{ObisCode, PrimeError, PrimeResult};

/// DLMS protocol version proposed in the InitiateRequest
pub const DLMS_VERSION_6: u8 = 6;

/// Maximum receive PDU size announced to the meter
pub const DEFAULT_MAX_PDU_SIZE: u16 = 0x0122;

/// Conformance block (24-bit bitstring)
///
/// Bits are numbered from the most significant bit of the 24-bit string, so
/// bit `n` has the mask `1 << (23 - n)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Conformance(u32);

impl Conformance {
    pub const GENERAL_PROTECTION: u32 = 1;
    pub const GENERAL_BLOCK_TRANSFER: u32 = 2;
    pub const ATTRIBUTE0_SUPPORTED_WITH_SET: u32 = 8;
    pub const PRIORITY_MGMT_SUPPORTED: u32 = 9;
    pub const ATTRIBUTE0_SUPPORTED_WITH_GET: u32 = 10;
    pub const BLOCK_TRANSFER_WITH_GET_OR_READ: u32 = 11;
    pub const BLOCK_TRANSFER_WITH_SET_OR_WRITE: u32 = 12;
    pub const BLOCK_TRANSFER_WITH_ACTION: u32 = 13;
    pub const MULTIPLE_REFERENCES: u32 = 14;
    pub const DATA_NOTIFICATION: u32 = 16;
    pub const ACCESS: u32 = 17;
    pub const GET: u32 = 19;
    pub const SET: u32 = 20;
    pub const SELECTIVE_ACCESS: u32 = 21;
    pub const EVENT_NOTIFICATION: u32 = 22;
    pub const ACTION: u32 = 23;

    /// Create an empty conformance block
    pub fn new() -> Self {
        Self(0)
    }

    /// Proposal used to open a management association with a meter
    pub fn management_proposal() -> Self {
        let mut conformance = Self::new();
        for bit in [
            Self::ACTION,
            Self::EVENT_NOTIFICATION,
            Self::SELECTIVE_ACCESS,
            Self::SET,
            Self::GET,
            Self::BLOCK_TRANSFER_WITH_ACTION,
            Self::BLOCK_TRANSFER_WITH_SET_OR_WRITE,
            Self::BLOCK_TRANSFER_WITH_GET_OR_READ,
            Self::PRIORITY_MGMT_SUPPORTED,
        ] {
            conformance.set(bit, true);
        }
        conformance
    }

    /// Set or clear one conformance bit
    ///
    /// Bits outside 0..=23 are ignored.
    pub fn set(&mut self, bit: u32, enabled: bool) {
        if bit > 23 {
            return;
        }
        let mask = 1 << (23 - bit);
        if enabled {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Whether a conformance bit is set
    pub fn is_set(&self, bit: u32) -> bool {
        bit <= 23 && self.0 & (1 << (23 - bit)) != 0
    }

    /// The 24-bit value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Encode as the `[APPLICATION 31] IMPLICIT BIT STRING (SIZE(24))`
    /// used inside InitiateRequest: `5F 1F 04 00` followed by 3 bytes
    pub fn encode(&self) -> Vec<u8> {
        let [_, b0, b1, b2] = self.0.to_be_bytes();
        vec![0x5F, 0x1F, 0x04, 0x00, b0, b1, b2]
    }
}

/// xDLMS InitiateRequest
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateRequest {
    /// Optional dedicated key (unused with low-level security)
    pub dedicated_key: Option<Vec<u8>>,
    /// Whether responses are allowed (DEFAULT TRUE)
    pub response_allowed: bool,
    /// Optional quality of service parameter
    pub proposed_quality_of_service: Option<i8>,
    /// Proposed DLMS version number
    pub proposed_dlms_version_number: u8,
    /// Proposed conformance block
    pub proposed_conformance: Conformance,
    /// Maximum PDU size the client can receive
    pub client_max_receive_pdu_size: u16,
}

impl InitiateRequest {
    /// Create an InitiateRequest with the given proposal
    pub fn new(proposed_conformance: Conformance, client_max_receive_pdu_size: u16) -> Self {
        Self {
            dedicated_key: None,
            response_allowed: true,
            proposed_quality_of_service: None,
            proposed_dlms_version_number: DLMS_VERSION_6,
            proposed_conformance,
            client_max_receive_pdu_size,
        }
    }

    /// Encode to A-XDR
    ///
    /// # Encoding Format
    /// ```text
    /// 01                 initiateRequest tag
    /// 00 | 01 len key    dedicated-key
    /// 00 | 01 00         response-allowed (00 = default TRUE)
    /// 00 | 01 qos        proposed-quality-of-service
    /// 06                 proposed-dlms-version-number
    /// 5F 1F 04 00 xx xx xx  proposed-conformance
    /// hh ll              client-max-receive-pdu-size
    /// ```
    pub fn encode(&self) -> PrimeResult<Vec<u8>> {
        if self.client_max_receive_pdu_size == 0 {
            return Err(PrimeError::Encoding(
                "client_max_receive_pdu_size must be > 0".to_string(),
            ));
        }

        let mut bytes = vec![0x01];

        match &self.dedicated_key {
            Some(key) => {
                bytes.push(0x01);
                bytes.extend_from_slice(&encode_length(key.len()));
                bytes.extend_from_slice(key);
            }
            None => bytes.push(0x00),
        }

        if self.response_allowed {
            bytes.push(0x00);
        } else {
            bytes.extend_from_slice(&[0x01, 0x00]);
        }

        match self.proposed_quality_of_service {
            Some(qos) => bytes.extend_from_slice(&[0x01, qos as u8]),
            None => bytes.push(0x00),
        }

        bytes.push(self.proposed_dlms_version_number);
        bytes.extend_from_slice(&self.proposed_conformance.encode());
        bytes.extend_from_slice(&self.client_max_receive_pdu_size.to_be_bytes());
        Ok(bytes)
    }
}

/// Invoke-Id-And-Priority byte
///
/// Bit 7 is the priority (1 = high), bit 6 the service class
/// (1 = confirmed), bits 3-0 the invoke id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeIdAndPriority(u8);

impl InvokeIdAndPriority {
    /// Create from its parts
    pub fn new(invoke_id: u8, confirmed: bool, high_priority: bool) -> PrimeResult<Self> {
        if invoke_id > 0x0F {
            return Err(PrimeError::Encoding(format!(
                "Invoke id {} exceeds 4 bits",
                invoke_id
            )));
        }
        let mut value = invoke_id;
        if confirmed {
            value |= 0x40;
        }
        if high_priority {
            value |= 0x80;
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// COSEM method descriptor: class id, instance id and method id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CosemMethodDescriptor {
    pub class_id: u16,
    pub instance_id: ObisCode,
    pub method_id: i8,
}

impl CosemMethodDescriptor {
    pub fn new(class_id: u16, instance_id: ObisCode, method_id: i8) -> Self {
        Self {
            class_id,
            instance_id,
            method_id,
        }
    }

    fn encode_into(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.class_id.to_be_bytes());
        bytes.extend_from_slice(self.instance_id.as_bytes());
        bytes.push(self.method_id as u8);
    }
}

/// A-XDR `Data` value used as method invocation parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    Null,
    Boolean(bool),
    Integer(i8),
    Unsigned(u8),
    Long(i16),
    LongUnsigned(u16),
    OctetString(Vec<u8>),
    Structure(Vec<DataValue>),
}

impl DataValue {
    /// Encode with its leading type tag
    pub fn encode(&self) -> Vec<u8> {
        match self {
            DataValue::Null => vec![0x00],
            DataValue::Boolean(b) => vec![0x03, u8::from(*b)],
            DataValue::Integer(v) => vec![0x0F, *v as u8],
            DataValue::Unsigned(v) => vec![0x11, *v],
            DataValue::Long(v) => {
                let [hi, lo] = v.to_be_bytes();
                vec![0x10, hi, lo]
            }
            DataValue::LongUnsigned(v) => {
                let [hi, lo] = v.to_be_bytes();
                vec![0x12, hi, lo]
            }
            DataValue::OctetString(data) => {
                let mut bytes = vec![0x09];
                bytes.extend_from_slice(&encode_length(data.len()));
                bytes.extend_from_slice(data);
                bytes
            }
            DataValue::Structure(elements) => {
                let mut bytes = vec![0x02];
                bytes.extend_from_slice(&encode_length(elements.len()));
                for element in elements {
                    bytes.extend_from_slice(&element.encode());
                }
                bytes
            }
        }
    }
}

/// Action-Request-Normal APDU
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequestNormal {
    pub invoke_id_and_priority: InvokeIdAndPriority,
    pub cosem_method_descriptor: CosemMethodDescriptor,
    pub method_invocation_parameters: Option<DataValue>,
}

impl ActionRequestNormal {
    /// APDU tag of action-request
    pub const TAG: u8 = 0xC3;
    /// Choice index of action-request-normal
    pub const NORMAL: u8 = 0x01;

    pub fn new(
        invoke_id_and_priority: InvokeIdAndPriority,
        cosem_method_descriptor: CosemMethodDescriptor,
        method_invocation_parameters: Option<DataValue>,
    ) -> Self {
        Self {
            invoke_id_and_priority,
            cosem_method_descriptor,
            method_invocation_parameters,
        }
    }

    /// Encode to A-XDR
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![Self::TAG, Self::NORMAL, self.invoke_id_and_priority.value()];
        self.cosem_method_descriptor.encode_into(&mut bytes);
        match &self.method_invocation_parameters {
            Some(data) => {
                bytes.push(0x01);
                bytes.extend_from_slice(&data.encode());
            }
            None => bytes.push(0x00),
        }
        bytes
    }
}
