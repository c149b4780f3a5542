//! APDU builder seam
//!
//! `ApduBuilder` is what the frame composer asks for payloads. Keeping it a
//! trait lets callers substitute another codec (or a mock) without touching
//! the attack state machine.

use crate::acse::{
    AarqApdu, ReleaseRequestReason, RlrqApdu, APPLICATION_CONTEXT_LOGICAL_NAME, MECHANISM_LOW,
};
use crate::xdlms::{
    ActionRequestNormal, Conformance, CosemMethodDescriptor, DataValue, InitiateRequest,
    InvokeIdAndPriority,
};
use bytes::Bytes;
use prime_core::{Credential, ObisCode, PrimeResult};

/// Builds the encoded DLMS requests
pub trait ApduBuilder: Send + Sync {
    /// Association request with low-level-security authentication
    ///
    /// # Arguments
    /// * `credential` - Password presented as calling authentication value
    /// * `conformance` - Proposed conformance block
    /// * `max_pdu_size` - Client max receive PDU size
    fn association_request(
        &self,
        credential: &Credential,
        conformance: Conformance,
        max_pdu_size: u16,
    ) -> PrimeResult<Bytes>;

    /// Method invocation request
    ///
    /// An empty parameter list sends no parameter, a single one is sent as
    /// is, several are wrapped in a structure.
    fn method_request(
        &self,
        class_id: u16,
        instance_id: ObisCode,
        method_id: i8,
        parameters: &[DataValue],
    ) -> PrimeResult<Bytes>;

    /// Release request
    fn release_request(&self, reason: ReleaseRequestReason) -> PrimeResult<Bytes>;
}

/// Default builder producing logical-name referenced DLMS APDUs
///
/// Method requests are sent with invoke id 1, confirmed, high priority.
#[derive(Debug, Clone, Copy, Default)]
pub struct DlmsApduBuilder;

impl DlmsApduBuilder {
    const INVOKE_ID: u8 = 1;

    pub fn new() -> Self {
        Self
    }
}

impl ApduBuilder for DlmsApduBuilder {
    fn association_request(
        &self,
        credential: &Credential,
        conformance: Conformance,
        max_pdu_size: u16,
    ) -> PrimeResult<Bytes> {
        let initiate = InitiateRequest::new(conformance, max_pdu_size).encode()?;
        let aarq = AarqApdu::new(APPLICATION_CONTEXT_LOGICAL_NAME.to_vec())
            .with_mechanism_name(&MECHANISM_LOW)
            .with_authentication_value(credential.as_bytes())
            .with_user_information(initiate);
        Ok(Bytes::from(aarq.encode()?))
    }

    fn method_request(
        &self,
        class_id: u16,
        instance_id: ObisCode,
        method_id: i8,
        parameters: &[DataValue],
    ) -> PrimeResult<Bytes> {
        let parameters = match parameters {
            [] => None,
            [single] => Some(single.clone()),
            many => Some(DataValue::Structure(many.to_vec())),
        };
        let request = ActionRequestNormal::new(
            InvokeIdAndPriority::new(Self::INVOKE_ID, true, true)?,
            CosemMethodDescriptor::new(class_id, instance_id, method_id),
            parameters,
        );
        Ok(Bytes::from(request.encode()))
    }

    fn release_request(&self, reason: ReleaseRequestReason) -> PrimeResult<Bytes> {
        Ok(Bytes::from(RlrqApdu::new(Some(reason)).encode()?))
    }
}
