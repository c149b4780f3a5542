//! DLMS/COSEM APDU encoding for PRIME management connections
//!
//! This crate provides:
//! - **BER**: the TLV encoder used by the ACSE layer
//! - **ACSE**: AARQ and RLRQ requests
//! - **xDLMS**: InitiateRequest, conformance block and Action-Request-Normal
//! - **Tags**: classification of inbound APDUs by their leading byte
//! - **Builder**: the `ApduBuilder` seam and its default implementation
//!
//! Only the client request direction is encoded. Responses from the meter are
//! recognised by tag, which is all the blink attack needs to decide its next
//! step.

pub mod acse;
pub mod ber;
pub mod builder;
pub mod tag;
pub mod xdlms;

pub use acse::{AarqApdu, ReleaseRequestReason, RlrqApdu};
pub use ber::{BerEncoder, BerTag, BerTagClass};
pub use builder::{ApduBuilder, DlmsApduBuilder};
pub use tag::ApduTag;
pub use xdlms::{
    ActionRequestNormal, Conformance, CosemMethodDescriptor, DataValue, InitiateRequest,
    InvokeIdAndPriority, DEFAULT_MAX_PDU_SIZE, DLMS_VERSION_6,
};
