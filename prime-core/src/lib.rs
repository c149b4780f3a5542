//! Core types and utilities for PRIME power-line attack tooling
//!
//! This crate provides the error type, the addressing identifiers of a PRIME
//! subnetwork (SNA, node and connection ids), OBIS codes and the immutable
//! attack configuration shared by the rest of the workspace.

pub mod address;
pub mod config;
pub mod error;
pub mod obis_code;

pub use address::{ConnId, Credential, NodeId, Sna, SwitchLevel};
pub use config::{AttackConfig, DEFAULT_RESEND_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
pub use error::{PrimeError, PrimeResult};
pub use obis_code::ObisCode;
