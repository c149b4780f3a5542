//! Attack configuration
//!
//! The configuration names one target service node and the timing of the
//! attack. It is built once, validated, and never mutated afterwards: the
//! driver only holds it behind a shared reference.
//!
//! # Serialized form
//! ```text
//! {
//!     "sna": "40:40:22:00:00:01",
//!     "nid": "0x4001",
//!     "lcid": "0x102",
//!     "level": 1,
//!     "password": "00000001",
//!     "timeout_ms": 120000,
//!     "resend_interval_ms": 1000
//! }
//! ```
//! `level`, `password` and both durations are optional.

use crate::address::{ConnId, Credential, NodeId, Sna, SwitchLevel};
use crate::error::{PrimeError, PrimeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound on an attack without progress (2 minutes)
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Default period of the resend timer
pub const DEFAULT_RESEND_INTERVAL_MS: u64 = 1_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_resend_interval_ms() -> u64 {
    DEFAULT_RESEND_INTERVAL_MS
}

/// Target and timing of one blink attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackConfig {
    sna: Sna,
    #[serde(rename = "nid")]
    node_id: NodeId,
    #[serde(rename = "lcid")]
    conn_id: ConnId,
    #[serde(default)]
    level: SwitchLevel,
    #[serde(default, rename = "password")]
    credential: Credential,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "default_resend_interval_ms")]
    resend_interval_ms: u64,
}

impl AttackConfig {
    /// Create a configuration for a target with default timing
    ///
    /// # Arguments
    /// * `sna` - Subnetwork address the target belongs to
    /// * `node_id` - SID/LNID of the target service node
    /// * `conn_id` - LCID of the target's management connection
    pub fn new(sna: Sna, node_id: NodeId, conn_id: ConnId) -> Self {
        Self {
            sna,
            node_id,
            conn_id,
            level: SwitchLevel::default(),
            credential: Credential::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            resend_interval_ms: DEFAULT_RESEND_INTERVAL_MS,
        }
    }

    /// Set the switch level written in the generic header
    pub fn with_level(mut self, level: SwitchLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the low-level-security password
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    /// Set the absolute timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the resend interval
    pub fn with_resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Check the timing values
    ///
    /// Identifier widths are already enforced by their types.
    pub fn validate(&self) -> PrimeResult<()> {
        if self.timeout_ms == 0 {
            return Err(PrimeError::Config("timeout_ms must be > 0".to_string()));
        }
        if self.resend_interval_ms == 0 {
            return Err(PrimeError::Config(
                "resend_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sna(&self) -> Sna {
        self.sna
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    pub fn level(&self) -> SwitchLevel {
        self.level
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Upper bound on the whole attack while the target does not answer
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Period between retransmissions of the current message
    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }
}
