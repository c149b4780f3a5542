//! PRIME blink attack
//!
//! Forces a PRIME smart meter to open a management association, then toggles
//! its supply relay off and on until told to stop.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `prime-core`: Errors, subnetwork and node identifiers, OBIS codes, configuration
//! - `prime-asn1`: DLMS/COSEM request encoding (AARQ, Action-Request, RLRQ)
//! - `prime-mac`: PRIME MAC frame encoding/decoding (ARQ, SAR, CL, HCS/CRC)
//! - `prime-transport`: Transport seam (in-memory, UDP bridge)
//! - `prime-attack`: Composer, correlator, state machine and driver
//!
//! # Usage
//!
//! ```no_run
//! use prime::attack::spawn;
//! use prime::transport::channel_transport;
//! use prime::{AttackConfig, ConnId, NodeId, Sna};
//!
//! # async fn example() -> prime::PrimeResult<()> {
//! let config = AttackConfig::new(
//!     Sna::new([0x40, 0x40, 0x22, 0x00, 0x00, 0x01]),
//!     NodeId::from_parts(1, 0x23)?,
//!     ConnId::new(0x102)?,
//! );
//! let (transport, _network) = channel_transport();
//! let attack = spawn(config, transport)?;
//! attack.cancel()?;
//! let report = attack.join().await?;
//! println!("{:?}", report.outcome);
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use prime_core::{
    AttackConfig, ConnId, Credential, NodeId, ObisCode, PrimeError, PrimeResult, Sna, SwitchLevel,
};

// Re-export the attack API
pub mod attack {
    pub use prime_attack::*;
}

// Re-export transports
pub mod transport {
    pub use prime_transport::*;
}

// Re-export MAC frame codec
pub mod mac {
    pub use prime_mac::*;
}

// Re-export APDU encoding
pub mod apdu {
    pub use prime_asn1::*;
}
