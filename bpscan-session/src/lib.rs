//! bpscan session layer - Cross-bundle correlation
//!
//! This crate owns the state that spans one capture session:
//!
//! - Duplicate/retransmission detection by bundle identity
//! - Status-report back-references to the bundles they describe
//! - Payload fragment reassembly
//! - Buffer scanning over concatenated bundles
//!
//! Single-threaded, call-and-return: each observation runs to completion
//! before the next begins, and readers of the session maps only see
//! updates from bundles observed earlier.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod reassembly;
pub mod session;

// Re-export commonly used types
pub use session::{FirstSighting, Observation, ScanOutcome, Session, SessionConfig};

pub use bpscan_bundle::{Bundle, BundleConfig, BundleIdentity, StatusReport};
pub use bpscan_cbor::{DecodeError, Diagnostics, Severity};
