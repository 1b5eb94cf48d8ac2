//! Domain core of the orchestrator AI gateway.
//!
//! Pure building blocks for admitting and billing AI jobs: capability
//! descriptors, job parameters, output-size estimation, session keys,
//! prices, payment decoding, credential verification and the ledger seam.
//! Nothing here knows about HTTP.

pub mod capability;
pub mod credentials;
pub mod error;
pub mod estimation;
pub mod job;
pub mod ledger;
pub mod payment;
pub mod price;
pub mod session;
