//! Compute backend seam for AI inference jobs.
//!
//! [`ComputeBackend`] is what the dispatcher submits admitted jobs to.
//! [`WorkerClient`] implements it over HTTP against a remote AI worker that
//! exposes one endpoint per capability.

pub mod backend;
pub mod client;

pub use backend::{ComputeBackend, ComputeError, ImageResponse, Media};
pub use client::WorkerClient;
