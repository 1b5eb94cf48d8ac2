//! Request pipeline engine.
//!
//! [`admission`] decides whether a decoded job may run; [`dispatcher`] runs
//! it on the compute backend and settles its fees. Neither retries: every
//! failure is terminal for the request.

pub mod admission;
pub mod dispatcher;
