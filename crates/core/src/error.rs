/// Terminal failures of the admission and billing pipeline.
///
/// Every variant ends the request it occurred in. None of them are retried
/// locally; the caller is expected to submit a fresh request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The request body, or an image embedded in it, could not be decoded.
    #[error("{0}")]
    MalformedBody(String),

    /// The payment header is missing or cannot be decoded.
    #[error("{0}")]
    PaymentInvalid(String),

    /// The request credentials did not verify against the paying sender.
    #[error("{0}")]
    Unauthorized(String),

    /// The ledger refused to process the ticket batch.
    #[error("{0}")]
    PaymentRejected(String),

    /// The sender cannot cover a single billable unit at the session price.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// The compute backend returned an error.
    #[error("{0}")]
    ComputeFailed(String),

    /// The job selector does not name a known capability.
    #[error("Unknown request type")]
    UnknownCapability,
}

/// Convenience alias used throughout the core crate.
pub type CoreResult<T> = Result<T, CoreError>;
