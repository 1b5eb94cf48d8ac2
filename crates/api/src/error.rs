use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orch_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for pipeline failures. Implements [`IntoResponse`] to
/// produce plain-text error responses, which is what broadcasters expect from
/// this endpoint family.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A pipeline failure from `orch_core`.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(core) => match core {
                CoreError::MalformedBody(_)
                | CoreError::PaymentRejected(_)
                | CoreError::InsufficientBalance
                | CoreError::UnknownCapability => StatusCode::BAD_REQUEST,
                CoreError::PaymentInvalid(_) => StatusCode::PAYMENT_REQUIRED,
                CoreError::Unauthorized(_) => StatusCode::FORBIDDEN,
                CoreError::ComputeFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        (status, message).into_response()
    }
}
