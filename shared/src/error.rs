use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HealthError>;

#[derive(Debug, Error)]
pub enum HealthError {
    /// Missing field, out-of-range value, unknown record. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage call failed after transport-level retries
    #[error("Database error ({code}): {message}")]
    Storage { code: String, message: String },

    #[error("Unexpected error: {0}")]
    Internal(String),
}

impl HealthError {
    pub fn validation(message: impl Into<String>) -> Self {
        HealthError::Validation(message.into())
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            HealthError::Validation(_) => "ValidationError",
            HealthError::Storage { .. } => "DatabaseError",
            HealthError::Internal(_) => "InternalError",
        }
    }

    /// Flat failure result returned to the gateway. Storage and internal
    /// details stay in the logs.
    pub fn to_response(&self) -> serde_json::Value {
        match self {
            HealthError::Validation(_) => serde_json::json!({
                "success": false,
                "error": self.to_string(),
                "errorType": self.error_type(),
            }),
            HealthError::Storage { code, .. } => serde_json::json!({
                "success": false,
                "error": "A database error occurred. Please try again later.",
                "errorType": self.error_type(),
                "errorCode": code,
            }),
            HealthError::Internal(_) => serde_json::json!({
                "success": false,
                "error": "An unexpected error occurred. Please try again later.",
                "errorType": self.error_type(),
            }),
        }
    }
}

impl<E, R> From<SdkError<E, R>> for HealthError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    fn from(err: SdkError<E, R>) -> Self {
        let code = err.code().unwrap_or("Unknown").to_string();
        HealthError::Storage {
            code,
            message: DisplayErrorContext(&err).to_string(),
        }
    }
}

impl From<serde_json::Error> for HealthError {
    fn from(err: serde_json::Error) -> Self {
        HealthError::Validation(format!("invalid parameters: {}", err))
    }
}
