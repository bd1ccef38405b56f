//! Resource client error types

use thiserror::Error;

/// Errors raised by a resource client call
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Long-running operation '{operation}' ended with status {status}")]
    OperationFailed { operation: String, status: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether the control plane rejected the caller's credentials
    pub fn is_auth_failure(&self) -> bool {
        match self {
            CloudError::AuthenticationFailed(_) => true,
            CloudError::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
