//! Azure adapter error types

use stratus_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response carrying an ARM error body
    #[error("ARM returned {status} {code}: {message}")]
    Arm {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Operation '{operation}' finished as {status}")]
    OperationFailed { operation: String, status: String },

    #[error("Operation '{0}' did not finish within the polling budget")]
    PollingExhausted(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AzureError> for CloudError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::Http(e) if e.is_timeout() => CloudError::Timeout(e.to_string()),
            AzureError::Http(e) => CloudError::Http(e.to_string()),
            AzureError::Arm { status: 404, message, .. } => CloudError::ResourceNotFound(message),
            AzureError::Arm {
                status,
                code,
                message,
            } => CloudError::Api {
                status,
                code,
                message,
            },
            AzureError::OperationFailed { operation, status } => {
                CloudError::OperationFailed { operation, status }
            }
            AzureError::PollingExhausted(operation) => CloudError::Timeout(operation),
            AzureError::InvalidResponse(msg) => CloudError::InvalidResponse(msg),
            AzureError::MissingEnvVar(var) => CloudError::MissingEnvVar(var),
            AzureError::Json(e) => CloudError::Json(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_error_keeps_status() {
        let err: CloudError = AzureError::Arm {
            status: 403,
            code: "AuthorizationFailed".to_string(),
            message: "no access".to_string(),
        }
        .into();

        assert!(err.is_auth_failure());
        assert!(err.to_string().contains("AuthorizationFailed"));
    }

    #[test]
    fn test_not_found_maps_to_resource_not_found() {
        let err: CloudError = AzureError::Arm {
            status: 404,
            code: "ResourceGroupNotFound".to_string(),
            message: "Resource group 'x' could not be found.".to_string(),
        }
        .into();

        assert!(matches!(err, CloudError::ResourceNotFound(_)));
    }
}
