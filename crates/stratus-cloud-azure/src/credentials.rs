//! ARM credentials

use crate::error::{AzureError, Result};
use stratus_cloud::Secret;

pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";
pub const ENV_ARM_ENDPOINT: &str = "AZURE_RESOURCE_MANAGER_ENDPOINT";

pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Bearer token plus the management endpoint it is valid for.
///
/// The token is obtained outside Stratus, e.g.
/// `az account get-access-token --query accessToken -o tsv`.
#[derive(Debug, Clone)]
pub struct AzureCredentials {
    pub access_token: Secret,
    pub endpoint: String,
}

impl AzureCredentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Create credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(ENV_ACCESS_TOKEN)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AzureError::MissingEnvVar(ENV_ACCESS_TOKEN.to_string()))?;

        let credentials = Self::new(token.trim());
        Ok(match std::env::var(ENV_ARM_ENDPOINT) {
            Ok(endpoint) if !endpoint.trim().is_empty() => credentials.with_endpoint(endpoint),
            _ => credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_requires_token() {
        temp_env::with_vars_unset([ENV_ACCESS_TOKEN, ENV_ARM_ENDPOINT], || {
            let err = AzureCredentials::from_env().unwrap_err();
            assert!(matches!(err, AzureError::MissingEnvVar(ref v) if v == ENV_ACCESS_TOKEN));
        });
    }

    #[test]
    fn test_from_env_reads_endpoint_override() {
        temp_env::with_vars(
            [
                (ENV_ACCESS_TOKEN, Some("eyJ0eXAi.token")),
                (ENV_ARM_ENDPOINT, Some("https://management.usgovcloudapi.net/")),
            ],
            || {
                let credentials = AzureCredentials::from_env().unwrap();
                assert_eq!(credentials.endpoint, "https://management.usgovcloudapi.net");
                assert_eq!(credentials.access_token.expose(), "eyJ0eXAi.token");
                assert!(!format!("{:?}", credentials).contains("eyJ0eXAi"));
            },
        );
    }

    #[test]
    fn test_default_endpoint() {
        temp_env::with_vars(
            [
                (ENV_ACCESS_TOKEN, Some("token")),
                (ENV_ARM_ENDPOINT, None),
            ],
            || {
                let credentials = AzureCredentials::from_env().unwrap();
                assert_eq!(credentials.endpoint, DEFAULT_ARM_ENDPOINT);
            },
        );
    }
}
