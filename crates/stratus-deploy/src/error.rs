//! Deployment error taxonomy
//!
//! Transient failures never show up here: they are absorbed by the retry
//! executor and only reported as events. What remains is either a
//! [`ValidationError`] (nothing was provisioned) or a [`StepError`]
//! (a step exhausted its retries and the pipeline stopped).

use crate::retry::{AttemptError, RetryExhausted};
use crate::steps::StepKind;
use stratus_cloud::CloudError;
use thiserror::Error;

/// The deployment cannot start
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("configuration value '{field}' must not be empty")]
    EmptyValue { field: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("cannot reach the control plane: {0}")]
    Connectivity(#[source] RetryExhausted<CloudError>),

    #[error(
        "authenticated subscription '{actual}' does not match configured subscription '{expected}'"
    )]
    SubscriptionMismatch { expected: String, actual: String },
}

/// A provisioning step failed on every retry attempt
#[derive(Error, Debug)]
#[error("step '{step}' failed on {resource}: {source}")]
pub struct StepError {
    pub step: StepKind,

    /// Which resource (and which non-secret config values) the failing call targeted
    pub resource: String,

    #[source]
    pub source: RetryExhausted<CloudError>,
}

impl StepError {
    pub fn new(
        step: StepKind,
        resource: impl Into<String>,
        source: RetryExhausted<CloudError>,
    ) -> Self {
        Self {
            step,
            resource: resource.into(),
            source,
        }
    }

    /// Attempts spent before giving up
    pub fn attempts(&self) -> u32 {
        self.source.attempts
    }
}

/// Terminal outcome of a pipeline or teardown run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("pipeline already ran (state: {0})")]
    AlreadyRun(String),
}

impl DeployError {
    /// The step the run stopped at, if it got as far as running one
    pub fn failed_step(&self) -> Option<StepKind> {
        match self {
            DeployError::Validation(_) => Some(StepKind::ValidateConnectivity),
            DeployError::Step(e) => Some(e.step),
            DeployError::AlreadyRun(_) => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DeployError::Validation(_))
    }

    /// The last attempt was refused because of the caller's credentials
    pub fn is_auth_failure(&self) -> bool {
        let exhausted = match self {
            DeployError::Validation(ValidationError::Connectivity(e)) => e,
            DeployError::Step(e) => &e.source,
            _ => return false,
        };
        matches!(&exhausted.last, AttemptError::Failed(e) if e.is_auth_failure())
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn exhausted(operation: &str) -> RetryExhausted<CloudError> {
        RetryExhausted {
            operation: operation.to_string(),
            attempts: 3,
            last: AttemptError::Failed(CloudError::Http("connection reset".to_string())),
        }
    }

    #[test]
    fn test_missing_keys_message_lists_every_key() {
        let err = ValidationError::MissingKeys(vec![
            "AZURE_SUBSCRIPTION_ID".to_string(),
            "DB_ADMIN_PASSWORD".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "missing required environment variables: AZURE_SUBSCRIPTION_ID, DB_ADMIN_PASSWORD"
        );
    }

    #[test]
    fn test_step_error_names_step_and_cause() {
        let err = DeployError::from(StepError::new(
            StepKind::CreateStorage,
            "storage account 'assets' in resource group 'rg'",
            exhausted("create storage account"),
        ));

        let message = err.to_string();
        assert!(message.contains("Create Storage Account and Container"));
        assert!(message.contains("storage account 'assets'"));
        assert!(message.contains("after 3 attempt(s)"));
        assert!(message.contains("connection reset"));
        assert_eq!(err.failed_step(), Some(StepKind::CreateStorage));
    }

    #[test]
    fn test_validation_failure_points_at_validate_step() {
        let err = DeployError::from(ValidationError::Connectivity(exhausted("resolve account")));
        assert!(err.is_validation());
        assert_eq!(err.failed_step(), Some(StepKind::ValidateConnectivity));
    }

    #[test]
    fn test_auth_failure_detection() {
        let rejected = RetryExhausted {
            operation: "resolve account".to_string(),
            attempts: 3,
            last: AttemptError::Failed(CloudError::Api {
                status: 401,
                code: "InvalidAuthenticationToken".to_string(),
                message: "The access token is invalid.".to_string(),
            }),
        };
        assert!(DeployError::from(ValidationError::Connectivity(rejected)).is_auth_failure());

        let timed_out: RetryExhausted<CloudError> = RetryExhausted {
            operation: "create cluster".to_string(),
            attempts: 3,
            last: AttemptError::TimedOut(std::time::Duration::from_secs(30)),
        };
        let step = StepError::new(StepKind::CreateCluster, "cluster 'aks'", timed_out);
        assert!(!DeployError::from(step).is_auth_failure());

        let step = StepError::new(StepKind::CreateStorage, "account", exhausted("create"));
        assert!(!DeployError::from(step).is_auth_failure());
        assert!(!DeployError::AlreadyRun("succeeded".to_string()).is_auth_failure());
    }
}
