//! Azure Resource Manager REST client
//!
//! Thin wrapper over `reqwest` that knows three ARM conventions:
//! `api-version` query parameters, the `{"error": {"code", "message"}}`
//! error body, and long-running operations announced through the
//! `Azure-AsyncOperation` or `Location` response headers.

use crate::credentials::AzureCredentials;
use crate::error::{AzureError, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use stratus_cloud::Secret;

const ASYNC_OPERATION: &str = "azure-asyncoperation";
const LOCATION: &str = "location";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_POLLS: u32 = 360;

/// Terminal or in-flight state of a long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
}

impl OperationStatus {
    /// Read the `status` field of an `Azure-AsyncOperation` body
    pub fn from_body(body: &Value) -> Self {
        Self::parse(body.get("status").and_then(Value::as_str))
    }

    /// Read `properties.provisioningState` of a resource body; a resource without one is done
    pub fn from_resource(body: &Value) -> Self {
        match body
            .pointer("/properties/provisioningState")
            .and_then(Value::as_str)
        {
            None => OperationStatus::Succeeded,
            state => Self::parse(state),
        }
    }

    fn parse(status: Option<&str>) -> Self {
        match status {
            Some(s) if s.eq_ignore_ascii_case("succeeded") => OperationStatus::Succeeded,
            Some(s)
                if s.eq_ignore_ascii_case("failed") || s.eq_ignore_ascii_case("canceled") =>
            {
                OperationStatus::Failed(s.to_string())
            }
            _ => OperationStatus::InProgress,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    code: String,
    message: String,
}

/// Build an [`AzureError::Arm`] from a non-2xx response body
pub(crate) fn parse_error(status: StatusCode, body: &str) -> AzureError {
    match serde_json::from_str::<ArmErrorBody>(body) {
        Ok(parsed) => AzureError::Arm {
            status: status.as_u16(),
            code: parsed.error.code,
            message: parsed.error.message,
        },
        Err(_) => AzureError::Arm {
            status: status.as_u16(),
            code: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .replace(' ', ""),
            message: body.chars().take(512).collect(),
        },
    }
}

/// `Retry-After` in seconds, if present and numeric
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// How to wait for a long-running operation, read from the initial response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Poller {
    /// Poll until the body reports a terminal `status`
    AsyncOperation(String),
    /// Poll until the response is no longer `202 Accepted`
    Location(String),
    /// Re-read the resource until its `provisioningState` is terminal
    Resource(String),
}

impl Poller {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        header(ASYNC_OPERATION)
            .map(Poller::AsyncOperation)
            .or_else(|| header(LOCATION).map(Poller::Location))
    }

    fn url(&self) -> &str {
        match self {
            Poller::AsyncOperation(url) | Poller::Location(url) | Poller::Resource(url) => url,
        }
    }
}

pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    token: Secret,
    poll_interval: Duration,
    max_polls: u32,
}

impl ArmClient {
    pub fn new(credentials: AzureCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: credentials.endpoint,
            token: credentials.access_token,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// Fallback interval used when a poll response carries no `Retry-After`
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    pub async fn get(&self, path: &str, api_version: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.url(path, api_version))
            .bearer_auth(self.token.expose())
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Create or update a resource and return its state once provisioning finished
    ///
    /// Any 2xx answer may still be in flight: ARM announces that either with an
    /// operation header or with a non-terminal `provisioningState` in the body.
    pub async fn put(&self, path: &str, api_version: &str, body: &Value) -> Result<Value> {
        tracing::debug!(path, api_version, "ARM PUT");
        let response = self
            .http
            .put(self.url(path, api_version))
            .bearer_auth(self.token.expose())
            .json(body)
            .send()
            .await?;
        let response = check(response).await?;

        let poller = Poller::from_headers(response.headers());
        let delay = retry_after(response.headers());
        let text = response.text().await?;
        let state: Option<Value> = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };

        let poller = match (poller, &state) {
            (Some(poller), _) => Some(poller),
            (None, Some(state)) => match OperationStatus::from_resource(state) {
                OperationStatus::Succeeded => None,
                OperationStatus::InProgress => Some(Poller::Resource(self.url(path, api_version))),
                OperationStatus::Failed(status) => {
                    return Err(AzureError::OperationFailed {
                        operation: path.to_string(),
                        status,
                    });
                }
            },
            (None, None) => None,
        };

        match (poller, state) {
            (Some(poller), _) => {
                self.wait(path, poller, delay).await?;
                self.get(path, api_version).await
            }
            (None, Some(state)) => Ok(state),
            (None, None) => self.get(path, api_version).await,
        }
    }

    /// Delete a resource; a resource that is already gone counts as deleted
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<()> {
        tracing::debug!(path, api_version, "ARM DELETE");
        let response = self
            .http
            .delete(self.url(path, api_version))
            .bearer_auth(self.token.expose())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(path, "Resource already absent");
            return Ok(());
        }
        let response = check(response).await?;

        if let Some(poller) = Poller::from_headers(response.headers()) {
            let delay = retry_after(response.headers());
            self.wait(path, poller, delay).await?;
        }
        Ok(())
    }

    async fn wait(
        &self,
        operation: &str,
        poller: Poller,
        first_delay: Option<Duration>,
    ) -> Result<()> {
        let mut delay = first_delay.unwrap_or(self.poll_interval);

        for poll in 1..=self.max_polls {
            tokio::time::sleep(delay).await;

            let response = self
                .http
                .get(poller.url())
                .bearer_auth(self.token.expose())
                .send()
                .await?;
            let response = check(response).await?;
            delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

            match &poller {
                Poller::AsyncOperation(_) | Poller::Resource(_) => {
                    let body: Value = response.json().await?;
                    let status = match &poller {
                        Poller::AsyncOperation(_) => OperationStatus::from_body(&body),
                        _ => OperationStatus::from_resource(&body),
                    };
                    match status {
                        OperationStatus::Succeeded => return Ok(()),
                        OperationStatus::Failed(status) => {
                            return Err(AzureError::OperationFailed {
                                operation: operation.to_string(),
                                status,
                            });
                        }
                        OperationStatus::InProgress => {}
                    }
                }
                Poller::Location(_) => {
                    if response.status() != StatusCode::ACCEPTED {
                        return Ok(());
                    }
                }
            }
            tracing::trace!(operation, poll, "Operation still in progress");
        }

        Err(AzureError::PollingExhausted(operation.to_string()))
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(parse_error(status, &body))
}
