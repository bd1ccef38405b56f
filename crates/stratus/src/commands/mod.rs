pub mod deploy;
pub mod destroy;
pub mod plan;
pub mod validate;

use crate::LogFormat;
use crate::console::ConsoleReporter;
use std::sync::Arc;
use stratus_cloud_azure::{AzureCredentials, AzureProvider};
use stratus_deploy::{Clients, DeploymentConfig, Reporter, TracingReporter};

/// Resource clients for the configured subscription
pub fn connect(config: &DeploymentConfig) -> anyhow::Result<Clients> {
    let credentials = AzureCredentials::from_env()?;
    tracing::debug!(endpoint = %credentials.endpoint, "Using ARM endpoint");
    let provider = AzureProvider::new(credentials, config.subscription_id.clone());
    Ok(Clients::from_provider(Arc::new(provider)))
}

/// Progress goes to the terminal in text mode and into the log stream in JSON mode
pub fn reporter(format: LogFormat) -> Arc<dyn Reporter> {
    match format {
        LogFormat::Text => Arc::new(ConsoleReporter::new()),
        LogFormat::Json => Arc::new(TracingReporter),
    }
}
