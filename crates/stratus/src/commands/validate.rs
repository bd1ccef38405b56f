use crate::LogFormat;
use colored::Colorize;
use stratus_deploy::steps::{StepContext, validate_connectivity};
use stratus_deploy::{DeployError, DeploymentConfig};

pub async fn handle(config: DeploymentConfig, format: LogFormat) -> anyhow::Result<()> {
    let text = format == LogFormat::Text;

    config.validate().map_err(DeployError::from)?;
    if text {
        println!("{}", "✓ Configuration is valid".green());
    }

    let clients = super::connect(&config)?;
    let reporter = super::reporter(format);
    let ctx = StepContext::new(&config, reporter.as_ref());

    let account = validate_connectivity(ctx, clients.account.as_ref())
        .await
        .map_err(DeployError::from)?;

    tracing::info!(
        subscription = %account.subscription_id,
        state = %account.state,
        "Control plane reachable"
    );
    if text {
        println!(
            "{} Connected to subscription {} ({}, {})",
            "✓".green(),
            account.subscription_id.cyan(),
            account.display_name,
            account.state
        );
    }
    Ok(())
}
