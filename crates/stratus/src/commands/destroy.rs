use crate::LogFormat;
use colored::Colorize;
use stratus_deploy::{DeploymentConfig, Teardown, teardown_plan};

pub async fn handle(config: DeploymentConfig, yes: bool, format: LogFormat) -> anyhow::Result<()> {
    let text = format == LogFormat::Text;

    if !yes {
        let title = format!(
            "Teardown of resource group {} ({})",
            config.resource_group, config.subscription_id
        );
        super::plan::render(&teardown_plan(&config), &title, !text)?;
        if text {
            println!();
            println!(
                "{}",
                "Warning: every resource in this group will be deleted.".yellow()
            );
            println!("Pass --yes to proceed");
        }
        return Ok(());
    }

    if text {
        println!(
            "{} {} ({})",
            "Destroying resource group".blue().bold(),
            config.resource_group.cyan(),
            config.subscription_id
        );
    }

    let resource_group = config.resource_group.clone();
    let clients = super::connect(&config)?;
    Teardown::new(config, clients, super::reporter(format))
        .run()
        .await?;

    tracing::info!(resource_group = %resource_group, "Resource group deleted");
    if text {
        println!();
        println!(
            "{}",
            format!("✓ Resource group {} deleted", resource_group)
                .green()
                .bold()
        );
    }
    Ok(())
}
