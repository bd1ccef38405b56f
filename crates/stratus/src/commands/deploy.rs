use crate::LogFormat;
use colored::Colorize;
use stratus_deploy::{ComputeMode, DeploymentConfig, DeploymentPipeline, DeploymentSummary};

pub async fn handle(config: DeploymentConfig, format: LogFormat) -> anyhow::Result<()> {
    let text = format == LogFormat::Text;
    if text {
        print_header(&config);
    }

    let clients = super::connect(&config)?;
    let mut pipeline = DeploymentPipeline::new(config, clients, super::reporter(format));
    let summary = pipeline.deploy().await?;

    tracing::info!(
        resources = summary.resources.len(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        cdn_hostname = summary.cdn_hostname.as_deref().unwrap_or_default(),
        "Deployment complete"
    );

    if text {
        println!();
        for line in summary_lines(&summary) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn print_header(config: &DeploymentConfig) {
    println!("{}", "Starting deployment...".blue().bold());
    println!("Subscription:   {}", config.subscription_id.cyan());
    println!("Resource group: {}", config.resource_group.cyan());
    println!("Region:         {}", config.location.cyan());
    println!(
        "Retry policy:   {} attempt(s), {}ms apart{}",
        config.retry.max_attempts,
        config.retry.delay.as_millis(),
        config
            .retry
            .attempt_timeout
            .map(|t| format!(", {}s per attempt", t.as_secs()))
            .unwrap_or_default()
    );
    if config.compute_mode == ComputeMode::Concurrent {
        println!("Compute:        cluster and database in parallel");
    }
    println!();
}

fn summary_lines(summary: &DeploymentSummary) -> Vec<String> {
    let mut lines = vec![
        format!(
            "✓ Deployment complete ({} resources, {:.1}s)",
            summary.resources.len(),
            summary.elapsed.as_secs_f64()
        )
        .green()
        .bold()
        .to_string(),
    ];
    for resource in &summary.resources {
        lines.push(format!(
            "  • {} {} {}",
            resource.provisioned_at.format("%H:%M:%S").to_string().dimmed(),
            resource.name.cyan(),
            resource.resource_type.dimmed()
        ));
    }
    lines.push(String::new());
    lines.push(format!("Blob endpoint: https://{}", summary.blob_host));
    if let Some(hostname) = &summary.cdn_hostname {
        lines.push(format!("CDN endpoint:  https://{}", hostname.cyan()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stratus_cloud::{AccountInfo, ProvisionedResource};

    #[test]
    fn test_summary_lists_resources_with_completion_time() {
        colored::control::set_override(false);
        let mut endpoint = ProvisionedResource::new(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Cdn/profiles/p/endpoints/e",
            "stratus-endpoint",
            "Microsoft.Cdn/profiles/endpoints",
        );
        let completed = endpoint.provisioned_at.format("%H:%M:%S").to_string();
        endpoint = endpoint.with_attribute("hostName", serde_json::json!("e.azureedge.net"));

        let summary = DeploymentSummary {
            account: AccountInfo {
                subscription_id: "s".to_string(),
                display_name: "Dev".to_string(),
                state: "Enabled".to_string(),
            },
            resources: vec![endpoint],
            blob_host: "stratusassets.blob.core.windows.net".to_string(),
            cdn_hostname: Some("e.azureedge.net".to_string()),
            elapsed: Duration::from_millis(1500),
        };

        let lines = summary_lines(&summary);

        assert_eq!(lines[0], "✓ Deployment complete (1 resources, 1.5s)");
        assert_eq!(
            lines[1],
            format!(
                "  • {} stratus-endpoint Microsoft.Cdn/profiles/endpoints",
                completed
            )
        );
        assert!(lines.contains(&"CDN endpoint:  https://e.azureedge.net".to_string()));
    }
}
