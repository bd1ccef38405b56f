use colored::Colorize;
use stratus_cloud::{ActionType, Plan};
use stratus_deploy::DeploymentConfig;

pub fn handle(config: &DeploymentConfig, json: bool) -> anyhow::Result<()> {
    config.validate()?;
    let plan = stratus_deploy::plan(config);
    let title = format!(
        "Plan for resource group {} in {}",
        config.resource_group, config.location
    );
    render(&plan, &title, json)
}

/// Print `plan` grouped by step, or as JSON
pub fn render(plan: &Plan, title: &str, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }

    println!("{}", title.bold());

    let mut current_step = "";
    for action in &plan.actions {
        if action.step != current_step {
            current_step = &action.step;
            println!();
            println!("{}", current_step.blue().bold());
        }
        let marker = match action.action_type {
            ActionType::Check => "?".cyan(),
            ActionType::CreateOrUpdate => "+".green(),
            ActionType::Delete => "-".red(),
        };
        println!(
            "  {} {} {} {}",
            marker,
            action.resource_type.dimmed(),
            action.resource_name.cyan(),
            action.description
        );
    }

    println!();
    println!("{}", plan.summary());
    Ok(())
}
