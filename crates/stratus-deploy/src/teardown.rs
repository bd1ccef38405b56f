//! Resource group teardown
//!
//! Explicit, operator-initiated cleanup. Deleting the resource group removes
//! everything a deployment created in it; it is never run automatically after
//! a failed deployment.

use crate::config::DeploymentConfig;
use crate::error::{DeployError, Result};
use crate::reporter::{DeployEvent, Reporter};
use crate::steps::{self, Clients, StepContext, StepKind, observe};
use serde_json::json;
use std::sync::Arc;
use stratus_cloud::{Action, ActionType, Plan};
use tokio::time::Instant;

/// The calls `Teardown::run` would issue
pub fn teardown_plan(config: &DeploymentConfig) -> Plan {
    Plan::new(vec![
        Action::new(
            StepKind::ValidateConnectivity.name(),
            ActionType::Check,
            "subscription",
            &config.subscription_id,
            "Resolve the authenticated account and compare subscriptions",
        ),
        Action::new(
            StepKind::DeleteResourceGroup.name(),
            ActionType::Delete,
            "resource-group",
            &config.resource_group,
            "Delete resource group and every resource in it",
        )
        .with_detail("location", json!(config.location))
        .with_detail("retry", json!(config.retry.max_attempts)),
    ])
}

pub struct Teardown {
    config: DeploymentConfig,
    clients: Clients,
    reporter: Arc<dyn Reporter>,
}

impl Teardown {
    pub fn new(config: DeploymentConfig, clients: Clients, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            config,
            clients,
            reporter,
        }
    }

    /// Check connectivity, then delete the configured resource group
    pub async fn run(&self) -> Result<()> {
        let reporter = self.reporter.as_ref();
        let started = Instant::now();

        let result = async {
            self.config.validate()?;
            let ctx = StepContext::new(&self.config, reporter);

            observe(
                reporter,
                StepKind::ValidateConnectivity,
                steps::validate_connectivity(ctx, self.clients.account.as_ref()),
            )
            .await?;
            observe(
                reporter,
                StepKind::DeleteResourceGroup,
                steps::delete_resource_group(ctx, self.clients.resource_groups.as_ref()),
            )
            .await?;
            Ok::<_, DeployError>(())
        }
        .await;

        reporter.report(&DeployEvent::PipelineFinished {
            success: result.is_ok(),
            elapsed: started.elapsed(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::MemoryReporter;
    use crate::testing::{FakeCloud, test_config};

    #[test]
    fn test_teardown_plan_deletes_only_the_group() {
        let config = test_config();
        let plan = teardown_plan(&config);

        let summary = plan.summary();
        assert_eq!(summary.delete, 1);
        assert_eq!(summary.create_or_update, 0);
        assert_eq!(summary.checks, 1);

        let delete = &plan.actions_by_type(ActionType::Delete)[0];
        assert_eq!(delete.resource_name, config.resource_group);
        assert_eq!(delete.step, "Delete Resource Group");
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_deletes_resource_group() {
        let config = test_config();
        let cloud = Arc::new(FakeCloud::new(&config.subscription_id));
        let reporter = Arc::new(MemoryReporter::new());
        let teardown = Teardown::new(
            config,
            Clients::from_provider(Arc::clone(&cloud)),
            reporter.clone(),
        );

        teardown.run().await.unwrap();

        assert_eq!(cloud.calls(), vec!["account", "delete_resource_group"]);
        assert_eq!(
            reporter.succeeded_steps(),
            vec![
                StepKind::ValidateConnectivity,
                StepKind::DeleteResourceGroup
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_skips_delete_when_subscription_differs() {
        let config = test_config();
        let cloud = Arc::new(FakeCloud::new("another-subscription"));
        let teardown = Teardown::new(
            config,
            Clients::from_provider(Arc::clone(&cloud)),
            Arc::new(MemoryReporter::new()),
        );

        let err = teardown.run().await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(cloud.count("delete_resource_group"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_delete_failure_is_retried() {
        let config = test_config();
        let cloud = Arc::new(
            FakeCloud::new(&config.subscription_id).fail_always("delete_resource_group"),
        );
        let teardown = Teardown::new(
            config,
            Clients::from_provider(Arc::clone(&cloud)),
            Arc::new(MemoryReporter::new()),
        );

        let err = teardown.run().await.unwrap_err();

        assert_eq!(err.failed_step(), Some(StepKind::DeleteResourceGroup));
        assert!(matches!(err, DeployError::Step(_)));
        assert_eq!(cloud.count("delete_resource_group"), 3);
    }
}
