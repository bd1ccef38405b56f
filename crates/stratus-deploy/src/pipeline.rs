//! Deployment pipeline
//!
//! Runs the steps in dependency order and stops at the first step whose
//! retries are exhausted. Completed steps are left in place.

use crate::config::{ComputeMode, DeploymentConfig};
use crate::error::{DeployError, Result};
use crate::reporter::{DeployEvent, Reporter};
use crate::steps::{self, Clients, StepContext, StepKind, observe};
use futures_util::future::join;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stratus_cloud::{AccountInfo, Action, ActionType, Plan, ProvisionedResource};
use tokio::time::Instant;

/// Where a pipeline is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    Validating,
    /// Executing the step at `index` in [`StepKind::DEPLOY_ORDER`].
    /// In [`ComputeMode::Concurrent`] the cluster index also covers the
    /// database step running alongside it.
    Running {
        index: usize,
        step: StepKind,
    },
    Succeeded,
    Failed {
        step: StepKind,
        cause: String,
    },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::NotStarted => write!(f, "not started"),
            PipelineState::Validating => write!(f, "validating"),
            PipelineState::Running { index, step } => write!(
                f,
                "running step {}/{}: {}",
                index + 1,
                StepKind::DEPLOY_ORDER.len(),
                step
            ),
            PipelineState::Succeeded => write!(f, "succeeded"),
            PipelineState::Failed { step, .. } => write!(f, "failed at '{}'", step),
        }
    }
}

/// What a successful deployment produced
#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub account: AccountInfo,

    /// Every provisioned resource, in creation order
    pub resources: Vec<ProvisionedResource>,

    /// Host the CDN endpoint fronts (the storage account's blob endpoint)
    pub blob_host: String,

    /// Public hostname of the CDN endpoint, when the provider returned one
    pub cdn_hostname: Option<String>,

    pub elapsed: Duration,
}

/// Single-use deployment run
pub struct DeploymentPipeline {
    config: DeploymentConfig,
    clients: Clients,
    reporter: Arc<dyn Reporter>,
    state: PipelineState,
}

impl DeploymentPipeline {
    pub fn new(config: DeploymentConfig, clients: Clients, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            config,
            clients,
            reporter,
            state: PipelineState::NotStarted,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Run every step in order.
    ///
    /// A pipeline runs once; calling `deploy` again fails with
    /// [`DeployError::AlreadyRun`] without touching any client.
    pub async fn deploy(&mut self) -> Result<DeploymentSummary> {
        if self.state != PipelineState::NotStarted {
            return Err(DeployError::AlreadyRun(self.state.to_string()));
        }

        let reporter = Arc::clone(&self.reporter);
        let started = Instant::now();
        reporter.report(&DeployEvent::PipelineStarted {
            resource_group: self.config.resource_group.clone(),
            location: self.config.location.clone(),
        });

        let result = run(
            &self.config,
            &self.clients,
            reporter.as_ref(),
            &mut self.state,
        )
        .await;
        let elapsed = started.elapsed();

        let next = match &result {
            Ok(_) => PipelineState::Succeeded,
            Err(e) => PipelineState::Failed {
                step: e.failed_step().unwrap_or(StepKind::ValidateConnectivity),
                cause: e.to_string(),
            },
        };
        transition(&mut self.state, reporter.as_ref(), next);
        reporter.report(&DeployEvent::PipelineFinished {
            success: result.is_ok(),
            elapsed,
        });

        result.map(|mut summary| {
            summary.elapsed = elapsed;
            summary
        })
    }
}

fn transition(state: &mut PipelineState, reporter: &dyn Reporter, next: PipelineState) {
    tracing::debug!(from = %state, to = %next, "Pipeline transition");
    *state = next;
    reporter.report(&DeployEvent::StateChanged {
        state: state.clone(),
    });
}

fn enter(state: &mut PipelineState, reporter: &dyn Reporter, step: StepKind) {
    let index = step.deploy_index().unwrap_or_default();
    transition(state, reporter, PipelineState::Running { index, step });
}

async fn run(
    config: &DeploymentConfig,
    clients: &Clients,
    reporter: &dyn Reporter,
    state: &mut PipelineState,
) -> Result<DeploymentSummary> {
    transition(state, reporter, PipelineState::Validating);
    config.validate()?;

    let ctx = StepContext::new(config, reporter);

    enter(state, reporter, StepKind::ValidateConnectivity);
    let account = observe(
        reporter,
        StepKind::ValidateConnectivity,
        steps::validate_connectivity(ctx, clients.account.as_ref()),
    )
    .await?;

    enter(state, reporter, StepKind::CreateResourceGroup);
    let resource_group = observe(
        reporter,
        StepKind::CreateResourceGroup,
        steps::create_resource_group(ctx, clients.resource_groups.as_ref()),
    )
    .await?;

    enter(state, reporter, StepKind::CreateNetwork);
    let network = observe(
        reporter,
        StepKind::CreateNetwork,
        steps::create_network(ctx, clients.network.as_ref()),
    )
    .await?;

    let cluster_step = observe(
        reporter,
        StepKind::CreateCluster,
        steps::create_cluster(
            ctx,
            clients.cluster.as_ref(),
            Some(network.cluster_subnet.id.as_str()),
        ),
    );
    let database_step = observe(
        reporter,
        StepKind::CreateDatabase,
        steps::create_database(
            ctx,
            clients.database.as_ref(),
            Some(network.database_subnet.id.as_str()),
        ),
    );
    let (cluster, database) = match config.compute_mode {
        ComputeMode::Sequential => {
            enter(state, reporter, StepKind::CreateCluster);
            let cluster = cluster_step.await?;
            enter(state, reporter, StepKind::CreateDatabase);
            let database = database_step.await?;
            (cluster, database)
        }
        ComputeMode::Concurrent => {
            enter(state, reporter, StepKind::CreateCluster);
            let (cluster, database) = join(cluster_step, database_step).await;
            (cluster?, database?)
        }
    };

    enter(state, reporter, StepKind::CreateStorage);
    let storage = observe(
        reporter,
        StepKind::CreateStorage,
        steps::create_storage(ctx, clients.storage.as_ref()),
    )
    .await?;

    enter(state, reporter, StepKind::CreateCdn);
    let cdn = observe(
        reporter,
        StepKind::CreateCdn,
        steps::create_cdn(ctx, clients.cdn.as_ref(), &storage.account.blob_host),
    )
    .await?;

    let cdn_hostname = cdn.hostname().map(str::to_string);
    Ok(DeploymentSummary {
        account,
        resources: vec![
            resource_group,
            network.network,
            network.cluster_subnet,
            network.database_subnet,
            cluster,
            database,
            storage.account.resource,
            storage.container,
            cdn.profile,
            cdn.endpoint,
        ],
        blob_host: storage.account.blob_host,
        cdn_hostname,
        elapsed: Duration::ZERO,
    })
}

/// Dry-run: the calls `deploy` would issue, in order, with their non-secret parameters
pub fn plan(config: &DeploymentConfig) -> Plan {
    let rg = &config.resource_group;
    let network = &config.network;
    let cluster = &config.cluster;
    let database = &config.database;
    let storage = &config.storage;
    let cdn = &config.cdn;

    let mut plan = Plan::default();
    plan.push(
        Action::new(
            StepKind::ValidateConnectivity.name(),
            ActionType::Check,
            "subscription",
            &config.subscription_id,
            "Resolve the authenticated account and compare subscriptions",
        )
        .with_detail("retry", json!(config.retry.max_attempts)),
    );
    plan.push(
        Action::new(
            StepKind::CreateResourceGroup.name(),
            ActionType::CreateOrUpdate,
            "resource-group",
            rg,
            format!("Create or update resource group in {}", config.location),
        )
        .with_detail("location", json!(config.location)),
    );
    plan.push(
        Action::new(
            StepKind::CreateNetwork.name(),
            ActionType::CreateOrUpdate,
            "virtual-network",
            &network.name,
            format!("Create or update virtual network {}", network.address_space),
        )
        .with_detail("address_space", json!(network.address_space)),
    );
    for subnet in [&network.cluster_subnet, &network.database_subnet] {
        plan.push(
            Action::new(
                StepKind::CreateNetwork.name(),
                ActionType::CreateOrUpdate,
                "subnet",
                &subnet.name,
                format!("Create or update subnet in {}", network.name),
            )
            .with_detail("address_prefix", json!(subnet.address_prefix))
            .with_detail("delegation", json!(subnet.delegation)),
        );
    }
    plan.push(
        Action::new(
            StepKind::CreateCluster.name(),
            ActionType::CreateOrUpdate,
            "compute-cluster",
            &cluster.name,
            format!("Create or update cluster attached to {}", network.cluster_subnet.name),
        )
        .with_detail("node_pool", json!(cluster.node_pool_name))
        .with_detail("node_count", json!(cluster.node_count))
        .with_detail("vm_size", json!(cluster.vm_size)),
    );
    plan.push(
        Action::new(
            StepKind::CreateDatabase.name(),
            ActionType::CreateOrUpdate,
            "database-server",
            &database.server_name,
            format!("Create or update database server in {}", network.database_subnet.name),
        )
        .with_detail("admin_username", json!(database.admin_username))
        .with_detail("version", json!(database.version))
        .with_detail("sku", json!(database.sku_name))
        .with_detail("tier", json!(database.tier))
        .with_detail("storage_size_gb", json!(database.storage_size_gb)),
    );
    plan.push(
        Action::new(
            StepKind::CreateStorage.name(),
            ActionType::CreateOrUpdate,
            "storage-account",
            &storage.account_name,
            "Create or update storage account",
        )
        .with_detail("sku", json!(storage.sku_name))
        .with_detail("kind", json!(storage.kind)),
    );
    plan.push(Action::new(
        StepKind::CreateStorage.name(),
        ActionType::CreateOrUpdate,
        "storage-container",
        &storage.container_name,
        format!("Create or update container in {}", storage.account_name),
    ));
    plan.push(
        Action::new(
            StepKind::CreateCdn.name(),
            ActionType::CreateOrUpdate,
            "cdn-profile",
            &cdn.profile_name,
            "Create or update CDN profile",
        )
        .with_detail("sku", json!(cdn.sku_name)),
    );
    plan.push(
        Action::new(
            StepKind::CreateCdn.name(),
            ActionType::CreateOrUpdate,
            "cdn-endpoint",
            &cdn.endpoint_name,
            format!(
                "Create or update CDN endpoint fronting the blob endpoint of {}",
                storage.account_name
            ),
        )
        .with_detail("profile", json!(cdn.profile_name)),
    );

    for action in &mut plan.actions {
        action
            .details
            .insert("resource_group".to_string(), json!(rg));
    }
    plan
}
