//! Provisioning steps
//!
//! Each step issues its resource client calls through [`retry`] one by one
//! and turns an exhausted retry into a [`StepError`] that names the resource.
//! Error messages only carry non-secret config values.

use crate::config::{DeploymentConfig, SubnetConfig};
use crate::error::{StepError, ValidationError};
use crate::reporter::{DeployEvent, Reporter};
use crate::retry::{RetryPolicy, retry};
use futures_util::future::join;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use stratus_cloud::{
    AccountClient, AccountInfo, CdnClient, CdnEndpointParams, CdnProfileParams, ClusterClient,
    ClusterParams, ContainerParams, DatabaseClient, DatabaseServerParams, NetworkClient,
    NodePoolParams, ProvisionedResource, ResourceGroupClient, ResourceGroupParams,
    StorageAccount, StorageAccountParams, StorageClient, SubnetParams, VirtualNetworkParams,
};
use tokio::time::Instant;

/// One unit of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    ValidateConnectivity,
    CreateResourceGroup,
    CreateNetwork,
    CreateCluster,
    CreateDatabase,
    CreateStorage,
    CreateCdn,
    DeleteResourceGroup,
}

impl StepKind {
    /// Steps of a deployment in dependency order
    pub const DEPLOY_ORDER: [StepKind; 7] = [
        StepKind::ValidateConnectivity,
        StepKind::CreateResourceGroup,
        StepKind::CreateNetwork,
        StepKind::CreateCluster,
        StepKind::CreateDatabase,
        StepKind::CreateStorage,
        StepKind::CreateCdn,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StepKind::ValidateConnectivity => "Validate Connectivity",
            StepKind::CreateResourceGroup => "Create Resource Group",
            StepKind::CreateNetwork => "Create Virtual Network and Subnets",
            StepKind::CreateCluster => "Create Compute Cluster",
            StepKind::CreateDatabase => "Create Database Server",
            StepKind::CreateStorage => "Create Storage Account and Container",
            StepKind::CreateCdn => "Create CDN Profile and Endpoint",
            StepKind::DeleteResourceGroup => "Delete Resource Group",
        }
    }

    /// Position within [`StepKind::DEPLOY_ORDER`]
    pub fn deploy_index(&self) -> Option<usize> {
        Self::DEPLOY_ORDER.iter().position(|s| s == self)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One client handle per resource domain
#[derive(Clone)]
pub struct Clients {
    pub account: Arc<dyn AccountClient>,
    pub resource_groups: Arc<dyn ResourceGroupClient>,
    pub network: Arc<dyn NetworkClient>,
    pub cluster: Arc<dyn ClusterClient>,
    pub database: Arc<dyn DatabaseClient>,
    pub storage: Arc<dyn StorageClient>,
    pub cdn: Arc<dyn CdnClient>,
}

impl Clients {
    /// Use a single provider for every domain
    pub fn from_provider<P>(provider: Arc<P>) -> Self
    where
        P: AccountClient
            + ResourceGroupClient
            + NetworkClient
            + ClusterClient
            + DatabaseClient
            + StorageClient
            + CdnClient
            + 'static,
    {
        Self {
            account: provider.clone(),
            resource_groups: provider.clone(),
            network: provider.clone(),
            cluster: provider.clone(),
            database: provider.clone(),
            storage: provider.clone(),
            cdn: provider,
        }
    }
}

/// What every step needs besides its client
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub config: &'a DeploymentConfig,
    pub policy: &'a RetryPolicy,
    pub reporter: &'a dyn Reporter,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a DeploymentConfig, reporter: &'a dyn Reporter) -> Self {
        Self {
            config,
            policy: &config.retry,
            reporter,
        }
    }
}

/// Report the boundaries of one step around its future
pub(crate) async fn observe<T, E, Fut>(
    reporter: &dyn Reporter,
    step: StepKind,
    fut: Fut,
) -> std::result::Result<T, E>
where
    Fut: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    reporter.report(&DeployEvent::StepStarted { step });
    let started = Instant::now();

    let result = fut.await;
    match &result {
        Ok(_) => reporter.report(&DeployEvent::StepSucceeded {
            step,
            elapsed: started.elapsed(),
        }),
        Err(e) => reporter.report(&DeployEvent::StepFailed {
            step,
            error: e.to_string(),
        }),
    }
    result
}

/// Resolve the account behind the client handles and check it is the one configured
pub async fn validate_connectivity(
    ctx: StepContext<'_>,
    account: &dyn AccountClient,
) -> Result<AccountInfo, ValidationError> {
    let info = retry(ctx.policy, "resolve account", ctx.reporter, || {
        account.current_account()
    })
    .await
    .map_err(ValidationError::Connectivity)?;

    if !info
        .subscription_id
        .eq_ignore_ascii_case(&ctx.config.subscription_id)
    {
        return Err(ValidationError::SubscriptionMismatch {
            expected: ctx.config.subscription_id.clone(),
            actual: info.subscription_id,
        });
    }

    tracing::debug!(
        subscription = %info.subscription_id,
        account = %info.display_name,
        "Control plane reachable"
    );
    Ok(info)
}

pub async fn create_resource_group(
    ctx: StepContext<'_>,
    client: &dyn ResourceGroupClient,
) -> Result<ProvisionedResource, StepError> {
    let config = ctx.config;
    let params = ResourceGroupParams {
        location: config.location.clone(),
    };

    retry(ctx.policy, "create resource group", ctx.reporter, || {
        client.create_or_update(&config.resource_group, &params)
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateResourceGroup,
            format!(
                "resource group '{}' in {}",
                config.resource_group, config.location
            ),
            e,
        )
    })
}

/// Output of the network step
#[derive(Debug, Clone)]
pub struct NetworkResources {
    pub network: ProvisionedResource,
    pub cluster_subnet: ProvisionedResource,
    pub database_subnet: ProvisionedResource,
}

/// Create the virtual network, then both subnets concurrently.
///
/// The step only completes once both subnet calls have finished; if either
/// failed, the step fails with the first failure in declaration order.
pub async fn create_network(
    ctx: StepContext<'_>,
    client: &dyn NetworkClient,
) -> Result<NetworkResources, StepError> {
    let config = ctx.config;
    let network = &config.network;
    let params = VirtualNetworkParams {
        location: config.location.clone(),
        address_prefixes: vec![network.address_space.clone()],
    };

    let vnet = retry(ctx.policy, "create virtual network", ctx.reporter, || {
        client.create_or_update_network(&config.resource_group, &network.name, &params)
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateNetwork,
            format!(
                "virtual network '{}' ({}) in resource group '{}'",
                network.name, network.address_space, config.resource_group
            ),
            e,
        )
    })?;

    let (cluster_subnet, database_subnet) = join(
        create_subnet(ctx, client, &network.cluster_subnet),
        create_subnet(ctx, client, &network.database_subnet),
    )
    .await;

    Ok(NetworkResources {
        network: vnet,
        cluster_subnet: cluster_subnet?,
        database_subnet: database_subnet?,
    })
}

async fn create_subnet(
    ctx: StepContext<'_>,
    client: &dyn NetworkClient,
    subnet: &SubnetConfig,
) -> Result<ProvisionedResource, StepError> {
    let config = ctx.config;
    let params = SubnetParams {
        address_prefix: subnet.address_prefix.clone(),
        delegation: subnet.delegation.clone(),
    };
    let operation = format!("create subnet {}", subnet.name);

    retry(ctx.policy, &operation, ctx.reporter, || {
        client.create_or_update_subnet(
            &config.resource_group,
            &config.network.name,
            &subnet.name,
            &params,
        )
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateNetwork,
            format!(
                "subnet '{}' ({}) of virtual network '{}'",
                subnet.name, subnet.address_prefix, config.network.name
            ),
            e,
        )
    })
}

pub async fn create_cluster(
    ctx: StepContext<'_>,
    client: &dyn ClusterClient,
    subnet_id: Option<&str>,
) -> Result<ProvisionedResource, StepError> {
    let config = ctx.config;
    let cluster = &config.cluster;
    let params = ClusterParams {
        location: config.location.clone(),
        dns_prefix: cluster.dns_prefix.clone(),
        node_pool: NodePoolParams {
            name: cluster.node_pool_name.clone(),
            node_count: cluster.node_count,
            vm_size: cluster.vm_size.clone(),
        },
        subnet_id: subnet_id.map(str::to_string),
    };

    retry(ctx.policy, "create compute cluster", ctx.reporter, || {
        client.create_or_update(&config.resource_group, &cluster.name, &params)
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateCluster,
            format!(
                "cluster '{}' (node pool '{}', {} x {}) in resource group '{}'",
                cluster.name,
                cluster.node_pool_name,
                cluster.node_count,
                cluster.vm_size,
                config.resource_group
            ),
            e,
        )
    })
}

/// `subnet_id` is the delegated database subnet the server joins
pub async fn create_database(
    ctx: StepContext<'_>,
    client: &dyn DatabaseClient,
    subnet_id: Option<&str>,
) -> Result<ProvisionedResource, StepError> {
    let config = ctx.config;
    let database = &config.database;
    let params = DatabaseServerParams {
        location: config.location.clone(),
        administrator_login: database.admin_username.clone(),
        administrator_password: database.admin_password.clone(),
        version: database.version.clone(),
        sku_name: database.sku_name.clone(),
        tier: database.tier.clone(),
        storage_size_gb: database.storage_size_gb,
        subnet_id: subnet_id.map(str::to_string),
        private_dns_zone_id: database.private_dns_zone_id.clone(),
    };

    retry(ctx.policy, "create database server", ctx.reporter, || {
        client.create_or_update(&config.resource_group, &database.server_name, &params)
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateDatabase,
            format!(
                "database server '{}' (version {}, {}/{}, admin '{}') in resource group '{}'",
                database.server_name,
                database.version,
                database.tier,
                database.sku_name,
                database.admin_username,
                config.resource_group
            ),
            e,
        )
    })
}

/// Output of the storage step
#[derive(Debug, Clone)]
pub struct StorageResources {
    pub account: StorageAccount,
    pub container: ProvisionedResource,
}

/// Create the storage account, then the container inside it
pub async fn create_storage(
    ctx: StepContext<'_>,
    client: &dyn StorageClient,
) -> Result<StorageResources, StepError> {
    let config = ctx.config;
    let storage = &config.storage;
    let account_params = StorageAccountParams {
        location: config.location.clone(),
        sku_name: storage.sku_name.clone(),
        kind: storage.kind.clone(),
    };

    let account = retry(ctx.policy, "create storage account", ctx.reporter, || {
        client.create_or_update_account(
            &config.resource_group,
            &storage.account_name,
            &account_params,
        )
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateStorage,
            format!(
                "storage account '{}' ({}, {}) in resource group '{}'",
                storage.account_name, storage.kind, storage.sku_name, config.resource_group
            ),
            e,
        )
    })?;

    let container_params = ContainerParams {
        public_access: "None".to_string(),
    };
    let container = retry(ctx.policy, "create storage container", ctx.reporter, || {
        client.create_or_update_container(
            &config.resource_group,
            &storage.account_name,
            &storage.container_name,
            &container_params,
        )
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateStorage,
            format!(
                "container '{}' in storage account '{}'",
                storage.container_name, storage.account_name
            ),
            e,
        )
    })?;

    Ok(StorageResources { account, container })
}

/// Output of the CDN step
#[derive(Debug, Clone)]
pub struct CdnResources {
    pub profile: ProvisionedResource,
    pub endpoint: ProvisionedResource,
}

impl CdnResources {
    /// Public hostname of the endpoint, when the provider reported one
    pub fn hostname(&self) -> Option<&str> {
        self.endpoint.attribute_str("hostName")
    }
}

/// Create the CDN profile, then an endpoint fronting `origin_host`
pub async fn create_cdn(
    ctx: StepContext<'_>,
    client: &dyn CdnClient,
    origin_host: &str,
) -> Result<CdnResources, StepError> {
    let config = ctx.config;
    let cdn = &config.cdn;
    let profile_params = CdnProfileParams {
        sku_name: cdn.sku_name.clone(),
    };

    let profile = retry(ctx.policy, "create CDN profile", ctx.reporter, || {
        client.create_or_update_profile(
            &config.resource_group,
            &cdn.profile_name,
            &profile_params,
        )
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateCdn,
            format!(
                "CDN profile '{}' ({}) in resource group '{}'",
                cdn.profile_name, cdn.sku_name, config.resource_group
            ),
            e,
        )
    })?;

    let endpoint_params = CdnEndpointParams {
        origin_host: origin_host.to_string(),
    };
    let endpoint = retry(ctx.policy, "create CDN endpoint", ctx.reporter, || {
        client.create_or_update_endpoint(
            &config.resource_group,
            &cdn.profile_name,
            &cdn.endpoint_name,
            &endpoint_params,
        )
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::CreateCdn,
            format!(
                "CDN endpoint '{}' of profile '{}' (origin {})",
                cdn.endpoint_name, cdn.profile_name, origin_host
            ),
            e,
        )
    })?;

    Ok(CdnResources { profile, endpoint })
}

/// Delete the configured resource group and everything in it
pub async fn delete_resource_group(
    ctx: StepContext<'_>,
    client: &dyn ResourceGroupClient,
) -> Result<(), StepError> {
    let config = ctx.config;

    retry(ctx.policy, "delete resource group", ctx.reporter, || {
        client.delete(&config.resource_group)
    })
    .await
    .map_err(|e| {
        StepError::new(
            StepKind::DeleteResourceGroup,
            format!("resource group '{}'", config.resource_group),
            e,
        )
    })
}
