//! Resource client capability traits
//!
//! Every domain exposes the same shape: `create_or_update(resource_group, name,
//! parameters)`, awaited until the remote operation reaches a terminal state.
//! Implementations must be callable concurrently through a shared reference.

use crate::error::Result;
use crate::resource::{ProvisionedResource, StorageAccount};
use crate::secret::Secret;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of the account/subscription the clients act on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub subscription_id: String,
    pub display_name: String,
    pub state: String,
}

/// Resolves the identity behind the authenticated client handles
#[async_trait]
pub trait AccountClient: Send + Sync {
    async fn current_account(&self) -> Result<AccountInfo>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroupParams {
    pub location: String,
}

#[async_trait]
pub trait ResourceGroupClient: Send + Sync {
    async fn create_or_update(
        &self,
        name: &str,
        params: &ResourceGroupParams,
    ) -> Result<ProvisionedResource>;

    /// Delete a resource group and everything inside it
    async fn delete(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct VirtualNetworkParams {
    pub location: String,
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubnetParams {
    pub address_prefix: String,
    /// Service the subnet is delegated to, e.g. `Microsoft.DBforPostgreSQL/flexibleServers`
    pub delegation: Option<String>,
}

#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn create_or_update_network(
        &self,
        resource_group: &str,
        name: &str,
        params: &VirtualNetworkParams,
    ) -> Result<ProvisionedResource>;

    async fn create_or_update_subnet(
        &self,
        resource_group: &str,
        network: &str,
        name: &str,
        params: &SubnetParams,
    ) -> Result<ProvisionedResource>;
}

#[derive(Debug, Clone, Serialize)]
pub struct NodePoolParams {
    pub name: String,
    pub node_count: u32,
    pub vm_size: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterParams {
    pub location: String,
    pub dns_prefix: String,
    pub node_pool: NodePoolParams,
    /// Subnet the node pool is attached to, if already known
    pub subnet_id: Option<String>,
}

#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: &ClusterParams,
    ) -> Result<ProvisionedResource>;
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseServerParams {
    pub location: String,
    pub administrator_login: String,
    pub administrator_password: Secret,
    pub version: String,
    pub sku_name: String,
    pub tier: String,
    pub storage_size_gb: u32,
    /// Delegated subnet the server is injected into; public access when absent
    pub subnet_id: Option<String>,
    pub private_dns_zone_id: Option<String>,
}

#[async_trait]
pub trait DatabaseClient: Send + Sync {
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: &DatabaseServerParams,
    ) -> Result<ProvisionedResource>;
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageAccountParams {
    pub location: String,
    pub sku_name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerParams {
    pub public_access: String,
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn create_or_update_account(
        &self,
        resource_group: &str,
        name: &str,
        params: &StorageAccountParams,
    ) -> Result<StorageAccount>;

    async fn create_or_update_container(
        &self,
        resource_group: &str,
        account: &str,
        name: &str,
        params: &ContainerParams,
    ) -> Result<ProvisionedResource>;
}

#[derive(Debug, Clone, Serialize)]
pub struct CdnProfileParams {
    pub sku_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CdnEndpointParams {
    /// Hostname of the origin (the storage account's blob host)
    pub origin_host: String,
}

#[async_trait]
pub trait CdnClient: Send + Sync {
    async fn create_or_update_profile(
        &self,
        resource_group: &str,
        name: &str,
        params: &CdnProfileParams,
    ) -> Result<ProvisionedResource>;

    async fn create_or_update_endpoint(
        &self,
        resource_group: &str,
        profile: &str,
        name: &str,
        params: &CdnEndpointParams,
    ) -> Result<ProvisionedResource>;
}
