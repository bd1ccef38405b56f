//! Fake resource clients for tests

use crate::config::{DeploymentConfig, ENV_DB_ADMIN_PASSWORD, ENV_SUBSCRIPTION_ID};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use stratus_cloud::{
    AccountClient, AccountInfo, CdnClient, CdnEndpointParams, CdnProfileParams, CloudError,
    ClusterClient, ClusterParams, ContainerParams, DatabaseClient, DatabaseServerParams,
    NetworkClient, ProvisionedResource, ResourceGroupClient, ResourceGroupParams, Result,
    StorageAccount, StorageAccountParams, StorageClient, SubnetParams, VirtualNetworkParams,
};

pub(crate) const TEST_SUBSCRIPTION: &str = "00000000-0000-0000-0000-00000000abcd";
pub(crate) const TEST_PASSWORD: &str = "pg-Secret-Value-42!";

pub(crate) fn test_config() -> DeploymentConfig {
    DeploymentConfig::resolve_with(|key| match key {
        ENV_SUBSCRIPTION_ID => Some(TEST_SUBSCRIPTION.to_string()),
        ENV_DB_ADMIN_PASSWORD => Some(TEST_PASSWORD.to_string()),
        _ => None,
    })
    .unwrap()
}

enum Failure {
    Always,
    FirstN(u32),
}

/// Records every call and fails the ones it is told to.
///
/// Operation keys: `account`, `resource_group`, `delete_resource_group`,
/// `network`, `subnet:<name>`, `cluster`, `database`, `storage_account`,
/// `container`, `cdn_profile`, `cdn_endpoint` (logged as `cdn_endpoint:<origin>`).
pub(crate) struct FakeCloud {
    subscription_id: String,
    failures: HashMap<String, Failure>,
    latency: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl FakeCloud {
    pub fn new(subscription_id: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            failures: HashMap::new(),
            latency: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_always(mut self, key: &str) -> Self {
        self.failures.insert(key.to_string(), Failure::Always);
        self
    }

    /// Fail the first `n` calls, then succeed
    pub fn fail_first(mut self, key: &str, n: u32) -> Self {
        self.failures.insert(key.to_string(), Failure::FirstN(n));
        self
    }

    pub fn with_latency(mut self, key: &str, latency: Duration) -> Self {
        self.latency.insert(key.to_string(), latency);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose log entry is `key` or starts with `key:`
    pub fn count(&self, key: &str) -> usize {
        let prefix = format!("{}:", key);
        self.calls()
            .iter()
            .filter(|c| *c == key || c.starts_with(&prefix))
            .count()
    }

    async fn call(&self, key: &str, detail: Option<&str>) -> Result<()> {
        let entry = match detail {
            Some(detail) => format!("{}:{}", key, detail),
            None => key.to_string(),
        };
        self.calls.lock().unwrap().push(entry);

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(key.to_string()).or_insert(0);
            *n += 1;
            *n
        };

        if let Some(latency) = self.latency.get(key) {
            tokio::time::sleep(*latency).await;
        }

        let fail = match self.failures.get(key) {
            Some(Failure::Always) => true,
            Some(Failure::FirstN(n)) => attempt <= *n,
            None => false,
        };
        if fail {
            return Err(CloudError::Api {
                status: 503,
                code: "ServiceUnavailable".to_string(),
                message: format!("{} unavailable (attempt {})", key, attempt),
            });
        }
        Ok(())
    }

    fn resource(&self, resource_group: &str, kind: &str, name: &str) -> ProvisionedResource {
        ProvisionedResource::new(
            format!(
                "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
                self.subscription_id, resource_group, kind, name
            ),
            name,
            kind,
        )
        .with_attribute("provisioningState", serde_json::json!("Succeeded"))
    }
}

#[async_trait]
impl AccountClient for FakeCloud {
    async fn current_account(&self) -> Result<AccountInfo> {
        self.call("account", None).await?;
        Ok(AccountInfo {
            subscription_id: self.subscription_id.clone(),
            display_name: "Fake Subscription".to_string(),
            state: "Enabled".to_string(),
        })
    }
}

#[async_trait]
impl ResourceGroupClient for FakeCloud {
    async fn create_or_update(
        &self,
        name: &str,
        _params: &ResourceGroupParams,
    ) -> Result<ProvisionedResource> {
        self.call("resource_group", None).await?;
        Ok(self.resource(name, "Microsoft.Resources/resourceGroups", name))
    }

    async fn delete(&self, _name: &str) -> Result<()> {
        self.call("delete_resource_group", None).await
    }
}

#[async_trait]
impl NetworkClient for FakeCloud {
    async fn create_or_update_network(
        &self,
        resource_group: &str,
        name: &str,
        _params: &VirtualNetworkParams,
    ) -> Result<ProvisionedResource> {
        self.call("network", None).await?;
        Ok(self.resource(resource_group, "Microsoft.Network/virtualNetworks", name))
    }

    async fn create_or_update_subnet(
        &self,
        resource_group: &str,
        _network: &str,
        name: &str,
        params: &SubnetParams,
    ) -> Result<ProvisionedResource> {
        self.call(&format!("subnet:{}", name), None).await?;
        Ok(self
            .resource(resource_group, "Microsoft.Network/virtualNetworks/subnets", name)
            .with_attribute("delegation", serde_json::json!(params.delegation)))
    }
}

#[async_trait]
impl ClusterClient for FakeCloud {
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: &ClusterParams,
    ) -> Result<ProvisionedResource> {
        self.call("cluster", None).await?;
        Ok(self
            .resource(resource_group, "Microsoft.ContainerService/managedClusters", name)
            .with_attribute("subnetId", serde_json::json!(params.subnet_id)))
    }
}

#[async_trait]
impl DatabaseClient for FakeCloud {
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: &DatabaseServerParams,
    ) -> Result<ProvisionedResource> {
        self.call("database", None).await?;
        Ok(self
            .resource(resource_group, "Microsoft.DBforPostgreSQL/flexibleServers", name)
            .with_attribute("subnetId", serde_json::json!(params.subnet_id)))
    }
}

#[async_trait]
impl StorageClient for FakeCloud {
    async fn create_or_update_account(
        &self,
        resource_group: &str,
        name: &str,
        _params: &StorageAccountParams,
    ) -> Result<StorageAccount> {
        self.call("storage_account", None).await?;
        Ok(StorageAccount {
            resource: self.resource(resource_group, "Microsoft.Storage/storageAccounts", name),
            blob_host: format!("{}.blob.core.windows.net", name),
        })
    }

    async fn create_or_update_container(
        &self,
        resource_group: &str,
        _account: &str,
        name: &str,
        _params: &ContainerParams,
    ) -> Result<ProvisionedResource> {
        self.call("container", None).await?;
        Ok(self.resource(
            resource_group,
            "Microsoft.Storage/storageAccounts/blobServices/containers",
            name,
        ))
    }
}

#[async_trait]
impl CdnClient for FakeCloud {
    async fn create_or_update_profile(
        &self,
        resource_group: &str,
        name: &str,
        _params: &CdnProfileParams,
    ) -> Result<ProvisionedResource> {
        self.call("cdn_profile", None).await?;
        Ok(self.resource(resource_group, "Microsoft.Cdn/profiles", name))
    }

    async fn create_or_update_endpoint(
        &self,
        resource_group: &str,
        _profile: &str,
        name: &str,
        params: &CdnEndpointParams,
    ) -> Result<ProvisionedResource> {
        self.call("cdn_endpoint", Some(&params.origin_host)).await?;
        Ok(self
            .resource(resource_group, "Microsoft.Cdn/profiles/endpoints", name)
            .with_attribute(
                "hostName",
                serde_json::json!(format!("{}.azureedge.net", name)),
            ))
    }
}
