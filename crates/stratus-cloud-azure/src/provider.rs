//! Resource clients backed by Azure Resource Manager

use crate::arm::ArmClient;
use crate::credentials::AzureCredentials;
use crate::error::{AzureError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use stratus_cloud::{
    AccountClient, AccountInfo, CdnClient, CdnEndpointParams, CdnProfileParams, ClusterClient,
    ClusterParams, ContainerParams, DatabaseClient, DatabaseServerParams, NetworkClient,
    ProvisionedResource, ResourceGroupClient, ResourceGroupParams, StorageAccount,
    StorageAccountParams, StorageClient, SubnetParams, VirtualNetworkParams,
};

const API_SUBSCRIPTIONS: &str = "2022-12-01";
const API_RESOURCE_GROUPS: &str = "2021-04-01";
const API_NETWORK: &str = "2023-09-01";
const API_CONTAINER_SERVICE: &str = "2024-02-01";
const API_POSTGRES: &str = "2022-12-01";
const API_STORAGE: &str = "2023-01-01";
const API_CDN: &str = "2023-05-01";

/// Attributes copied from an ARM resource body into [`ProvisionedResource::attributes`]
const PROPERTY_ATTRIBUTES: &[&str] = &[
    "provisioningState",
    "hostName",
    "fullyQualifiedDomainName",
    "fqdn",
    "addressPrefix",
];

/// Every resource client, talking to one subscription
pub struct AzureProvider {
    arm: ArmClient,
    subscription_id: String,
}

impl AzureProvider {
    pub fn new(credentials: AzureCredentials, subscription_id: impl Into<String>) -> Self {
        Self::with_client(ArmClient::new(credentials), subscription_id)
    }

    pub fn with_client(arm: ArmClient, subscription_id: impl Into<String>) -> Self {
        Self {
            arm,
            subscription_id: subscription_id.into(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn group_path(&self, resource_group: &str) -> String {
        format!(
            "/subscriptions/{}/resourcegroups/{}",
            self.subscription_id, resource_group
        )
    }

    /// `resource` is relative to `providers/`, e.g. `Microsoft.Network/virtualNetworks/vnet`
    fn resource_path(&self, resource_group: &str, resource: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, resource_group, resource
        )
    }

    async fn put(
        &self,
        path: &str,
        api_version: &str,
        body: Value,
    ) -> Result<ProvisionedResource> {
        let state = self.arm.put(path, api_version, &body).await?;
        to_resource(&state)
    }
}

/// Convert an ARM resource body into a [`ProvisionedResource`]
pub(crate) fn to_resource(body: &Value) -> Result<ProvisionedResource> {
    let field = |name: &str| {
        body.get(name).and_then(Value::as_str).ok_or_else(|| {
            AzureError::InvalidResponse(format!("resource body has no '{}'", name))
        })
    };

    let mut resource = ProvisionedResource::new(field("id")?, field("name")?, field("type")?);
    if let Some(location) = body.get("location") {
        resource = resource.with_attribute("location", location.clone());
    }
    if let Some(properties) = body.get("properties") {
        for key in PROPERTY_ATTRIBUTES {
            if let Some(value) = properties.get(*key) {
                resource = resource.with_attribute(*key, value.clone());
            }
        }
    }
    Ok(resource)
}

/// Host part of a storage endpoint URL (`https://acct.blob.core.windows.net/`)
pub(crate) fn blob_host(endpoint: &str) -> Option<String> {
    let host = endpoint
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    (!host.is_empty()).then(|| host.to_string())
}

#[async_trait]
impl AccountClient for AzureProvider {
    async fn current_account(&self) -> stratus_cloud::Result<AccountInfo> {
        let path = format!("/subscriptions/{}", self.subscription_id);
        let body = self.arm.get(&path, API_SUBSCRIPTIONS).await?;

        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(AccountInfo {
            subscription_id: text("subscriptionId"),
            display_name: text("displayName"),
            state: text("state"),
        })
    }
}

#[async_trait]
impl ResourceGroupClient for AzureProvider {
    async fn create_or_update(
        &self,
        name: &str,
        params: &ResourceGroupParams,
    ) -> stratus_cloud::Result<ProvisionedResource> {
        let body = json!({ "location": params.location });
        Ok(self
            .put(&self.group_path(name), API_RESOURCE_GROUPS, body)
            .await?)
    }

    async fn delete(&self, name: &str) -> stratus_cloud::Result<()> {
        Ok(self
            .arm
            .delete(&self.group_path(name), API_RESOURCE_GROUPS)
            .await?)
    }
}

#[async_trait]
impl NetworkClient for AzureProvider {
    async fn create_or_update_network(
        &self,
        resource_group: &str,
        name: &str,
        params: &VirtualNetworkParams,
    ) -> stratus_cloud::Result<ProvisionedResource> {
        let path = self.resource_path(
            resource_group,
            &format!("Microsoft.Network/virtualNetworks/{}", name),
        );
        let body = json!({
            "location": params.location,
            "properties": {
                "addressSpace": { "addressPrefixes": params.address_prefixes },
            },
        });
        Ok(self.put(&path, API_NETWORK, body).await?)
    }

    async fn create_or_update_subnet(
        &self,
        resource_group: &str,
        network: &str,
        name: &str,
        params: &SubnetParams,
    ) -> stratus_cloud::Result<ProvisionedResource> {
        let path = self.resource_path(
            resource_group,
            &format!("Microsoft.Network/virtualNetworks/{}/subnets/{}", network, name),
        );
        let mut body = json!({
            "properties": { "addressPrefix": params.address_prefix },
        });
        if let Some(service) = &params.delegation {
            body["properties"]["delegations"] = json!([{
                "name": format!("{}-delegation", name),
                "properties": { "serviceName": service },
            }]);
        }
        Ok(self.put(&path, API_NETWORK, body).await?)
    }
}

#[async_trait]
impl ClusterClient for AzureProvider {
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: &ClusterParams,
    ) -> stratus_cloud::Result<ProvisionedResource> {
        let path = self.resource_path(
            resource_group,
            &format!("Microsoft.ContainerService/managedClusters/{}", name),
        );
        let mut pool = json!({
            "name": params.node_pool.name,
            "count": params.node_pool.node_count,
            "vmSize": params.node_pool.vm_size,
            "mode": "System",
            "osType": "Linux",
        });
        if let Some(subnet_id) = &params.subnet_id {
            pool["vnetSubnetID"] = json!(subnet_id);
        }
        let body = json!({
            "location": params.location,
            "identity": { "type": "SystemAssigned" },
            "properties": {
                "dnsPrefix": params.dns_prefix,
                "agentPoolProfiles": [pool],
            },
        });
        Ok(self.put(&path, API_CONTAINER_SERVICE, body).await?)
    }
}

#[async_trait]
impl DatabaseClient for AzureProvider {
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: &DatabaseServerParams,
    ) -> stratus_cloud::Result<ProvisionedResource> {
        let path = self.resource_path(
            resource_group,
            &format!("Microsoft.DBforPostgreSQL/flexibleServers/{}", name),
        );
        let mut body = json!({
            "location": params.location,
            "sku": { "name": params.sku_name, "tier": params.tier },
            "properties": {
                "administratorLogin": params.administrator_login,
                "administratorLoginPassword": params.administrator_password.expose(),
                "version": params.version,
                "storage": { "storageSizeGB": params.storage_size_gb },
            },
        });
        if let Some(subnet_id) = &params.subnet_id {
            let mut network = json!({ "delegatedSubnetResourceId": subnet_id });
            if let Some(zone) = &params.private_dns_zone_id {
                network["privateDnsZoneArmResourceId"] = json!(zone);
            }
            body["properties"]["network"] = network;
        }
        Ok(self.put(&path, API_POSTGRES, body).await?)
    }
}

#[async_trait]
impl StorageClient for AzureProvider {
    async fn create_or_update_account(
        &self,
        resource_group: &str,
        name: &str,
        params: &StorageAccountParams,
    ) -> stratus_cloud::Result<StorageAccount> {
        let path = self.resource_path(
            resource_group,
            &format!("Microsoft.Storage/storageAccounts/{}", name),
        );
        let body = json!({
            "location": params.location,
            "sku": { "name": params.sku_name },
            "kind": params.kind,
        });

        let state = self.arm.put(&path, API_STORAGE, &body).await?;
        let host = state
            .pointer("/properties/primaryEndpoints/blob")
            .and_then(Value::as_str)
            .and_then(blob_host)
            .ok_or_else(|| {
                AzureError::InvalidResponse(format!(
                    "storage account '{}' reported no blob endpoint",
                    name
                ))
            })?;

        Ok(StorageAccount {
            resource: to_resource(&state)?,
            blob_host: host,
        })
    }

    async fn create_or_update_container(
        &self,
        resource_group: &str,
        account: &str,
        name: &str,
        params: &ContainerParams,
    ) -> stratus_cloud::Result<ProvisionedResource> {
        let path = self.resource_path(
            resource_group,
            &format!(
                "Microsoft.Storage/storageAccounts/{}/blobServices/default/containers/{}",
                account, name
            ),
        );
        let body = json!({
            "properties": { "publicAccess": params.public_access },
        });
        Ok(self.put(&path, API_STORAGE, body).await?)
    }
}

#[async_trait]
impl CdnClient for AzureProvider {
    async fn create_or_update_profile(
        &self,
        resource_group: &str,
        name: &str,
        params: &CdnProfileParams,
    ) -> stratus_cloud::Result<ProvisionedResource> {
        let path =
            self.resource_path(resource_group, &format!("Microsoft.Cdn/profiles/{}", name));
        let body = json!({
            "location": "global",
            "sku": { "name": params.sku_name },
        });
        Ok(self.put(&path, API_CDN, body).await?)
    }

    async fn create_or_update_endpoint(
        &self,
        resource_group: &str,
        profile: &str,
        name: &str,
        params: &CdnEndpointParams,
    ) -> stratus_cloud::Result<ProvisionedResource> {
        let path = self.resource_path(
            resource_group,
            &format!("Microsoft.Cdn/profiles/{}/endpoints/{}", profile, name),
        );
        let body = json!({
            "location": "global",
            "properties": {
                "originHostHeader": params.origin_host,
                "isHttpAllowed": false,
                "origins": [{
                    "name": "storage-origin",
                    "properties": { "hostName": params.origin_host },
                }],
            },
        });
        Ok(self.put(&path, API_CDN, body).await?)
    }
}
