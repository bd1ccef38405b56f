//! Resources returned by the control plane

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A resource that a create/update call has brought to a terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedResource {
    /// Provider-specific resource ID
    pub id: String,

    /// Resource name
    pub name: String,

    /// Resource type (e.g. "Microsoft.Network/virtualNetworks")
    pub resource_type: String,

    /// Resource attributes (provisioning state, hostnames, etc.)
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the create/update call completed
    pub provisioned_at: DateTime<Utc>,
}

impl ProvisionedResource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            provisioned_at: Utc::now(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Get an attribute as a string slice
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

/// A storage account together with the public hostname the CDN origin points at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageAccount {
    pub resource: ProvisionedResource,

    /// Primary blob endpoint host, e.g. `assets.blob.core.windows.net`
    pub blob_host: String,
}
