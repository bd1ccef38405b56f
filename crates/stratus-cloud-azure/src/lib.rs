//! Azure Resource Manager adapter for Stratus
//!
//! Implements every `stratus-cloud` resource client trait on top of the ARM
//! REST API. One [`AzureProvider`] serves all domains:
//!
//! | Trait | ARM resource type |
//! |---|---|
//! | `AccountClient` | `Microsoft.Resources/subscriptions` |
//! | `ResourceGroupClient` | `Microsoft.Resources/resourceGroups` |
//! | `NetworkClient` | `Microsoft.Network/virtualNetworks`, `.../subnets` |
//! | `ClusterClient` | `Microsoft.ContainerService/managedClusters` |
//! | `DatabaseClient` | `Microsoft.DBforPostgreSQL/flexibleServers` |
//! | `StorageClient` | `Microsoft.Storage/storageAccounts`, `.../containers` |
//! | `CdnClient` | `Microsoft.Cdn/profiles`, `.../endpoints` |
//!
//! # Requirements
//!
//! - `AZURE_ACCESS_TOKEN`: bearer token for the management endpoint
//! - `AZURE_RESOURCE_MANAGER_ENDPOINT` (optional): sovereign cloud endpoint
//!
//! # Example
//!
//! ```ignore
//! use stratus_cloud::AccountClient;
//! use stratus_cloud_azure::{AzureCredentials, AzureProvider};
//!
//! let provider = AzureProvider::new(AzureCredentials::from_env()?, subscription_id);
//! let account = provider.current_account().await?;
//! ```

pub mod arm;
pub mod credentials;
pub mod error;
pub mod provider;

pub use arm::{ArmClient, OperationStatus};
pub use credentials::AzureCredentials;
pub use error::{AzureError, Result};
pub use provider::AzureProvider;
