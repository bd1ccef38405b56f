//! Stratus Cloud Resource Clients
//!
//! This crate defines the boundary between the Stratus deployment engine
//! and the cloud control plane. Each resource domain gets its own narrow
//! capability trait so callers (and tests) only depend on what they use.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  stratus CLI                     │
//! │             (stratus deploy/destroy)             │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stratus-deploy                    │
//! │   config ─ retry ─ steps ─ pipeline ─ reporter   │
//! └─────────────────┬───────────────────────────────┘
//!                   │  capability traits
//! ┌─────────────────▼───────────────────────────────┐
//! │                stratus-cloud                     │
//! │  AccountClient  ResourceGroupClient  NetworkClient│
//! │  ClusterClient  DatabaseClient  StorageClient    │
//! │  CdnClient                                       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │  azure (ARM)  │
//!           └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod provider;
pub mod resource;
pub mod secret;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use provider::{
    AccountClient, AccountInfo, CdnClient, CdnEndpointParams, CdnProfileParams, ClusterClient,
    ClusterParams, ContainerParams, DatabaseClient, DatabaseServerParams, NetworkClient,
    NodePoolParams, ResourceGroupClient, ResourceGroupParams, StorageAccountParams, StorageClient,
    SubnetParams, VirtualNetworkParams,
};
pub use resource::{ProvisionedResource, StorageAccount};
pub use secret::Secret;
