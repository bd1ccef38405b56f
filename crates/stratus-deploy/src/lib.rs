//! Stratus deployment engine
//!
//! Provisions a fixed topology of cloud resources as an ordered,
//! dependency-aware pipeline:
//!
//! ```text
//! validate ─► resource group ─► network (+ subnets, fanned out)
//!                                  │
//!                     ┌────────────┴────────────┐
//!                     ▼                         ▼
//!              compute cluster           database server
//!                     └────────────┬────────────┘
//!                                  ▼
//!                   storage account ─► container
//!                                  │  (blob hostname)
//!                                  ▼
//!                       CDN profile ─► CDN endpoint
//! ```
//!
//! Every remote call goes through [`retry::retry`]; the first step whose
//! retries are exhausted aborts the whole deployment. Nothing is rolled back.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratus_deploy::{Clients, DeploymentConfig, DeploymentPipeline, TracingReporter};
//!
//! let config = DeploymentConfig::from_env()?;
//! let clients = Clients::from_provider(Arc::new(provider));
//! let mut pipeline = DeploymentPipeline::new(config, clients, Arc::new(TracingReporter));
//! let summary = pipeline.deploy().await?;
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod reporter;
pub mod retry;
pub mod steps;
pub mod teardown;

#[cfg(test)]
mod testing;

pub use config::{
    CdnConfig, ClusterConfig, ComputeMode, DatabaseConfig, DeploymentConfig, NetworkConfig,
    StorageConfig, SubnetConfig,
};
pub use error::{DeployError, Result, StepError, ValidationError};
pub use pipeline::{DeploymentPipeline, DeploymentSummary, PipelineState, plan};
pub use reporter::{DeployEvent, MemoryReporter, Reporter, TracingReporter};
pub use retry::{AttemptError, RetryExhausted, RetryPolicy, retry};
pub use steps::{Clients, StepKind};
pub use teardown::{Teardown, teardown_plan};
