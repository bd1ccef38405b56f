//! Deployment configuration
//!
//! Resolved once at startup from the process environment plus built-in
//! defaults. Mandatory keys are checked before anything else happens, so a
//! missing secret stops the process before any resource client exists.

use crate::error::ValidationError;
use crate::retry::RetryPolicy;
use std::net::Ipv4Addr;
use std::time::Duration;
use stratus_cloud::Secret;

pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENV_DB_ADMIN_PASSWORD: &str = "DB_ADMIN_PASSWORD";
pub const ENV_RESOURCE_GROUP: &str = "RESOURCE_GROUP_NAME";
pub const ENV_REGION: &str = "AZURE_REGION";
pub const ENV_STORAGE_ACCOUNT: &str = "STORAGE_ACCOUNT_NAME";
pub const ENV_DB_ADMIN_USERNAME: &str = "DB_ADMIN_USERNAME";
pub const ENV_DB_PRIVATE_DNS_ZONE: &str = "DB_PRIVATE_DNS_ZONE_ID";
pub const ENV_MAX_ATTEMPTS: &str = "STRATUS_MAX_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "STRATUS_RETRY_DELAY_MS";
pub const ENV_ATTEMPT_TIMEOUT_SECS: &str = "STRATUS_ATTEMPT_TIMEOUT_SECS";
pub const ENV_PARALLEL_COMPUTE: &str = "STRATUS_PARALLEL_COMPUTE";

/// Keys that have no default
pub const REQUIRED_KEYS: [&str; 2] = [ENV_SUBSCRIPTION_ID, ENV_DB_ADMIN_PASSWORD];

const DEFAULT_RESOURCE_GROUP: &str = "stratus-rg";
const DEFAULT_REGION: &str = "eastus";
const DEFAULT_STORAGE_ACCOUNT: &str = "stratusassets";
const DEFAULT_DB_ADMIN_USERNAME: &str = "stratusadmin";

/// Delegation the database subnet needs before a flexible server can join it
pub const DATABASE_SUBNET_DELEGATION: &str = "Microsoft.DBforPostgreSQL/flexibleServers";

/// How the compute cluster and database server steps are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeMode {
    /// Cluster, then database
    #[default]
    Sequential,
    /// Both at once; a failure in one does not prevent the other's attempts
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetConfig {
    pub name: String,
    pub address_prefix: String,
    pub delegation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub name: String,
    pub address_space: String,
    /// Subnet the cluster node pool attaches to
    pub cluster_subnet: SubnetConfig,
    pub database_subnet: SubnetConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub name: String,
    pub dns_prefix: String,
    pub node_pool_name: String,
    pub node_count: u32,
    pub vm_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub server_name: String,
    pub admin_username: String,
    pub admin_password: Secret,
    pub version: String,
    pub sku_name: String,
    pub tier: String,
    pub storage_size_gb: u32,
    /// Private DNS zone for the server's VNet-integrated name; Azure picks one when unset
    pub private_dns_zone_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub account_name: String,
    pub sku_name: String,
    pub kind: String,
    pub container_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnConfig {
    pub profile_name: String,
    pub endpoint_name: String,
    pub sku_name: String,
}

/// Immutable deployment parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub location: String,
    pub network: NetworkConfig,
    pub cluster: ClusterConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub cdn: CdnConfig,
    pub retry: RetryPolicy,
    pub compute_mode: ComputeMode,
}

impl DeploymentConfig {
    /// Resolve from the process environment
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup.
    ///
    /// Blank values count as absent. Every missing mandatory key is reported
    /// at once.
    pub fn resolve_with<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| get(**key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingKeys(missing));
        }

        let subscription_id = get(ENV_SUBSCRIPTION_ID).unwrap_or_default();
        let admin_password = Secret::new(lookup(ENV_DB_ADMIN_PASSWORD).unwrap_or_default());

        let mut retry = RetryPolicy::default();
        if let Some(value) = get(ENV_MAX_ATTEMPTS) {
            retry.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = get(ENV_RETRY_DELAY_MS) {
            retry.delay = Duration::from_millis(parse_number(ENV_RETRY_DELAY_MS, &value)?);
        }
        if let Some(value) = get(ENV_ATTEMPT_TIMEOUT_SECS) {
            retry.attempt_timeout = Some(Duration::from_secs(parse_number(
                ENV_ATTEMPT_TIMEOUT_SECS,
                &value,
            )?));
        }

        let compute_mode = match get(ENV_PARALLEL_COMPUTE) {
            Some(value) => {
                if parse_flag(ENV_PARALLEL_COMPUTE, &value)? {
                    ComputeMode::Concurrent
                } else {
                    ComputeMode::Sequential
                }
            }
            None => ComputeMode::Sequential,
        };

        let config = Self {
            subscription_id,
            resource_group: get(ENV_RESOURCE_GROUP)
                .unwrap_or_else(|| DEFAULT_RESOURCE_GROUP.to_string()),
            location: get(ENV_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            network: NetworkConfig {
                name: "stratus-vnet".to_string(),
                address_space: "10.0.0.0/16".to_string(),
                cluster_subnet: SubnetConfig {
                    name: "aks-subnet".to_string(),
                    address_prefix: "10.0.1.0/24".to_string(),
                    delegation: None,
                },
                database_subnet: SubnetConfig {
                    name: "db-subnet".to_string(),
                    address_prefix: "10.0.2.0/24".to_string(),
                    delegation: Some(DATABASE_SUBNET_DELEGATION.to_string()),
                },
            },
            cluster: ClusterConfig {
                name: "stratus-aks".to_string(),
                dns_prefix: "stratus-aks".to_string(),
                node_pool_name: "nodepool1".to_string(),
                node_count: 3,
                vm_size: "Standard_DS2_v2".to_string(),
            },
            database: DatabaseConfig {
                server_name: "stratus-pg".to_string(),
                admin_username: get(ENV_DB_ADMIN_USERNAME)
                    .unwrap_or_else(|| DEFAULT_DB_ADMIN_USERNAME.to_string()),
                admin_password,
                version: "14".to_string(),
                sku_name: "Standard_D2s_v3".to_string(),
                tier: "GeneralPurpose".to_string(),
                storage_size_gb: 32,
                private_dns_zone_id: get(ENV_DB_PRIVATE_DNS_ZONE),
            },
            storage: StorageConfig {
                account_name: get(ENV_STORAGE_ACCOUNT)
                    .unwrap_or_else(|| DEFAULT_STORAGE_ACCOUNT.to_string()),
                sku_name: "Standard_LRS".to_string(),
                kind: "StorageV2".to_string(),
                container_name: "assets".to_string(),
            },
            cdn: CdnConfig {
                profile_name: "stratus-cdn".to_string(),
                endpoint_name: "stratus-endpoint".to_string(),
                sku_name: "Standard_Microsoft".to_string(),
            },
            retry,
            compute_mode,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every field the pipeline will use
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("subscription_id", self.subscription_id.as_str()),
            ("resource_group", self.resource_group.as_str()),
            ("location", self.location.as_str()),
            ("network.name", self.network.name.as_str()),
            ("network.cluster_subnet.name", self.network.cluster_subnet.name.as_str()),
            ("network.database_subnet.name", self.network.database_subnet.name.as_str()),
            ("cluster.name", self.cluster.name.as_str()),
            ("cluster.dns_prefix", self.cluster.dns_prefix.as_str()),
            ("cluster.node_pool_name", self.cluster.node_pool_name.as_str()),
            ("cluster.vm_size", self.cluster.vm_size.as_str()),
            ("database.server_name", self.database.server_name.as_str()),
            ("database.admin_username", self.database.admin_username.as_str()),
            ("database.admin_password", self.database.admin_password.expose()),
            ("database.version", self.database.version.as_str()),
            ("database.sku_name", self.database.sku_name.as_str()),
            ("database.tier", self.database.tier.as_str()),
            ("storage.account_name", self.storage.account_name.as_str()),
            ("storage.sku_name", self.storage.sku_name.as_str()),
            ("storage.kind", self.storage.kind.as_str()),
            ("storage.container_name", self.storage.container_name.as_str()),
            ("cdn.profile_name", self.cdn.profile_name.as_str()),
            ("cdn.endpoint_name", self.cdn.endpoint_name.as_str()),
            ("cdn.sku_name", self.cdn.sku_name.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyValue {
                    field: field.to_string(),
                });
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid(ENV_MAX_ATTEMPTS, "must be at least 1"));
        }
        if self.cluster.node_count == 0 {
            return Err(invalid("cluster.node_count", "must be at least 1"));
        }

        validate_storage_account_name(&self.storage.account_name)?;

        let space = parse_cidr("network.address_space", &self.network.address_space)?;
        for subnet in [&self.network.cluster_subnet, &self.network.database_subnet] {
            let key = format!("subnet '{}'", subnet.name);
            let prefix = parse_cidr(&key, &subnet.address_prefix)?;
            if !space.contains(&prefix) {
                return Err(invalid(
                    &key,
                    &format!(
                        "{} is outside the network address space {}",
                        subnet.address_prefix, self.network.address_space
                    ),
                ));
            }
        }
        let cluster = parse_cidr("cluster subnet", &self.network.cluster_subnet.address_prefix)?;
        let database = parse_cidr("database subnet", &self.network.database_subnet.address_prefix)?;
        if cluster.overlaps(&database) {
            return Err(invalid("network subnets", "cluster and database subnets overlap"));
        }

        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ValidationError> {
    value
        .parse::<T>()
        .map_err(|_| invalid(key, &format!("'{}' is not a valid number", value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, &format!("'{}' is not a boolean", value))),
    }
}

/// Storage account names are 3-24 characters of lowercase letters and digits
fn validate_storage_account_name(name: &str) -> Result<(), ValidationError> {
    let valid_len = (3..=24).contains(&name.len());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(invalid(
            ENV_STORAGE_ACCOUNT,
            &format!("'{}' must be 3-24 lowercase letters or digits", name),
        ))
    }
}

#[derive(Debug, Clone, Copy)]
struct Cidr {
    network: u32,
    prefix_len: u32,
}

impl Cidr {
    fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        }
    }

    fn contains(&self, other: &Cidr) -> bool {
        other.prefix_len >= self.prefix_len && (other.network & self.mask()) == self.network
    }

    fn overlaps(&self, other: &Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }
}

fn parse_cidr(key: &str, value: &str) -> Result<Cidr, ValidationError> {
    let malformed = || invalid(key, &format!("'{}' is not an IPv4 CIDR block", value));

    let (addr, len) = value.split_once('/').ok_or_else(malformed)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| malformed())?;
    let prefix_len: u32 = len.parse().map_err(|_| malformed())?;
    if prefix_len > 32 {
        return Err(malformed());
    }

    let cidr = Cidr {
        network: u32::from(addr),
        prefix_len,
    };
    if cidr.network & cidr.mask() != cidr.network {
        return Err(invalid(key, &format!("'{}' has host bits set", value)));
    }
    Ok(cidr)
}
