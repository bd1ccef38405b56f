mod commands;
mod console;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::future::Future;
use std::process::ExitCode;
use std::time::Duration;
use stratus_cloud_azure::AzureError;
use stratus_deploy::{ComputeMode, DeployError, DeploymentConfig, ValidationError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Provision a complete Azure environment in one ordered run", long_about = None)]
struct Cli {
    /// Log output format (logs go to stderr)
    #[arg(
        long,
        global = true,
        value_enum,
        env = "STRATUS_LOG_FORMAT",
        default_value_t = LogFormat::Text
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable logs; progress is printed to stdout
    Text,
    /// One JSON object per line; progress goes through the log stream only
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision every resource in dependency order
    Deploy {
        /// Print the plan and exit without calling Azure
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Delete the resource group and everything in it
    Destroy {
        /// Run without asking for confirmation
        #[arg(short, long)]
        yes: bool,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Check configuration and control plane access without provisioning
    Validate {
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Show the calls a deployment would make
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version information
    Version,
}

/// Overrides for the environment-derived execution settings
#[derive(Args, Debug, Default, Clone)]
struct TuningArgs {
    /// Attempts per remote call, including the first
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,
    /// Delay between attempts in milliseconds
    #[arg(long, value_name = "MS")]
    retry_delay_ms: Option<u64>,
    /// Give up on a single attempt after this many seconds
    #[arg(long, value_name = "SECS")]
    attempt_timeout_secs: Option<u64>,
    /// Create the compute cluster and database server concurrently
    #[arg(long)]
    parallel_compute: bool,
}

impl TuningArgs {
    fn apply(&self, config: &mut DeploymentConfig) {
        if let Some(n) = self.max_attempts {
            config.retry.max_attempts = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry.delay = Duration::from_millis(ms);
        }
        if let Some(secs) = self.attempt_timeout_secs {
            config.retry.attempt_timeout = Some(Duration::from_secs(secs));
        }
        if self.parallel_compute {
            config.compute_mode = ComputeMode::Concurrent;
        }
    }
}

/// Ctrl-C arrived while a command was running
#[derive(Debug, thiserror::Error)]
#[error("interrupted; resources created so far were left in place")]
struct Interrupted;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Run `fut` unless Ctrl-C arrives first; dropping it cancels the in-flight call
async fn interruptible<T>(fut: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
    tokio::select! {
        result = fut => result,
        _ = tokio::signal::ctrl_c() => Err(Interrupted.into()),
    }
}

/// 0 success, 1 deployment failure, 2 invalid configuration or access, 130 interrupted
fn exit_code(err: &anyhow::Error) -> u8 {
    if err.is::<Interrupted>() {
        return 130;
    }
    if let Some(deploy) = err.downcast_ref::<DeployError>() {
        return if deploy.is_validation() { 2 } else { 1 };
    }
    if err.is::<ValidationError>() {
        return 2;
    }
    if let Some(AzureError::MissingEnvVar(_)) = err.downcast_ref::<AzureError>() {
        return 2;
    }
    1
}

/// Follow-up advice printed under the error line
fn hint(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<DeployError>() {
        Some(deploy) if deploy.is_auth_failure() => Some(
            "the access token was rejected; refresh AZURE_ACCESS_TOKEN and check its role assignment",
        ),
        _ => None,
    }
}

fn load_config(tuning: &TuningArgs) -> anyhow::Result<DeploymentConfig> {
    let mut config = DeploymentConfig::from_env()?;
    tuning.apply(&mut config);
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.log_format;

    match cli.command {
        Commands::Version => {
            println!("stratus {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Plan { json } => {
            let config = load_config(&TuningArgs::default())?;
            commands::plan::handle(&config, json)
        }
        Commands::Validate { tuning } => {
            let config = load_config(&tuning)?;
            interruptible(commands::validate::handle(config, format)).await
        }
        Commands::Deploy { dry_run, tuning } => {
            let config = load_config(&tuning)?;
            if dry_run {
                return commands::plan::handle(&config, format == LogFormat::Json);
            }
            interruptible(commands::deploy::handle(config, format)).await
        }
        Commands::Destroy { yes, tuning } => {
            let config = load_config(&tuning)?;
            interruptible(commands::destroy::handle(config, yes, format)).await
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            if let Some(hint) = hint(&err) {
                eprintln!("{} {}", "hint:".yellow().bold(), hint);
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Interrupted.into()), 130);
        assert_eq!(
            exit_code(&ValidationError::MissingKeys(vec!["DB_ADMIN_PASSWORD".into()]).into()),
            2
        );
        let empty = ValidationError::EmptyValue {
            field: "cluster.name".into(),
        };
        assert_eq!(exit_code(&DeployError::from(empty).into()), 2);
        assert_eq!(
            exit_code(&AzureError::MissingEnvVar("AZURE_ACCESS_TOKEN".into()).into()),
            2
        );
        assert_eq!(
            exit_code(&DeployError::AlreadyRun("succeeded".into()).into()),
            1
        );
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }

    #[test]
    fn test_hint_for_rejected_token() {
        use stratus_cloud::CloudError;
        use stratus_deploy::{AttemptError, RetryExhausted};

        let rejected = ValidationError::Connectivity(RetryExhausted {
            operation: "resolve account".to_string(),
            attempts: 3,
            last: AttemptError::Failed(CloudError::Api {
                status: 403,
                code: "AuthorizationFailed".to_string(),
                message: "no access".to_string(),
            }),
        });
        let hint = hint(&DeployError::from(rejected).into()).unwrap();
        assert!(hint.contains("AZURE_ACCESS_TOKEN"));

        assert!(super::hint(&anyhow::anyhow!("boom")).is_none());
    }

    #[test]
    fn test_tuning_overrides() {
        let mut config = DeploymentConfig::resolve_with(|key| match key {
            "AZURE_SUBSCRIPTION_ID" => Some("sub".to_string()),
            "DB_ADMIN_PASSWORD" => Some("pw".to_string()),
            _ => None,
        })
        .unwrap();

        TuningArgs {
            max_attempts: Some(5),
            retry_delay_ms: Some(250),
            attempt_timeout_secs: Some(60),
            parallel_compute: true,
        }
        .apply(&mut config);

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_millis(250));
        assert_eq!(config.retry.attempt_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.compute_mode, ComputeMode::Concurrent);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
