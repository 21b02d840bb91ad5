//! Stratus - API Management service broker
//!
//! Usage:
//!   stratus catalog
//!   stratus provision --request provision.json
//!   stratus poll --request -            # read the request from stdin
//!   stratus bind --request bind.json -v

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use stratus::cli::config::{load_config, ConfigOverrides};
use stratus::cli::request::{read_request, STDIN_MARKER};
use stratus::cli::{execute, output, Verb};
use stratus_broker::{ApiManagementBroker, ReqwestTransport};
use stratus_logging::{init_logging, LogConfig};
use stratus_protocol::BrokerError;
use stratus_security::AzureTokenProvider;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stratus")]
#[command(about = "Provision and bind Azure API Management through a service broker")]
#[command(version)]
struct Cli {
    /// Log to stderr at the file log level
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Broker config file (defaults to $STRATUS_HOME/config.toml when present)
    #[arg(long, global = true, env = "STRATUS_CONFIG")]
    config: Option<PathBuf>,

    /// Do not write a log file
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct OverrideArgs {
    /// Resource group used when a request names none
    #[arg(long, global = true, env = "STRATUS_DEFAULT_RESOURCE_GROUP")]
    default_resource_group: Option<String>,

    /// Location used when a request names none
    #[arg(long, global = true, env = "STRATUS_DEFAULT_LOCATION")]
    default_location: Option<String>,

    /// Per-request timeout for resource manager calls, in seconds
    #[arg(long, global = true, env = "STRATUS_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Treat a missing API as already unbound
    #[arg(long, global = true, env = "STRATUS_UNBIND_TOLERATES_MISSING_API")]
    unbind_tolerates_missing_api: bool,
}

impl From<&OverrideArgs> for ConfigOverrides {
    fn from(args: &OverrideArgs) -> Self {
        ConfigOverrides {
            default_resource_group: args.default_resource_group.clone(),
            default_location: args.default_location.clone(),
            request_timeout_secs: args.request_timeout_secs,
            unbind_tolerates_missing_api: args.unbind_tolerates_missing_api,
        }
    }
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// Request document path, or - for stdin
    #[arg(short = 'r', long, default_value = STDIN_MARKER)]
    request: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the service catalog
    Catalog,
    /// Create an API Management instance
    Provision(RequestArgs),
    /// Report the state of the last provision or deprovision
    Poll(RequestArgs),
    /// Delete an API Management instance
    Deprovision(RequestArgs),
    /// Register a route as an API on an instance
    Bind(RequestArgs),
    /// Remove a bound API
    Unbind(RequestArgs),
    /// Print the Azure-side id for the instance a request names
    InstanceId(RequestArgs),
}

impl Commands {
    fn split(&self) -> (Verb, Option<&RequestArgs>) {
        match self {
            Commands::Catalog => (Verb::Catalog, None),
            Commands::Provision(args) => (Verb::Provision, Some(args)),
            Commands::Poll(args) => (Verb::Poll, Some(args)),
            Commands::Deprovision(args) => (Verb::Deprovision, Some(args)),
            Commands::Bind(args) => (Verb::Bind, Some(args)),
            Commands::Unbind(args) => (Verb::Unbind, Some(args)),
            Commands::InstanceId(args) => (Verb::InstanceId, Some(args)),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "stratus",
        verbose: cli.verbose,
        stderr_only: cli.no_log_file,
    }) {
        eprintln!("Warning: logging disabled: {:#}", err);
    }

    match run(cli).await {
        Ok(document) => {
            println!("{}", render(&document));
            ExitCode::SUCCESS
        }
        Err(err) => match err.downcast_ref::<BrokerError>() {
            Some(broker_err) => {
                println!("{}", render(&output::error_document(broker_err)));
                ExitCode::from(1)
            }
            None => {
                eprintln!("Error: {:#}", err);
                ExitCode::from(2)
            }
        },
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let config = load_config(cli.config.as_deref(), &ConfigOverrides::from(&cli.overrides))?;
    let (verb, request_args) = cli.command.split();

    let request = match request_args {
        Some(args) if verb.takes_request() => Some(read_request(&args.request)?),
        _ => None,
    };

    let transport = ReqwestTransport::new(config.request_timeout())
        .context("Failed to build HTTP transport")?;
    let broker = ApiManagementBroker::new(
        config,
        Arc::new(transport),
        Arc::new(AzureTokenProvider::new()),
    );

    info!(verb = verb.name(), "stratus starting");
    Ok(execute(&broker, verb, request).await?)
}

fn render(document: &Value) -> String {
    serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string())
}
