//! Command line surface and dispatch

use crate::auth::{AzureAdAuth, TokenSource};
use crate::config::{AzureConfig, Config};
use crate::datalake::{DataLakeClient, DEFAULT_FILENAME, DEFAULT_PATH};
use crate::dataverse::{DataverseClient, DataverseError};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Operation understood by `datalake`
pub const SAMPLE_DATA: &str = "sampledata";

/// Operation understood by `dataverse`
pub const VIRTUAL_TABLE: &str = "virtualtable";

#[derive(Parser, Debug)]
#[command(name = "metricprovider-helper")]
#[command(about = "Seed Azure Data Lake and register Dataverse virtual tables for the metric provider")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage Azure Data Lake content
    Datalake(DatalakeArgs),
    /// Manage Dataverse objects
    Dataverse(DataverseArgs),
}

/// Azure AD credentials. Without a client secret the Azure CLI login is used.
#[derive(Args, Debug, Clone, Default)]
pub struct AadArgs {
    #[arg(long = "aad_tenant", short = 't')]
    pub aad_tenant: Option<String>,

    #[arg(long = "aad_client_id", short = 'i')]
    pub aad_client_id: Option<String>,

    #[arg(long = "aad_client_secret", short = 's')]
    pub aad_client_secret: Option<String>,
}

#[derive(Args, Debug)]
pub struct DatalakeArgs {
    /// Operation to run: sampledata
    #[arg(value_name = "TYPE")]
    pub kind: String,

    /// Storage account name
    #[arg(long = "datalake_name", short = 'd')]
    pub datalake_name: String,

    /// Filesystem (container) receiving the file
    #[arg(long = "datalake_container_name", short = 'c')]
    pub datalake_container_name: String,

    #[command(flatten)]
    pub aad: AadArgs,
}

#[derive(Args, Debug)]
pub struct DataverseArgs {
    /// Operation to run: virtualtable
    #[arg(value_name = "TYPE")]
    pub kind: String,

    /// Power Apps organization (environment) name
    #[arg(long = "power_apps_org", short = 'o')]
    pub power_apps_org: String,

    /// Publisher used as a prefix for the table
    #[arg(long = "publisher", short = 'p')]
    pub publisher: String,

    /// Name of the virtual table data provider
    #[arg(long = "provider_name", short = 'r')]
    pub provider_name: Option<String>,

    /// Name of the virtual table data source
    #[arg(long = "datasource_name", short = 'd')]
    pub datasource_name: Option<String>,

    #[command(flatten)]
    pub aad: AadArgs,
}

/// How a dispatched command ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Completed,
    /// The TYPE argument named no known operation
    InvalidCommand(String),
}

/// Only `--aad_client_secret` selects app-only auth; tenant and client id
/// flags win over configuration.
fn auth_from(aad: &AadArgs, azure: &AzureConfig) -> Result<AzureAdAuth> {
    let source = TokenSource::from_parts(
        aad.aad_tenant.clone().or_else(|| azure.tenant_id.clone()),
        aad.aad_client_id.clone().or_else(|| azure.client_id.clone()),
        aad.aad_client_secret.clone(),
    )?;

    tracing::debug!("Token source: {:?}", source);
    Ok(AzureAdAuth::new(source, azure.authority.clone()))
}

/// Run the parsed command against a resolved configuration.
pub async fn run(cli: Cli, config: &Config) -> Result<CommandStatus> {
    match cli.command {
        Commands::Datalake(args) => run_datalake(args, config).await,
        Commands::Dataverse(args) => run_dataverse(args, config).await,
    }
}

async fn run_datalake(args: DatalakeArgs, config: &Config) -> Result<CommandStatus> {
    if args.kind != SAMPLE_DATA {
        return Ok(CommandStatus::InvalidCommand(args.kind));
    }

    let auth = auth_from(&args.aad, &config.azure)?;
    let base_url = config.datalake.endpoint.clone().unwrap_or_else(|| {
        DataLakeClient::account_url(&args.datalake_name, &config.datalake.host_suffix)
    });

    let client = DataLakeClient::connect(&auth, base_url)
        .await
        .context("failed to authenticate against the data lake")?;

    client
        .create_basic_metrics_file(&args.datalake_container_name, DEFAULT_PATH, DEFAULT_FILENAME)
        .await
        .with_context(|| {
            format!(
                "failed to write sample metrics to '{}'",
                args.datalake_container_name
            )
        })?;

    Ok(CommandStatus::Completed)
}

async fn run_dataverse(args: DataverseArgs, config: &Config) -> Result<CommandStatus> {
    if args.kind != VIRTUAL_TABLE {
        return Ok(CommandStatus::InvalidCommand(args.kind));
    }

    let provider_name = args
        .provider_name
        .or_else(|| config.dataverse.provider_name.clone())
        .ok_or_else(|| anyhow!("no data provider given: pass --provider_name or set dataverse.provider_name"))?;
    let datasource_name = args
        .datasource_name
        .or_else(|| config.dataverse.datasource_name.clone())
        .ok_or_else(|| anyhow!("no data source given: pass --datasource_name or set dataverse.datasource_name"))?;

    let auth = auth_from(&args.aad, &config.azure)?;
    let org_url = config.dataverse.endpoint.clone().unwrap_or_else(|| {
        DataverseClient::org_url(&args.power_apps_org, &config.dataverse.host_suffix)
    });

    let client = DataverseClient::connect(
        &auth,
        &org_url,
        &config.dataverse.api_version,
        args.publisher,
        config.dataverse.schema_folder.clone(),
    )
    .await
    .context("failed to authenticate against Dataverse")?;

    let provider_id = client
        .entity_data_provider_id_by_name(&provider_name)
        .await?
        .ok_or_else(|| DataverseError::NotFound(format!("data provider '{}'", provider_name)))?;
    let datasource_id = client
        .entity_data_source_id_by_name(&datasource_name)
        .await?
        .ok_or_else(|| DataverseError::NotFound(format!("data source '{}'", datasource_name)))?;

    let outcome = client
        .create_virtual_table(&provider_id, &datasource_id)
        .await
        .context("failed to create the virtual table")?;

    println!("{} for {}", outcome.status, outcome.schema_name);
    if let Some(body) = &outcome.body {
        println!("{}", body);
    }

    Ok(CommandStatus::Completed)
}
