//! Configuration module
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `AZURE_*` environment variables. Command-line flags are applied on top by
//! the dispatcher.
//!
//! Client secrets are only ever taken from the command line.

use crate::auth::DEFAULT_AUTHORITY;
use crate::dataverse::DEFAULT_API_VERSION;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File picked up from the working directory when nothing else is given
pub const DEFAULT_CONFIG_FILE: &str = "metricprovider.toml";

/// Environment variable naming a config file
pub const CONFIG_FILE_ENV: &str = "METRICPROVIDER_CONFIG";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Azure AD settings
///
/// Tenant and client id only apply together with `--aad_client_secret`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub authority: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }
}

/// Data lake settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataLakeConfig {
    pub host_suffix: String,
    /// Full account URL, replacing `https://<account>.<host_suffix>/`
    pub endpoint: Option<String>,
}

impl Default for DataLakeConfig {
    fn default() -> Self {
        Self {
            host_suffix: "dfs.core.windows.net".to_string(),
            endpoint: None,
        }
    }
}

/// Dataverse settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataverseConfig {
    pub host_suffix: String,
    pub api_version: String,
    /// Full environment URL, replacing `https://<org>.<host_suffix>`
    pub endpoint: Option<String>,
    pub schema_folder: PathBuf,
    pub provider_name: Option<String>,
    pub datasource_name: Option<String>,
}

impl Default for DataverseConfig {
    fn default() -> Self {
        Self {
            host_suffix: "api.crm4.dynamics.com".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            endpoint: None,
            schema_folder: PathBuf::from("schemas"),
            provider_name: None,
            datasource_name: None,
        }
    }
}

/// Helper configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub azure: AzureConfig,
    pub datalake: DataLakeConfig,
    pub dataverse: DataverseConfig,
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `explicit`, else `$METRICPROVIDER_CONFIG`, else
    /// `./metricprovider.toml` when it exists, else defaults.
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            tracing::debug!("Loading config from {}", path.display());
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_FILE_ENV) {
            let path = PathBuf::from(path);
            tracing::debug!("Loading config from ${} = {}", CONFIG_FILE_ENV, path.display());
            return Self::load(&path);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            tracing::debug!("Loading config from {}", local.display());
            return Self::load(local);
        }

        Ok(Self::default())
    }

    /// Override tenant and client id from `AZURE_TENANT_ID` and
    /// `AZURE_CLIENT_ID`. Empty values are ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(tenant_id) = get("AZURE_TENANT_ID") {
            self.azure.tenant_id = Some(tenant_id);
        }
        if let Some(client_id) = get("AZURE_CLIENT_ID") {
            self.azure.client_id = Some(client_id);
        }
        self
    }

    /// Override from the process environment
    pub fn with_process_env(self) -> Self {
        self.with_env(|name| std::env::var(name).ok())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.azure.authority.starts_with("http://") && !self.azure.authority.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "azure.authority must be an http(s) URL, got '{}'",
                self.azure.authority
            )));
        }
        if self.datalake.host_suffix.trim().is_empty() {
            return Err(ConfigError::Invalid("datalake.host_suffix is empty".to_string()));
        }
        if self.dataverse.host_suffix.trim().is_empty() {
            return Err(ConfigError::Invalid("dataverse.host_suffix is empty".to_string()));
        }
        if self.dataverse.api_version.trim().is_empty() {
            return Err(ConfigError::Invalid("dataverse.api_version is empty".to_string()));
        }
        Ok(())
    }
}
