//! Dataverse Web API client module
//!
//! Resolves virtual table data providers and data sources by name and
//! registers virtual table definitions from local schema templates.

use crate::auth::{AuthError, AzureAdAuth};
use crate::dataverse::schema::{find_definition, substitute_placeholders, SchemaError};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default Web API version
pub const DEFAULT_API_VERSION: &str = "v9.2";

/// Template used by `create_virtual_table`
pub const VIRTUAL_TABLE_SCHEMA: &str = "virtualtable.json";

const PROVIDERS_PATH: &str = "entitydataproviders";
const DATASOURCES_PATH: &str = "entitydatasources";
const ENTITY_DEFINITIONS_PATH: &str = "EntityDefinitions";

/// Dataverse client errors
#[derive(Error, Debug)]
pub enum DataverseError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Lookup failed ({0}): {1}")]
    LookupError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error(transparent)]
    SchemaError(#[from] SchemaError),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// OData list wrapper returned by listing endpoints
#[derive(Debug, Deserialize)]
struct ODataList {
    #[serde(default)]
    value: Vec<Value>,
}

/// Result of posting a table definition
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub status: u16,
    pub schema_name: String,
    /// Response body, kept only when the service rejected the definition
    pub body: Option<String>,
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for one Dataverse environment
#[derive(Debug)]
pub struct DataverseClient {
    endpoint: String,
    token: String,
    publisher: String,
    schema_folder: PathBuf,
    http_client: Client,
}

impl DataverseClient {
    /// Environment URL, e.g. `https://<org>.api.crm4.dynamics.com`
    pub fn org_url(org: &str, host_suffix: &str) -> String {
        format!("https://{}.{}", org, host_suffix.trim_matches('.'))
    }

    /// Web API service root for an environment URL
    pub fn api_endpoint(org_url: &str, api_version: &str) -> String {
        format!(
            "{}/api/data/{}/",
            org_url.trim_end_matches('/'),
            api_version
        )
    }

    /// Create a client, acquiring one token for the environment.
    pub async fn connect(
        auth: &AzureAdAuth,
        org_url: &str,
        api_version: &str,
        publisher: impl Into<String>,
        schema_folder: impl Into<PathBuf>,
    ) -> Result<Self, DataverseError> {
        let access = auth.acquire_token(org_url.trim_end_matches('/')).await?;
        Ok(Self::new(
            Self::api_endpoint(org_url, api_version),
            access.token,
            publisher,
            schema_folder,
        ))
    }

    /// Create a client for a service root with an already acquired token
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        publisher: impl Into<String>,
        schema_folder: impl Into<PathBuf>,
    ) -> Self {
        // Ensure endpoint ends with /
        let endpoint = endpoint.into();
        let endpoint = if endpoint.ends_with('/') {
            endpoint
        } else {
            format!("{}/", endpoint)
        };

        let publisher = publisher.into();
        tracing::debug!("Dataverse client for {} (publisher {})", endpoint, publisher);

        Self {
            endpoint,
            token: token.into(),
            publisher,
            schema_folder: schema_folder.into(),
            http_client: Client::new(),
        }
    }

    /// Get endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Publisher the definitions are created for
    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Folder searched for schema templates
    pub fn schema_folder(&self) -> &Path {
        &self.schema_folder
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
    }

    /// Scan the first page of a listing for an entry called `name`.
    async fn find_id_by_name(
        &self,
        path: &str,
        id_field: &str,
        name: &str,
    ) -> Result<Option<String>, DataverseError> {
        let url = self.url(path);
        tracing::debug!("Fetching: {}", url);

        let response = self.authorized(self.http_client.get(&url)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Listing {} failed: {} - {}", path, status, body);
            return Err(DataverseError::LookupError(status.as_u16(), body));
        }

        let listing: ODataList = response.json().await.map_err(|e| {
            DataverseError::ParseError(format!("Failed to parse {} listing: {}", path, e))
        })?;

        let id = listing
            .value
            .iter()
            .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|entry| entry.get(id_field))
            .and_then(Value::as_str)
            .map(str::to_string);

        match &id {
            Some(id) => tracing::info!("Resolved {} '{}' to {}", path, name, id),
            None => tracing::info!("No entry named '{}' in {}", name, path),
        }

        Ok(id)
    }

    /// `entitydatasourceid` of the data source called `name`, if any
    pub async fn entity_data_source_id_by_name(
        &self,
        name: &str,
    ) -> Result<Option<String>, DataverseError> {
        self.find_id_by_name(DATASOURCES_PATH, "entitydatasourceid", name)
            .await
    }

    /// `entitydataproviderid` of the data provider called `name`, if any
    pub async fn entity_data_provider_id_by_name(
        &self,
        name: &str,
    ) -> Result<Option<String>, DataverseError> {
        self.find_id_by_name(PROVIDERS_PATH, "entitydataproviderid", name)
            .await
    }

    /// Register a virtual table from the `virtualtable.json` template.
    ///
    /// A rejected definition is logged and returned in the outcome; only
    /// template and transport failures are errors.
    pub async fn create_virtual_table(
        &self,
        provider_id: &str,
        datasource_id: &str,
    ) -> Result<SubmissionOutcome, DataverseError> {
        let definition = find_definition(&self.schema_folder, VIRTUAL_TABLE_SCHEMA)?;
        tracing::info!("Using template {}", definition.path.display());

        let mut document = definition.document;
        let replaced = substitute_placeholders(&mut document, provider_id, datasource_id);
        tracing::debug!("Filled {} placeholder(s)", replaced);

        let schema_name = document
            .get("SchemaName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                DataverseError::ParseError(format!(
                    "{} has no SchemaName",
                    definition.path.display()
                ))
            })?;

        let response = self
            .authorized(self.http_client.post(self.url(ENTITY_DEFINITIONS_PATH)))
            .json(&document)
            .send()
            .await?;

        let status = response.status();
        let body = if status.is_success() {
            tracing::info!("Created virtual table {} ({})", schema_name, status);
            None
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                "Virtual table {} was rejected: {} - {}",
                schema_name,
                status,
                body
            );
            Some(body)
        };

        Ok(SubmissionOutcome {
            status: status.as_u16(),
            schema_name,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_url() {
        assert_eq!(
            DataverseClient::org_url("contoso", "api.crm4.dynamics.com"),
            "https://contoso.api.crm4.dynamics.com"
        );
    }

    #[test]
    fn test_api_endpoint() {
        assert_eq!(
            DataverseClient::api_endpoint("https://contoso.api.crm4.dynamics.com/", "v9.2"),
            "https://contoso.api.crm4.dynamics.com/api/data/v9.2/"
        );
    }

    #[test]
    fn test_endpoint_gets_trailing_slash() {
        let client = DataverseClient::new("http://localhost/api/data/v9.2", "t", "pub", "schemas");
        assert_eq!(client.endpoint(), "http://localhost/api/data/v9.2/");
        assert_eq!(
            client.url(ENTITY_DEFINITIONS_PATH),
            "http://localhost/api/data/v9.2/EntityDefinitions"
        );
        assert_eq!(client.publisher(), "pub");
    }

    #[test]
    fn test_outcome_success_range() {
        let outcome = SubmissionOutcome {
            status: 204,
            schema_name: "x".to_string(),
            body: None,
        };
        assert!(outcome.is_success());

        let outcome = SubmissionOutcome {
            status: 400,
            ..outcome
        };
        assert!(!outcome.is_success());
    }
}
