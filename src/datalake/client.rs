//! Data Lake Storage Gen2 client module
//!
//! Writes files through the DFS endpoint using the create / append / flush
//! sequence: an empty file is created, bytes are staged with `append`, and the
//! staged bytes are committed with `flush`.

use crate::auth::{AuthError, AzureAdAuth};
use crate::datalake::metrics::{render_csv, sample_metrics};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;

/// Default directory inside the filesystem
pub const DEFAULT_PATH: &str = "/";

/// Default file name of the sample metrics file
pub const DEFAULT_FILENAME: &str = "metrics.csv";

/// Data lake client errors
#[derive(Error, Debug)]
pub enum DataLakeError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("File create failed ({0}): {1}")]
    FileCreateError(u16, String),

    #[error("Append failed ({0}): {1}")]
    AppendError(u16, String),

    #[error("Flush failed ({0}): {1}")]
    FlushError(u16, String),
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Create,
    Append,
    Flush,
}

impl Step {
    fn name(self) -> &'static str {
        match self {
            Step::Create => "create",
            Step::Append => "append",
            Step::Flush => "flush",
        }
    }

    fn failure(self, status: StatusCode, body: String) -> DataLakeError {
        let status = status.as_u16();
        match self {
            Step::Create => DataLakeError::FileCreateError(status, body),
            Step::Append => DataLakeError::AppendError(status, body),
            Step::Flush => DataLakeError::FlushError(status, body),
        }
    }
}

/// Client for one Data Lake Storage account
#[derive(Debug)]
pub struct DataLakeClient {
    base_url: String,
    token: String,
    http_client: Client,
}

impl DataLakeClient {
    /// DFS endpoint of a storage account, e.g. `https://<account>.dfs.core.windows.net/`
    pub fn account_url(account: &str, host_suffix: &str) -> String {
        format!("https://{}.{}/", account, host_suffix.trim_matches('.'))
    }

    /// Create a client, acquiring one token for the account endpoint.
    pub async fn connect(
        auth: &AzureAdAuth,
        base_url: impl Into<String>,
    ) -> Result<Self, DataLakeError> {
        let base_url = base_url.into();
        let access = auth.acquire_token(&base_url).await?;
        Ok(Self::with_token(base_url, access.token))
    }

    /// Create a client with an already acquired token
    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        // Ensure base URL ends with /
        let base_url = base_url.into();
        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{}/", base_url)
        };

        Self {
            base_url,
            token: token.into(),
            http_client: Client::new(),
        }
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn file_url(&self, filesystem: &str, path: &str, filename: &str) -> String {
        format!("{}{}{}{}", self.base_url, filesystem, path, filename)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn finish(step: Step, response: Response) -> Result<StatusCode, DataLakeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Data lake {} failed: {} - {}", step.name(), status, body);
            return Err(step.failure(status, body));
        }

        tracing::debug!("Data lake {} returned {}", step.name(), status);
        Ok(status)
    }

    /// Write `content` to `{filesystem}{path}{filename}`.
    ///
    /// Nothing is cleaned up when append or flush fails; the empty or
    /// unflushed file stays behind.
    pub async fn write_file(
        &self,
        filesystem: &str,
        path: &str,
        filename: &str,
        content: &str,
    ) -> Result<(), DataLakeError> {
        let url = self.file_url(filesystem, path, filename);
        tracing::info!("Creating data lake file: {}", url);

        let response = self
            .authorized(self.http_client.put(&url))
            .query(&[("resource", "file"), ("position", "0")])
            .header(CONTENT_LENGTH, "0")
            .send()
            .await?;
        Self::finish(Step::Create, response).await?;

        let response = self
            .authorized(self.http_client.patch(&url))
            .query(&[("action", "append"), ("position", "0")])
            .body(content.to_string())
            .send()
            .await?;
        Self::finish(Step::Append, response).await?;

        let position = content.len().to_string();
        let response = self
            .authorized(self.http_client.patch(&url))
            .query(&[("action", "flush"), ("position", position.as_str())])
            .header(CONTENT_LENGTH, "0")
            .send()
            .await?;
        Self::finish(Step::Flush, response).await?;

        tracing::info!("Wrote {} bytes to {}", content.len(), url);
        Ok(())
    }

    /// Seed the filesystem with the sample metrics CSV
    pub async fn create_basic_metrics_file(
        &self,
        filesystem: &str,
        path: &str,
        filename: &str,
    ) -> Result<(), DataLakeError> {
        let content = render_csv(&sample_metrics());
        self.write_file(filesystem, path, filename, &content).await
    }
}
