//! Azure AD Authentication module
//!
//! Acquires bearer tokens for Azure resources, either by borrowing the token of
//! an active Azure CLI login session or through the OAuth2 client credentials
//! flow for app-only authentication.

mod claims;
mod cli;

pub use claims::{decode_claims, tenant_from_issuer, TokenClaims};

use azure_core::auth::TokenCredential;
use azure_identity::AzureCliCredential;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Default Azure AD authority host
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Token parse error: {0}")]
    ParseError(String),

    #[error("Access token is missing the '{0}' claim")]
    MissingClaim(&'static str),

    #[error("Azure CLI error: {0}")]
    CliFailed(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Token response from Azure AD
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Identity the token was issued for.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where bearer tokens come from
#[derive(Clone)]
pub enum TokenSource {
    /// Delegated: reuse the signed-in Azure CLI session.
    AzureCli { credential: Arc<dyn TokenCredential> },
    /// App-only: OAuth2 client credentials grant.
    ClientCredentials {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl TokenSource {
    /// Delegated source backed by `AzureCliCredential`
    pub fn azure_cli() -> Self {
        TokenSource::AzureCli {
            credential: Arc::new(AzureCliCredential::new()),
        }
    }

    /// Pick the token source from optionally supplied credentials.
    ///
    /// Without a client secret the Azure CLI session is used. With a secret,
    /// tenant and client id become mandatory.
    pub fn from_parts(
        tenant_id: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<Self, AuthError> {
        let Some(client_secret) = client_secret else {
            return Ok(Self::azure_cli());
        };

        let tenant_id = tenant_id.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            AuthError::MissingCredentials(
                "a tenant id is required when a client secret is supplied".to_string(),
            )
        })?;
        let client_id = client_id.filter(|c| !c.trim().is_empty()).ok_or_else(|| {
            AuthError::MissingCredentials(
                "a client id is required when a client secret is supplied".to_string(),
            )
        })?;

        Ok(TokenSource::ClientCredentials {
            tenant_id,
            client_id,
            client_secret,
        })
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::AzureCli { .. } => f.debug_struct("AzureCli").finish_non_exhaustive(),
            TokenSource::ClientCredentials {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// A bearer token together with the identity it belongs to
#[derive(Clone)]
pub struct AccessToken {
    pub credentials: Credentials,
    pub token: String,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("credentials", &self.credentials)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Azure AD authentication helper
#[derive(Debug)]
pub struct AzureAdAuth {
    source: TokenSource,
    authority: String,
    http_client: Client,
}

impl AzureAdAuth {
    /// Create a new Azure AD auth helper
    pub fn new(source: TokenSource, authority: impl Into<String>) -> Self {
        Self {
            source,
            authority: authority.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
        }
    }

    /// Token source in use
    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    /// Get the token endpoint URL for a tenant
    fn token_endpoint(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, tenant_id)
    }

    /// Build the `.default` scope for a resource base URL
    pub fn scope_for(resource: &str) -> String {
        if resource.ends_with('/') {
            format!("{}.default", resource)
        } else {
            format!("{}/.default", resource)
        }
    }

    /// Acquire a token for the given resource base URL.
    ///
    /// Every call goes to the identity provider; nothing is cached.
    pub async fn acquire_token(&self, resource: &str) -> Result<AccessToken, AuthError> {
        let scope = Self::scope_for(resource);

        match &self.source {
            TokenSource::AzureCli { credential } => {
                tracing::info!("Acquiring token from Azure CLI session for scope: {}", scope);
                let token = cli::get_access_token(credential.as_ref(), &scope).await?;
                let claims = decode_claims(&token)?;
                let tenant_id = tenant_from_issuer(&claims.iss)?;

                tracing::debug!(
                    "Azure CLI token issued for tenant {} and app {}",
                    tenant_id,
                    claims.appid
                );

                Ok(AccessToken {
                    credentials: Credentials {
                        tenant_id,
                        client_id: claims.appid,
                        client_secret: None,
                    },
                    token,
                })
            }
            TokenSource::ClientCredentials {
                tenant_id,
                client_id,
                client_secret,
            } => {
                tracing::info!("Acquiring new access token for scope: {}", scope);
                let token = self
                    .request_client_credentials(tenant_id, client_id, client_secret, &scope)
                    .await?;

                Ok(AccessToken {
                    credentials: Credentials {
                        tenant_id: tenant_id.clone(),
                        client_id: client_id.clone(),
                        client_secret: Some(client_secret.clone()),
                    },
                    token,
                })
            }
        }
    }

    /// Client credentials grant against the tenant's v2.0 token endpoint
    async fn request_client_credentials(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", scope),
        ];

        let response = self
            .http_client
            .post(self.token_endpoint(tenant_id))
            .form(&params)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token request failed: {} - {}", status, body);
            return Err(AuthError::TokenRequestFailed(format!(
                "Status: {}, Body: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::ParseError(format!("Failed to parse token response: {}", e))
        })?;

        match token_response.expires_in {
            Some(secs) => tracing::info!("Token acquired successfully, expires in {} seconds", secs),
            None => tracing::info!("Token acquired successfully"),
        }

        Ok(token_response.access_token)
    }
}
