//! Metric provider helper library
//!
//! Azure AD token acquisition plus the two REST clients used to prepare the
//! metric provider sample: Azure Data Lake Storage Gen2 (sample metrics file)
//! and Dataverse (virtual table registration).

pub mod auth;
pub mod cli;
pub mod config;
pub mod datalake;
pub mod dataverse;

pub use auth::{AccessToken, AuthError, AzureAdAuth, Credentials, TokenSource};
pub use config::{Config, ConfigError};
pub use datalake::{DataLakeClient, DataLakeError};
pub use dataverse::{DataverseClient, DataverseError, SubmissionOutcome};
