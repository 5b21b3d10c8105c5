//! Dataverse module
//!
//! Web API client and schema template utilities

pub mod client;
pub mod schema;

pub use client::{DataverseClient, DataverseError, SubmissionOutcome, DEFAULT_API_VERSION};
pub use schema::{change_schema, load_definitions, substitute_placeholders, SchemaDefinition, SchemaError};
