//! Data lake module
//!
//! Azure Data Lake Storage Gen2 file writes and the sample metrics payload

pub mod client;
pub mod metrics;

pub use client::{DataLakeClient, DataLakeError, DEFAULT_FILENAME, DEFAULT_PATH};
pub use metrics::{render_csv, sample_metrics, MetricRecord};
