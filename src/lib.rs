//! scanfold - scan-result pipeline
//!
//! Caches per-blob analysis by content digest, dispatches scans to a
//! remote server with bounded retries, and consolidates per-resource
//! findings into reports.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod rpc;
pub mod scanner;
pub mod types;

pub use error::{ScanfoldError, ScanfoldResult};
