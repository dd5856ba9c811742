//! CLI command implementations

pub mod cache;
pub mod client;
pub mod common;
pub mod config;
pub mod report;
pub mod results;
pub mod scan;

pub use cache::execute as cache;
pub use client::execute as client;
pub use config::execute as config;
pub use report::execute as report;
pub use results::execute as results;
pub use scan::execute as scan;
