//! REST adapter for the Migration Factory record API.

pub mod api;
pub mod config;

pub use api::{ApiError, HttpRecordService};
pub use config::{ClientConfig, ConfigError};
