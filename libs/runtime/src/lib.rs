//! Process-level plumbing shared by the server binary: layered configuration
//! and tracing initialization.

pub mod config;
pub mod logging;

pub use config::{
    default_logging_config, ApiConfig, AppConfig, AuthConfig, CliArgs, DatabaseConfig,
    LoggingConfig, Section, ServerConfig, TokenConfig,
};
