//! Configuration module for backee
//!
//! This module provides configuration management including:
//! - config file path resolution
//! - YAML parsing into servers, items and log sinks
//! - environment variable expansion

pub mod env;
pub mod loggers;
pub mod paths;
pub mod settings;

pub use loggers::{
    FileLoggerConfig, HttpMethod, LevelRange, LoggerConfig, Severity, WebAuth, WebLoggerConfig,
};
pub use paths::{resolve_config_path, BackeePaths};
pub use settings::Config;
