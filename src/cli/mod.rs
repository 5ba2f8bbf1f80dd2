//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the backup engine.

pub mod backup;
pub mod config;
pub mod rotation;

use std::path::Path;

use crate::config::{resolve_config_path, Config};
use crate::error::BackeeResult;

pub use backup::{handle_backup_command, BackupArgs};
pub use config::{handle_config_command, ConfigArgs};
pub use rotation::{handle_rotation_command, RotationArgs};

/// Resolve and load the configuration file
pub(crate) fn load_config(explicit: Option<&Path>) -> BackeeResult<Config> {
    let path = resolve_config_path(explicit)?;
    tracing::debug!(path = %path.display(), "loading configuration");
    Config::load(&path)
}
