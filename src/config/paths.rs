//! Path management for backee
//!
//! Resolves where the configuration file lives.
//!
//! ## Path Resolution Order
//!
//! 1. `--config <path>` on the command line
//! 2. `BACKEE_CONFIG` environment variable (if set)
//! 3. Linux: `$XDG_CONFIG_HOME/backee/config.yml` or `~/.config/backee/config.yml`
//! 4. macOS: `~/Library/Application Support/backee/config.yml`
//! 5. Windows: `%APPDATA%\backee\config.yml`

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::BackeeError;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "BACKEE_CONFIG";

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yml";

/// Manages the paths used by backee
#[derive(Debug, Clone)]
pub struct BackeePaths {
    /// Directory holding the configuration file
    base_dir: PathBuf,
}

impl BackeePaths {
    /// Create a new BackeePaths instance for the platform config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, BackeeError> {
        let dirs = BaseDirs::new()
            .ok_or_else(|| BackeeError::Config("Could not determine home directory".into()))?;
        Ok(Self {
            base_dir: dirs.config_dir().join("backee"),
        })
    }

    /// Create BackeePaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Default configuration file
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }
}

/// Pick the configuration file to load
///
/// An explicit path wins over `BACKEE_CONFIG`, which wins over the default
/// location.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, BackeeError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    resolve_with_env(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn resolve_with_env(from_env: Option<PathBuf>) -> Result<PathBuf, BackeeError> {
    match from_env {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        _ => Ok(BackeePaths::new()?.config_file()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BackeePaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.config_file(), temp_dir.path().join("config.yml"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/etc/backee.yml"))).unwrap();
        assert_eq!(path, PathBuf::from("/etc/backee.yml"));
    }

    #[test]
    fn test_env_path_beats_default() {
        let path = resolve_with_env(Some(PathBuf::from("/opt/backee/config.yml"))).unwrap();
        assert_eq!(path, PathBuf::from("/opt/backee/config.yml"));
    }

    #[test]
    fn test_default_location() {
        let path = resolve_with_env(None).unwrap();
        assert!(path.ends_with("backee/config.yml"));
        assert_eq!(resolve_with_env(Some(PathBuf::new())).unwrap(), path);
    }
}
