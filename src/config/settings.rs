//! Configuration file loading
//!
//! Reads the YAML configuration, expands environment variables in it and
//! turns it into servers, backup items and log sinks.

use std::path::Path;

use serde::Deserialize;
use zeroize::Zeroizing;

use super::env::{expand_home, expand_vars};
use super::loggers::{LoggerConfig, RawLogger};
use crate::error::{BackeeError, BackeeResult};
use crate::models::{
    BackupItem, BackupServer, DatabaseItem, DbConnector, DockerVolumesItem, FilesItem, MysqlItem,
    RotationStrategy, SshServer, DEFAULT_SSH_PORT,
};

/// Parsed configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Instance name, available to log sinks as `{{ name }}`
    pub name: String,
    pub loggers: Vec<LoggerConfig>,
    pub servers: Vec<BackupServer>,
    pub items: Vec<BackupItem>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    settings: RawSettings,
    rotation_strategy: Option<RotationStrategy>,
    #[serde(default)]
    loggers: Vec<RawLogger>,
    #[serde(default)]
    servers: Vec<RawServer>,
    #[serde(default)]
    backup_items: RawItems,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    location: String,
    connection: Option<RawConnection>,
    rotation_strategy: Option<RotationStrategy>,
}

#[derive(Debug, Deserialize)]
struct RawConnection {
    host: String,
    #[serde(default = "default_ssh_port")]
    port: u16,
    username: Option<String>,
    key: Option<String>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

#[derive(Debug, Default, Deserialize)]
struct RawItems {
    files: Option<RawFiles>,
    #[serde(default)]
    databases: Vec<RawDatabase>,
    docker: Option<RawDocker>,
}

#[derive(Debug, Deserialize)]
struct RawFiles {
    #[serde(default)]
    includes: Vec<String>,
    #[serde(default)]
    excludes: Vec<String>,
    rotation_strategy: Option<RotationStrategy>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawDatabase {
    Mysql {
        username: String,
        password: String,
        database: String,
        connection: DbConnector,
        rotation_strategy: Option<RotationStrategy>,
    },
}

#[derive(Debug, Deserialize)]
struct RawDocker {
    #[serde(default)]
    data_volumes: Vec<String>,
    rotation_strategy: Option<RotationStrategy>,
}

impl Config {
    /// Load and parse a configuration file
    pub fn load(path: &Path) -> BackeeResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BackeeError::Config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }

    /// Parse configuration text after expanding environment variables
    pub fn parse(contents: &str) -> BackeeResult<Self> {
        let expanded = expand_vars(contents);
        let value: serde_yaml::Value = serde_yaml::from_str(&expanded)?;
        let raw: RawConfig = serde_yaml::from_value(value)
            .map_err(|e| BackeeError::Config(format!("Invalid configuration: {}", e)))?;

        let default_strategy = raw.rotation_strategy.unwrap_or_default();
        let name = raw.settings.name;

        let loggers = raw
            .loggers
            .into_iter()
            .map(|logger| logger.resolve(&name))
            .collect::<BackeeResult<Vec<_>>>()?;

        let servers = raw
            .servers
            .into_iter()
            .map(|server| server.resolve(default_strategy))
            .collect::<BackeeResult<Vec<_>>>()?;

        Ok(Self {
            name,
            loggers,
            servers,
            items: raw.backup_items.resolve(),
        })
    }
}

impl RawServer {
    fn resolve(self, default_strategy: RotationStrategy) -> BackeeResult<BackupServer> {
        let rotation_strategy = self.rotation_strategy.unwrap_or(default_strategy);
        if self.kind != "ssh" {
            return Err(BackeeError::UnsupportedServer(self.kind));
        }

        let connection = self.connection.ok_or_else(|| {
            BackeeError::Config(format!("Server '{}' has no connection settings", self.name))
        })?;
        Ok(BackupServer::Ssh(SshServer {
            name: self.name,
            location: self.location,
            hostname: connection.host,
            port: connection.port,
            username: connection.username,
            key_path: connection.key.map(|key| expand_home(&key)),
            rotation_strategy,
        }))
    }
}

impl RawItems {
    /// Items in a fixed order: files, then databases, then docker volumes
    fn resolve(self) -> Vec<BackupItem> {
        let mut items = Vec::new();

        if let Some(files) = self.files {
            let expand = |paths: Vec<String>| -> Vec<String> {
                paths.iter().map(|p| expand_home(p)).collect()
            };
            items.push(BackupItem::Files(FilesItem {
                includes: expand(files.includes),
                excludes: expand(files.excludes),
                rotation_strategy: files.rotation_strategy,
            }));
        }

        for database in self.databases {
            let RawDatabase::Mysql {
                username,
                password,
                database,
                connection,
                rotation_strategy,
            } = database;
            items.push(BackupItem::Database(DatabaseItem::Mysql(MysqlItem {
                username,
                password: Zeroizing::new(password),
                database,
                connector: connection,
                rotation_strategy,
            })));
        }

        if let Some(docker) = self.docker {
            items.push(BackupItem::DockerVolumes(DockerVolumesItem {
                volumes: docker.data_volumes,
                rotation_strategy: docker.rotation_strategy,
            }));
        }

        items
    }
}
