//! Backup item models
//!
//! A backup item is something to be backed up: a tree of local files, a
//! database dump or a set of container data volumes. Only file trees are
//! transferred by the engine today; the other kinds are carried through the
//! configuration so they can be reported and skipped.

use std::path::Path;

use zeroize::Zeroizing;

use super::db_connectors::DbConnector;
use super::rotation::RotationStrategy;
use super::servers::BackupServer;

/// Characters that make a path a shell pattern rather than a literal path
const WILDCARD_CHARS: [char; 3] = ['*', '?', '['];

/// Something to back up
#[derive(Debug, Clone, PartialEq)]
pub enum BackupItem {
    /// Local file trees
    Files(FilesItem),
    /// A database dump
    Database(DatabaseItem),
    /// Container data volumes
    DockerVolumes(DockerVolumesItem),
}

impl BackupItem {
    /// Directory name used for this item under a server location
    pub fn name(&self) -> &'static str {
        match self {
            Self::Files(_) => "files",
            Self::Database(_) => "databases",
            Self::DockerVolumes(_) => "docker",
        }
    }

    /// Rotation strategy set on the item itself, if any
    pub fn rotation_strategy(&self) -> Option<RotationStrategy> {
        match self {
            Self::Files(item) => item.rotation_strategy,
            Self::Database(DatabaseItem::Mysql(item)) => item.rotation_strategy,
            Self::DockerVolumes(item) => item.rotation_strategy,
        }
    }

    /// Strategy in force for this item on the given server
    ///
    /// The item's own strategy wins; the server default applies otherwise.
    pub fn effective_rotation_strategy(&self, server: &BackupServer) -> RotationStrategy {
        self.rotation_strategy()
            .unwrap_or_else(|| server.rotation_strategy())
    }
}

/// Local paths to back up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesItem {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub rotation_strategy: Option<RotationStrategy>,
}

impl FilesItem {
    pub fn new(includes: Vec<String>, excludes: Vec<String>) -> Self {
        Self {
            includes,
            excludes,
            rotation_strategy: None,
        }
    }

    pub fn with_rotation_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.rotation_strategy = Some(strategy);
        self
    }

    /// Copy of this item with missing literal paths dropped
    ///
    /// Patterns containing wildcards are kept as-is; literal paths that do
    /// not exist locally are logged and removed.
    pub fn retain_existing(&self) -> FilesItem {
        FilesItem {
            includes: self
                .includes
                .iter()
                .filter(|p| path_is_usable(p, PathRole::Include))
                .cloned()
                .collect(),
            excludes: self
                .excludes
                .iter()
                .filter(|p| path_is_usable(p, PathRole::Exclude))
                .cloned()
                .collect(),
            rotation_strategy: self.rotation_strategy,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PathRole {
    Include,
    Exclude,
}

/// Check whether a path contains shell wildcard characters
pub fn has_wildcards(path: &str) -> bool {
    path.contains(WILDCARD_CHARS)
}

fn path_is_usable(path: &str, role: PathRole) -> bool {
    if has_wildcards(path) {
        tracing::debug!(path, "skipping existence check for path with wildcards");
        return true;
    }

    if Path::new(path).exists() {
        return true;
    }

    match role {
        PathRole::Include => tracing::error!(path, "file backup item does not exist"),
        PathRole::Exclude => tracing::error!(path, "excludes item does not exist"),
    }
    false
}

/// Database dump sources
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseItem {
    Mysql(MysqlItem),
}

/// A MySQL database
#[derive(Debug, Clone, PartialEq)]
pub struct MysqlItem {
    pub username: String,
    pub password: Zeroizing<String>,
    pub database: String,
    pub connector: DbConnector,
    pub rotation_strategy: Option<RotationStrategy>,
}

/// Container data volumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerVolumesItem {
    pub volumes: Vec<String>,
    pub rotation_strategy: Option<RotationStrategy>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::servers::SshServer;
    use tempfile::TempDir;

    fn server(strategy: RotationStrategy) -> BackupServer {
        BackupServer::Ssh(SshServer {
            name: "server".into(),
            location: "/backups".into(),
            hostname: "host".into(),
            port: 22,
            username: None,
            key_path: None,
            rotation_strategy: strategy,
        })
    }

    #[test]
    fn test_names_follow_kind() {
        let files = BackupItem::Files(FilesItem::default());
        let docker = BackupItem::DockerVolumes(DockerVolumesItem {
            volumes: vec!["data".into()],
            rotation_strategy: None,
        });
        let db = BackupItem::Database(DatabaseItem::Mysql(MysqlItem {
            username: "root".into(),
            password: Zeroizing::new("secret".into()),
            database: "app".into(),
            connector: DbConnector::Local { port: 3306 },
            rotation_strategy: None,
        }));

        assert_eq!(files.name(), "files");
        assert_eq!(db.name(), "databases");
        assert_eq!(docker.name(), "docker");
    }

    #[test]
    fn test_item_strategy_wins() {
        let item = BackupItem::Files(
            FilesItem::default().with_rotation_strategy(RotationStrategy::new(3, 2, 1)),
        );
        let strategy = item.effective_rotation_strategy(&server(RotationStrategy::new(9, 9, 9)));
        assert_eq!(strategy, RotationStrategy::new(3, 2, 1));
    }

    #[test]
    fn test_server_strategy_is_fallback() {
        let item = BackupItem::Files(FilesItem::default());
        let strategy = item.effective_rotation_strategy(&server(RotationStrategy::new(9, 8, 7)));
        assert_eq!(strategy, RotationStrategy::new(9, 8, 7));
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(has_wildcards("/var/log/*.log"));
        assert!(has_wildcards("/home/?ser"));
        assert!(has_wildcards("/data/[ab]"));
        assert!(!has_wildcards("/etc/hosts"));
    }

    #[test]
    fn test_retain_existing_drops_missing_literals() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("present");
        std::fs::create_dir(&present).unwrap();
        let present = present.to_string_lossy().to_string();
        let missing = temp.path().join("missing").to_string_lossy().to_string();

        let item = FilesItem::new(
            vec![present.clone(), missing.clone(), "/nowhere/*".into()],
            vec![missing, present.clone()],
        );
        let kept = item.retain_existing();

        assert_eq!(kept.includes, vec![present.clone(), "/nowhere/*".to_string()]);
        assert_eq!(kept.excludes, vec![present]);
    }
}
