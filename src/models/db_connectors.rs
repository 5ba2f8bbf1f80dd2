//! Database connection models
//!
//! Describes how a database dump would be reached: on the local host, on a
//! remote host, or inside a container.

use serde::{Deserialize, Serialize};

/// Host used when a connector does not name one
pub const DEFAULT_DB_HOST: &str = "127.0.0.1";

/// Port used when a connector does not name one
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Where a database is reachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DbConnector {
    /// Database server on this host
    Local {
        #[serde(default = "default_port")]
        port: u16,
    },
    /// Database server on another host
    Remote {
        #[serde(default = "default_host", rename = "host")]
        hostname: String,
        #[serde(default = "default_port")]
        port: u16,
    },
    /// Database server inside a container
    Docker {
        container: String,
        #[serde(default = "default_port")]
        port: u16,
    },
}

fn default_host() -> String {
    DEFAULT_DB_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_DB_PORT
}

impl DbConnector {
    /// Host the connector talks to
    pub fn hostname(&self) -> &str {
        match self {
            Self::Local { .. } | Self::Docker { .. } => DEFAULT_DB_HOST,
            Self::Remote { hostname, .. } => hostname,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::Local { port } | Self::Remote { port, .. } | Self::Docker { port, .. } => *port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_defaults() {
        let conn: DbConnector = serde_yaml::from_str("type: local").unwrap();
        assert_eq!(conn, DbConnector::Local { port: 3306 });
        assert_eq!(conn.hostname(), "127.0.0.1");
    }

    #[test]
    fn test_remote_values() {
        let conn: DbConnector =
            serde_yaml::from_str("type: remote\nhost: db.example.com\nport: 3307").unwrap();
        assert_eq!(
            conn,
            DbConnector::Remote {
                hostname: "db.example.com".into(),
                port: 3307
            }
        );
        assert_eq!(conn.port(), 3307);
    }

    #[test]
    fn test_docker_requires_container() {
        assert!(serde_yaml::from_str::<DbConnector>("type: docker").is_err());
        let conn: DbConnector = serde_yaml::from_str("type: docker\ncontainer: mysql").unwrap();
        assert_eq!(
            conn,
            DbConnector::Docker {
                container: "mysql".into(),
                port: 3306
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_yaml::from_str::<DbConnector>("type: oracle").is_err());
    }
}
