//! Backup server models
//!
//! A backup server is a destination that stores snapshots.

use super::rotation::RotationStrategy;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A backup destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupServer {
    /// Host reachable over SSH
    Ssh(SshServer),
}

impl BackupServer {
    pub fn name(&self) -> &str {
        match self {
            Self::Ssh(server) => &server.name,
        }
    }

    /// Root directory for snapshots on the server
    pub fn location(&self) -> &str {
        match self {
            Self::Ssh(server) => &server.location,
        }
    }

    /// Default rotation strategy for items stored on this server
    pub fn rotation_strategy(&self) -> RotationStrategy {
        match self {
            Self::Ssh(server) => server.rotation_strategy,
        }
    }
}

/// An SSH-reachable host with a root directory for snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshServer {
    pub name: String,
    /// Root directory on the remote host
    pub location: String,
    pub hostname: String,
    pub port: u16,
    /// Login user; ssh picks its default when unset
    pub username: Option<String>,
    /// Private key; ssh discovers keys itself when unset
    pub key_path: Option<String>,
    pub rotation_strategy: RotationStrategy,
}

impl SshServer {
    /// `user@host` or just `host` when no user is configured
    pub fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{}@{}", user, self.hostname),
            None => self.hostname.clone(),
        }
    }
}
