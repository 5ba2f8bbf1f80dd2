//! Core data models for backee
//!
//! This module contains the data structures that describe what is backed up
//! and where: backup items, backup servers, database connectors and the
//! rotation strategy that governs how long snapshots are kept.

pub mod db_connectors;
pub mod items;
pub mod rotation;
pub mod servers;

pub use db_connectors::DbConnector;
pub use items::{BackupItem, DatabaseItem, DockerVolumesItem, FilesItem, MysqlItem};
pub use rotation::RotationStrategy;
pub use servers::{BackupServer, SshServer, DEFAULT_SSH_PORT};
