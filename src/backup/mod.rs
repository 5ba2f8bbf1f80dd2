//! Snapshot backups over SSH
//!
//! Copies local file trees to backup servers as timestamped, hard-linked
//! snapshots and prunes old ones according to a rotation strategy.
//!
//! # Architecture
//!
//! - `remote`: shell command execution over a shared ssh connection
//! - `rsync`: rsync argument building and sub-process streaming
//! - `transport`: directory operations and transfers on one server
//! - `layout`: snapshot naming and paths
//! - `rotation`: the daily/monthly/yearly retention algorithm
//! - `engine`: the per (item, server) pipeline
//! - `report`: outcome of each pair
//!
//! # Remote Layout
//!
//! ```text
//! <location>/<item>/backup_2024-05-17-03-00/
//! <location>/<item>/backup_2024-05-18-03-00-incomplete/   (transfer in progress)
//! <location>/<item>/current -> backup_2024-05-17-03-00
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use backee::backup::BackupEngine;
//!
//! let config = backee::config::Config::load(&path)?;
//! let report = BackupEngine::new().backup(&config.items, &config.servers)?;
//! println!("{} completed", report.completed_count());
//! ```

mod engine;
mod layout;
mod remote;
mod report;
mod rotation;
mod rsync;
mod transport;

pub use engine::{admit_transfer, BackupEngine, SshStoreFactory, StoreFactory};
pub use layout::{
    parse_snapshot_name, snapshot_name, SnapshotLayout, CURRENT_LINK, SNAPSHOT_PREFIX, TEMP_SUFFIX,
    TIMESTAMP_FORMAT,
};
pub use remote::{check_dependencies, run_remote, shell_quote, RemoteShell, SshSession, REQUIRED_TOOLS};
pub use report::{BackupReport, PairOutcome, PairStatus};
pub use rotation::{plan_rotation, plan_rotation_with_prefix, RotationPlan};
pub use rsync::{LineFlow, ProcessExit, ProcessRunner, SystemProcess};
pub use transport::{SnapshotStore, SnapshotTransport};
