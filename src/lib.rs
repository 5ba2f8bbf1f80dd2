//! Backee - snapshot backups over SSH and rsync
//!
//! This library provides the core functionality of the backee backup tool.
//! Every configured backup item is copied to every configured server as a
//! dated snapshot; unchanged files are hard-linked against the previous
//! snapshot, and old snapshots are rotated out by daily, monthly and yearly
//! retention windows.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration file parsing, environment expansion and paths
//! - `error`: Custom error types
//! - `models`: Servers, backup items, connectors and rotation strategies
//! - `backup`: Remote execution, snapshot transport and the backup engine
//! - `logging`: Console, rotating file and webhook log sinks
//! - `display`: Table formatting for terminal output
//! - `cli`: Command handlers for the `backee` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use backee::backup::BackupEngine;
//! use backee::config::Config;
//!
//! let config = Config::load(Path::new("/etc/backee/config.yml"))?;
//! let report = BackupEngine::new().run(&config.items, &config.servers);
//! println!("{} of {} backups failed", report.failed_count(), report.total());
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod models;

pub use error::{BackeeError, BackeeResult};
