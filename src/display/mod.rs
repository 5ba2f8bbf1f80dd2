//! Display formatting for terminal output
//!
//! Provides utilities for formatting backup reports, configuration summaries
//! and rotation plans as tables.

pub mod config;
pub mod report;
pub mod rotation;

pub use config::format_config_summary;
pub use report::{format_backup_report, format_size};
pub use rotation::format_rotation_plan;
