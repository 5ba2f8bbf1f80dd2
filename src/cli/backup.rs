//! Backup CLI command
//!
//! Runs every configured item against every configured server.

use clap::Args;
use std::path::PathBuf;

use crate::backup::{check_dependencies, BackupEngine, REQUIRED_TOOLS};
use crate::display::format_backup_report;
use crate::error::BackeeResult;
use crate::logging::{console_dispatch, LogSinks};

use super::load_config;

/// Arguments of `backee backup`
#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Configuration file (defaults to $BACKEE_CONFIG, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log debug output to the console
    #[arg(short, long)]
    pub verbose: bool,
}

/// Handle the backup command
pub fn handle_backup_command(args: BackupArgs) -> BackeeResult<()> {
    let console = console_dispatch(args.verbose);
    let config = tracing::dispatcher::with_default(&console, || -> BackeeResult<_> {
        let config = load_config(args.config.as_deref())?;
        if let Err(e) = check_dependencies(&REQUIRED_TOOLS) {
            tracing::error!(error = %e, "cannot back up");
            return Err(e);
        }
        Ok(config)
    })?;

    let sinks = LogSinks::build(args.verbose, &config.loggers)?;
    let report = tracing::dispatcher::with_default(sinks.dispatch(), || {
        if config.servers.is_empty() || config.items.is_empty() {
            tracing::warn!(
                servers = config.servers.len(),
                items = config.items.len(),
                "nothing to back up"
            );
        }
        BackupEngine::new().run(&config.items, &config.servers)
    });
    // Flush pending webhook messages before printing the summary
    drop(sinks);

    println!("{}", format_backup_report(&report));
    report.into_result().map(|_| ())
}
