//! Config CLI command
//!
//! Validates a configuration file and prints what it resolves to.

use clap::Args;
use std::path::PathBuf;

use crate::display::format_config_summary;
use crate::error::BackeeResult;
use crate::logging::console_dispatch;

use super::load_config;

/// Arguments of `backee config`
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (defaults to $BACKEE_CONFIG, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Handle the config command
pub fn handle_config_command(args: ConfigArgs) -> BackeeResult<()> {
    let config = tracing::dispatcher::with_default(&console_dispatch(false), || {
        load_config(args.config.as_deref())
    })?;

    print!("{}", format_config_summary(&config));
    Ok(())
}
