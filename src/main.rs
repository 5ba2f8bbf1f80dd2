use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use backee::cli::{
    handle_backup_command, handle_config_command, handle_rotation_command, BackupArgs,
    ConfigArgs, RotationArgs,
};

#[derive(Parser)]
#[command(
    name = "backee",
    version,
    about = "Snapshot backups over SSH and rsync",
    long_about = "backee copies files to remote servers as dated, hard-linked \
                  snapshots and rotates old snapshots out by daily, monthly \
                  and yearly retention windows."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every configured item to every configured server
    Backup(BackupArgs),

    /// Validate a configuration file and show what it resolves to
    Config(ConfigArgs),

    /// Show which snapshots a rotation strategy keeps and deletes
    Rotation(RotationArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Backup(args)) => handle_backup_command(args)?,
        Some(Commands::Config(args)) => handle_config_command(args)?,
        Some(Commands::Rotation(args)) => handle_rotation_command(args)?,
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
