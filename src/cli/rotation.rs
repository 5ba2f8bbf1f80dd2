//! Rotation CLI command
//!
//! Dry-runs the retention rules over a list of snapshot names, without
//! touching any server.

use chrono::{Local, NaiveDate};
use clap::Args;

use crate::backup::plan_rotation;
use crate::display::format_rotation_plan;
use crate::error::{BackeeError, BackeeResult};
use crate::models::RotationStrategy;

/// Arguments of `backee rotation`
#[derive(Args, Debug)]
pub struct RotationArgs {
    /// Days to keep
    #[arg(long, default_value_t = 1)]
    pub daily: u32,

    /// Months to keep, counting the first snapshot of each month
    #[arg(long, default_value_t = 0)]
    pub monthly: u32,

    /// Years to keep, counting the first snapshot of each year
    #[arg(long, default_value_t = 0)]
    pub yearly: u32,

    /// Date to rotate as of (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub now: Option<String>,

    /// Snapshot directory names, e.g. backup_2024-05-17-03-00
    #[arg(required = true)]
    pub names: Vec<String>,
}

/// Handle the rotation command
pub fn handle_rotation_command(args: RotationArgs) -> BackeeResult<()> {
    let today = match &args.now {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| BackeeError::Config(format!("Invalid date '{}': {}", date, e)))?,
        None => Local::now().date_naive(),
    };

    let mut names = args.names;
    names.sort();

    let strategy = RotationStrategy::new(args.daily, args.monthly, args.yearly);
    let plan = plan_rotation(&names, strategy, today);

    println!("Rotation as of {} with {}", today, strategy);
    println!();
    println!("{}", format_rotation_plan(&names, &plan));
    Ok(())
}
