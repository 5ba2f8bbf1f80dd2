//! Rotation plan formatting

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::RotationPlan;

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Snapshot")]
    name: String,
    #[tabled(rename = "Action")]
    action: &'static str,
    #[tabled(rename = "Kept by")]
    kept_by: String,
}

fn kept_by(plan: &RotationPlan, name: &str) -> String {
    let windows: Vec<&str> = [
        ("daily", &plan.daily),
        ("monthly", &plan.monthly),
        ("yearly", &plan.yearly),
    ]
    .into_iter()
    .filter(|(_, kept)| kept.iter().any(|n| n == name))
    .map(|(window, _)| window)
    .collect();
    windows.join(", ")
}

/// Format how a rotation treats each snapshot name, in input order
pub fn format_rotation_plan(names: &[String], plan: &RotationPlan) -> String {
    if names.is_empty() {
        return "No snapshots given.".to_string();
    }

    let rows: Vec<PlanRow> = names
        .iter()
        .map(|name| {
            let action = if plan.unparseable.contains(name) {
                "untouched"
            } else if plan.keeps(name) {
                "keep"
            } else {
                "delete"
            };
            PlanRow {
                name: name.clone(),
                action,
                kept_by: kept_by(plan, name),
            }
        })
        .collect();

    format!(
        "{}\n\n{} kept, {} deleted, {} untouched",
        Table::new(rows).with(Style::psql()),
        plan.kept_count(),
        plan.delete.len(),
        plan.unparseable.len()
    )
}
