//! Backup report formatting for terminal output

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::{BackupReport, PairOutcome, PairStatus};

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Item")]
    item: &'static str,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Details")]
    details: String,
}

impl From<&PairOutcome> for OutcomeRow {
    fn from(outcome: &PairOutcome) -> Self {
        let mut details = outcome.detail();
        if let PairStatus::Failed { error } = &outcome.status {
            if let Some(short) = error.shortfall() {
                details = format!("{} [short by {}]", details, format_size(short));
            }
        }

        Self {
            server: outcome.server.clone(),
            item: outcome.item,
            status: outcome.label(),
            details,
        }
    }
}

/// Format the outcome of a backup run as a table with a summary line
pub fn format_backup_report(report: &BackupReport) -> String {
    if report.outcomes.is_empty() {
        return "Nothing to back up.".to_string();
    }

    let rows: Vec<OutcomeRow> = report.outcomes.iter().map(OutcomeRow::from).collect();
    let table = Table::new(rows).with(Style::psql()).to_string();

    format!(
        "{}\n\n{} completed, {} skipped, {} failed",
        table,
        report.completed_count(),
        report.skipped_count(),
        report.failed_count()
    )
}

/// Format a byte count for humans
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
