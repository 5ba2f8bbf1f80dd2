//! Per-pair backup outcomes

use crate::error::{BackeeError, BackeeResult};

/// How one (item, server) pair ended
#[derive(Debug, Clone)]
pub enum PairStatus {
    /// A snapshot was published
    Completed {
        snapshot: String,
        /// Snapshot names removed by rotation
        deleted: Vec<String>,
        /// False when the post-backup comparison found differences or failed
        verified: bool,
    },
    /// Nothing was attempted
    Skipped { reason: String },
    /// A step raised before the pair completed
    Failed { error: BackeeError },
}

/// Outcome of one (item, server) pair
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub server: String,
    pub item: &'static str,
    pub status: PairStatus,
}

impl PairOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, PairStatus::Failed { .. })
    }

    /// Short label for tables
    pub fn label(&self) -> &'static str {
        match &self.status {
            PairStatus::Completed { verified: true, .. } => "ok",
            PairStatus::Completed { verified: false, .. } => "unverified",
            PairStatus::Skipped { .. } => "skipped",
            PairStatus::Failed { .. } => "failed",
        }
    }

    pub fn detail(&self) -> String {
        match &self.status {
            PairStatus::Completed {
                snapshot, deleted, ..
            } => {
                if deleted.is_empty() {
                    snapshot.clone()
                } else {
                    format!("{} ({} rotated out)", snapshot, deleted.len())
                }
            }
            PairStatus::Skipped { reason } => reason.clone(),
            PairStatus::Failed { error } => error.to_string(),
        }
    }
}

/// Outcomes of a whole run, in processing order
#[derive(Debug, Clone, Default)]
pub struct BackupReport {
    pub outcomes: Vec<PairOutcome>,
}

impl BackupReport {
    pub fn push(&mut self, server: &str, item: &'static str, status: PairStatus) {
        self.outcomes.push(PairOutcome {
            server: server.to_string(),
            item,
            status,
        });
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, PairStatus::Skipped { .. }))
            .count()
    }

    pub fn completed_count(&self) -> usize {
        self.total() - self.failed_count() - self.skipped_count()
    }

    pub fn first_error(&self) -> Option<&BackeeError> {
        self.outcomes.iter().find_map(|o| match &o.status {
            PairStatus::Failed { error } => Some(error),
            _ => None,
        })
    }

    /// Turn the report into an error if any pair failed
    pub fn into_result(self) -> BackeeResult<Self> {
        match self.first_error() {
            Some(first) => Err(BackeeError::BackupFailed {
                failed: self.failed_count(),
                total: self.total(),
                first: Box::new(first.clone()),
            }),
            None => Ok(self),
        }
    }
}
