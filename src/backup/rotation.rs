//! Snapshot rotation
//!
//! Classifies snapshot names into keep and delete sets under three
//! independent windows:
//!
//! - daily: every snapshot from the last `daily` calendar days, today included
//! - monthly: the first snapshot taken on the 1st of each of the last
//!   `monthly` months
//! - yearly: the first snapshot taken on January 1st of each of the last
//!   `yearly` years
//!
//! A quota of zero disables its window. Names that do not parse as snapshot
//! timestamps are never deleted.

use std::collections::HashSet;

use chrono::{Datelike, Days, Months, NaiveDate};

use super::layout::{parse_snapshot_name, SNAPSHOT_PREFIX};
use crate::models::RotationStrategy;

/// Outcome of classifying a list of snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationPlan {
    /// Kept by the daily window
    pub daily: Vec<String>,
    /// Kept by the monthly window
    pub monthly: Vec<String>,
    /// Kept by the yearly window
    pub yearly: Vec<String>,
    /// Not snapshot names; left untouched
    pub unparseable: Vec<String>,
    /// Everything else, in input order
    pub delete: Vec<String>,
}

impl RotationPlan {
    /// Number of distinct snapshots kept by at least one window
    pub fn kept_count(&self) -> usize {
        self.daily
            .iter()
            .chain(&self.monthly)
            .chain(&self.yearly)
            .collect::<HashSet<_>>()
            .len()
    }

    /// True if the name survives the rotation
    pub fn keeps(&self, name: &str) -> bool {
        !self.delete.iter().any(|n| n == name)
    }
}

/// Classify snapshot names using the standard `backup_` prefix
///
/// `names` must be sorted ascending, which for fixed-width timestamps is
/// chronological order.
pub fn plan_rotation(names: &[String], strategy: RotationStrategy, today: NaiveDate) -> RotationPlan {
    plan_rotation_with_prefix(names, strategy, today, SNAPSHOT_PREFIX)
}

/// Classify snapshot names carrying an arbitrary prefix
pub fn plan_rotation_with_prefix(
    names: &[String],
    strategy: RotationStrategy,
    today: NaiveDate,
    prefix: &str,
) -> RotationPlan {
    let mut plan = RotationPlan::default();
    let mut dated = Vec::with_capacity(names.len());

    for name in names {
        match parse_snapshot_name(name, prefix) {
            Some(at) => dated.push((name, at.date())),
            None => {
                tracing::debug!(name = %name, "not a snapshot name, excluded from rotation");
                plan.unparseable.push(name.clone());
            }
        }
    }

    if strategy.daily > 0 {
        let start = today
            .checked_sub_days(Days::new(u64::from(strategy.daily - 1)))
            .unwrap_or(NaiveDate::MIN);
        plan.daily = dated
            .iter()
            .filter(|(_, date)| (start..=today).contains(date))
            .map(|(name, _)| (*name).clone())
            .collect();
    }

    if strategy.monthly > 0 {
        let start = first_of_month(today)
            .checked_sub_months(Months::new(strategy.monthly - 1))
            .unwrap_or(NaiveDate::MIN);
        plan.monthly = keep_period_starts(&dated, start, today, strategy.monthly, |d| d.day() == 1);
    }

    if strategy.yearly > 0 {
        let first_year = today
            .year()
            .saturating_sub(i32::try_from(strategy.yearly - 1).unwrap_or(i32::MAX));
        let start = NaiveDate::from_ymd_opt(first_year, 1, 1).unwrap_or(NaiveDate::MIN);
        plan.yearly = keep_period_starts(&dated, start, today, strategy.yearly, |d| {
            d.day() == 1 && d.month() == 1
        });
    }

    let kept: HashSet<&String> = plan
        .daily
        .iter()
        .chain(&plan.monthly)
        .chain(&plan.yearly)
        .collect();

    plan.delete = dated
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !kept.contains(name))
        .cloned()
        .collect();

    plan
}

/// Keep at most `quota` eligible snapshots inside `[start, end]`, one per date
///
/// The first snapshot seen for a date wins; since input is ascending that is
/// the earliest one.
fn keep_period_starts(
    dated: &[(&String, NaiveDate)],
    start: NaiveDate,
    end: NaiveDate,
    quota: u32,
    eligible: impl Fn(&NaiveDate) -> bool,
) -> Vec<String> {
    let mut kept = Vec::new();
    let mut last_kept: Option<NaiveDate> = None;

    for (name, date) in dated {
        if kept.len() >= quota as usize {
            break;
        }
        if !eligible(date) || !(start..=end).contains(date) {
            continue;
        }
        if last_kept == Some(*date) {
            continue;
        }
        kept.push((*name).clone());
        last_kept = Some(*date);
    }

    kept
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
