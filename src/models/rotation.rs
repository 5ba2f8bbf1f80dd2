//! Rotation strategy model
//!
//! A rotation strategy is the number of daily, monthly and yearly periods for
//! which snapshots are retained. A count of zero disables that window.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Retention quotas for snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationStrategy {
    /// Number of most recent calendar days whose snapshots are all kept
    pub daily: u32,
    /// Number of months for which the first-of-month snapshot is kept
    pub monthly: u32,
    /// Number of years for which the January 1st snapshot is kept
    pub yearly: u32,
}

impl RotationStrategy {
    pub const fn new(daily: u32, monthly: u32, yearly: u32) -> Self {
        Self {
            daily,
            monthly,
            yearly,
        }
    }

    /// True when every window is disabled, i.e. nothing is retained
    pub fn retains_nothing(&self) -> bool {
        self.daily == 0 && self.monthly == 0 && self.yearly == 0
    }
}

impl Default for RotationStrategy {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} daily, {} monthly, {} yearly",
            self.daily, self.monthly, self.yearly
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keeps_one_day() {
        let rs = RotationStrategy::default();
        assert_eq!(rs, RotationStrategy::new(1, 0, 0));
        assert!(!rs.retains_nothing());
        assert!(RotationStrategy::new(0, 0, 0).retains_nothing());
        assert!(!RotationStrategy::new(0, 0, 1).retains_nothing());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let rs: RotationStrategy = serde_yaml::from_str("monthly: 5").unwrap();
        assert_eq!(rs, RotationStrategy::new(1, 5, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            RotationStrategy::new(7, 3, 1).to_string(),
            "7 daily, 3 monthly, 1 yearly"
        );
    }
}
