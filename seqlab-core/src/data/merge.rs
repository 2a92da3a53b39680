//! Left-join of an economic series onto bar timestamps by calendar date.

use crate::domain::{Bar, EconomicPoint};
use serde::{Deserialize, Serialize};

/// How a bar whose date has no economic point gets its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Latest point dated on or before the bar's date (weekends, holidays).
    #[default]
    CarryForward,
    /// Exact date match only; other bars get no value and become unusable.
    Drop,
}

/// One value per bar. `points` must be ascending by date.
pub fn merge_economic(bars: &[Bar], points: &[EconomicPoint], policy: FillPolicy) -> Vec<Option<f64>> {
    bars.iter()
        .map(|bar| {
            let date = bar.date();
            // Index of the first point dated after the bar.
            let after = points.partition_point(|p| p.date <= date);
            let latest = after.checked_sub(1).map(|i| &points[i]);
            match (policy, latest) {
                (FillPolicy::CarryForward, Some(p)) => Some(p.value),
                (FillPolicy::Drop, Some(p)) if p.date == date => Some(p.value),
                _ => None,
            }
        })
        .collect()
}
