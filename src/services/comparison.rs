use std::collections::BTreeMap;

use crate::models::{Advantage, ComparisonResult, Metric, MetricComparison, TeamRecord};
use crate::services::team_table::TeamTable;
use crate::utils::quantile_sorted;

/// Outcome of a head-to-head lookup against a table.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareOutcome {
    Compared(ComparisonResult),
    /// The query that matched no team.
    TeamNotFound(String),
    /// Both teams exist but no requested metric resolves on both.
    NotComparable,
}

/// Per-metric deltas between two teams.
///
/// `advantage` goes to team1 only when its value is strictly larger; equal
/// values go to team2. Metrics missing on either side are skipped. Returns
/// `None` when nothing resolves on both sides.
pub fn compare(a: &TeamRecord, b: &TeamRecord, metrics: &[Metric]) -> Option<ComparisonResult> {
    let mut resolved = BTreeMap::new();
    for &metric in metrics {
        let (Some(value1), Some(value2)) = (metric.value(a), metric.value(b)) else {
            continue;
        };
        let advantage = if value1 > value2 {
            Advantage::Team1
        } else {
            Advantage::Team2
        };
        resolved.insert(
            metric,
            MetricComparison {
                team1_value: value1,
                team2_value: value2,
                difference: value1 - value2,
                advantage,
            },
        );
    }

    if resolved.is_empty() {
        return None;
    }
    Some(ComparisonResult {
        team1: a.team.clone(),
        team2: b.team.clone(),
        metrics: resolved,
    })
}

/// Look both teams up (exact first, then substring) and compare them.
pub fn compare_teams(table: &TeamTable, team1: &str, team2: &str, metrics: &[Metric]) -> CompareOutcome {
    let Some(a) = table.find_team(team1) else {
        return CompareOutcome::TeamNotFound(team1.to_string());
    };
    let Some(b) = table.find_team(team2) else {
        return CompareOutcome::TeamNotFound(team2.to_string());
    };
    match compare(a, b, metrics) {
        Some(result) => CompareOutcome::Compared(result),
        None => CompareOutcome::NotComparable,
    }
}

/// Sorted values of one metric across a table.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDistribution {
    metric: Metric,
    sorted: Vec<f64>,
}

impl MetricDistribution {
    pub fn from_table(table: &TeamTable, metric: Metric) -> Self {
        let mut sorted = table.values(metric);
        sorted.sort_by(f64::total_cmp);
        Self { metric, sorted }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Linear-interpolation quantile; `None` for an empty distribution.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        quantile_sorted(&self.sorted, q)
    }

    /// Percent of values strictly worse than `value`.
    pub fn percentile(&self, value: f64, lower_is_better: bool) -> Option<f64> {
        if self.sorted.is_empty() || !value.is_finite() {
            return None;
        }
        let worse = if lower_is_better {
            // values > value
            self.sorted.len() - self.sorted.partition_point(|v| *v <= value)
        } else {
            // values < value
            self.sorted.partition_point(|v| *v < value)
        };
        Some(worse as f64 / self.sorted.len() as f64 * 100.0)
    }
}

/// Percent of the table strictly worse than `value` on `metric`, in [0, 100].
///
/// `None` when the table has no values for the metric: the percentile is
/// undefined, not zero.
pub fn percentile_rank(table: &TeamTable, metric: Metric, value: f64, lower_is_better: bool) -> Option<f64> {
    MetricDistribution::from_table(table, metric).percentile(value, lower_is_better)
}
