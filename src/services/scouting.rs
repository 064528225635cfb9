//! Threshold-based scouting labels.
//!
//! Every label comes from one row of [`RULES`]: a condition comparing the
//! team against a quantile of the season's distribution (or against a rank
//! cutoff) and the text to emit when it holds. Adding a rule never touches the
//! existing ones.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::ConfigError;
use crate::models::{LabelKind, Metric, ScoutingLabel, ScoutingProfile, TeamRecord};
use crate::services::comparison::MetricDistribution;
use crate::services::team_table::TeamTable;

/// Quantile levels and rank cutoffs the rules are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub upper: f64,
    pub lower: f64,
    pub overall_upper: f64,
    pub overall_lower: f64,
    pub untested_schedule: f64,
    pub top_rank: u32,
    pub low_rank: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            upper: 0.75,
            lower: 0.25,
            overall_upper: 0.80,
            overall_lower: 0.20,
            untested_schedule: 0.30,
            top_rank: 25,
            low_rank: 100,
        }
    }
}

impl Thresholds {
    pub fn validate(self) -> Result<Self, ConfigError> {
        let quantiles = [
            ("SCOUT_UPPER_QUANTILE", self.upper),
            ("SCOUT_LOWER_QUANTILE", self.lower),
            ("SCOUT_OVERALL_UPPER_QUANTILE", self.overall_upper),
            ("SCOUT_OVERALL_LOWER_QUANTILE", self.overall_lower),
            ("SCOUT_UNTESTED_SCHEDULE_QUANTILE", self.untested_schedule),
        ];
        for (name, q) in quantiles {
            if !(0.0..=1.0).contains(&q) {
                return Err(ConfigError::invalid(name, q));
            }
        }
        if self.lower >= self.upper {
            return Err(ConfigError::invalid("SCOUT_LOWER_QUANTILE", self.lower));
        }
        if self.overall_lower >= self.overall_upper {
            return Err(ConfigError::invalid("SCOUT_OVERALL_LOWER_QUANTILE", self.overall_lower));
        }
        if self.top_rank > self.low_rank {
            return Err(ConfigError::invalid("SCOUT_TOP_RANK", self.top_rank));
        }
        Ok(self)
    }

    fn quantile(&self, level: Level) -> f64 {
        match level {
            Level::Upper => self.upper,
            Level::Lower => self.lower,
            Level::OverallUpper => self.overall_upper,
            Level::OverallLower => self.overall_lower,
            Level::UntestedSchedule => self.untested_schedule,
        }
    }

    fn rank(&self, cut: RankCut) -> u32 {
        match cut {
            RankCut::Top => self.top_rank,
            RankCut::Low => self.low_rank,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Upper,
    Lower,
    OverallUpper,
    OverallLower,
    UntestedSchedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankCut {
    Top,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Team value >= the level's quantile of the table.
    AtOrAbove(Metric, Level),
    /// Team value <= the level's quantile of the table.
    AtOrBelow(Metric, Level),
    /// Ranked at or better than the cutoff.
    RankAtMost(RankCut),
    /// Ranked worse than the cutoff.
    RankBeyond(RankCut),
}

impl Condition {
    pub fn metric(&self) -> Metric {
        match *self {
            Condition::AtOrAbove(metric, _) | Condition::AtOrBelow(metric, _) => metric,
            Condition::RankAtMost(_) | Condition::RankBeyond(_) => Metric::Rank,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoutingRule {
    pub kind: LabelKind,
    pub condition: Condition,
    pub text: &'static str,
}

const fn rule(kind: LabelKind, condition: Condition, text: &'static str) -> ScoutingRule {
    ScoutingRule { kind, condition, text }
}

use Condition::{AtOrAbove, AtOrBelow, RankAtMost, RankBeyond};
use LabelKind::{GamePlan, Strength, Weakness};

pub const RULES: &[ScoutingRule] = &[
    // strengths
    rule(Strength, AtOrAbove(Metric::AdjOffense, Level::Upper), "Elite offensive efficiency"),
    rule(Strength, AtOrBelow(Metric::AdjDefense, Level::Lower), "Dominant defensive performance"),
    rule(Strength, RankAtMost(RankCut::Top), "Top 25 nationally ranked team"),
    rule(Strength, AtOrAbove(Metric::Barthag, Level::OverallUpper), "High overall team rating"),
    rule(Strength, AtOrAbove(Metric::StrengthOfSchedule, Level::Upper), "Tested against strong schedule"),
    rule(Strength, AtOrAbove(Metric::AdjTempo, Level::Upper), "High-tempo offense"),
    rule(Strength, AtOrAbove(Metric::EffectiveFgOffense, Level::Upper), "Excellent shooting efficiency"),
    // weaknesses
    rule(Weakness, AtOrBelow(Metric::AdjOffense, Level::Lower), "Struggles with offensive efficiency"),
    rule(Weakness, AtOrAbove(Metric::AdjDefense, Level::Upper), "Defensive efficiency concerns"),
    rule(Weakness, RankBeyond(RankCut::Low), "Lower national ranking"),
    rule(Weakness, AtOrBelow(Metric::Barthag, Level::OverallLower), "Low overall team rating"),
    rule(Weakness, AtOrBelow(Metric::StrengthOfSchedule, Level::Lower), "Weak strength of schedule"),
    rule(Weakness, AtOrAbove(Metric::TurnoverRateOffense, Level::Upper), "High turnover rate"),
    rule(Weakness, AtOrAbove(Metric::EffectiveFgDefense, Level::Upper), "Allows efficient shooting"),
    // game plan
    rule(GamePlan, AtOrAbove(Metric::AdjOffense, Level::Upper), "Focus on defensive intensity - they have strong offense"),
    rule(GamePlan, AtOrAbove(Metric::AdjDefense, Level::Upper), "Attack their defense - they struggle defensively"),
    rule(GamePlan, AtOrBelow(Metric::StrengthOfSchedule, Level::UntestedSchedule), "They may not be tested - apply early pressure"),
    rule(GamePlan, AtOrAbove(Metric::TurnoverRateDefense, Level::Upper), "Emphasize ball security - they force turnovers"),
    rule(GamePlan, AtOrAbove(Metric::OffReboundRate, Level::Upper), "Box out aggressively - they're strong on offensive glass"),
    rule(GamePlan, AtOrBelow(Metric::AdjTempo, Level::Lower), "Push tempo - they prefer slower pace"),
];

/// Scout one team against its season using the built-in rule table.
pub fn classify(team: &TeamRecord, table: &TeamTable, thresholds: &Thresholds) -> ScoutingProfile {
    classify_with(team, table, thresholds, RULES)
}

pub fn classify_with(
    team: &TeamRecord,
    table: &TeamTable,
    thresholds: &Thresholds,
    rules: &[ScoutingRule],
) -> ScoutingProfile {
    let mut distributions: HashMap<Metric, MetricDistribution> = HashMap::new();
    let mut distribution = |metric: Metric| -> MetricDistribution {
        distributions
            .entry(metric)
            .or_insert_with(|| MetricDistribution::from_table(table, metric))
            .clone()
    };

    let mut insufficient = BTreeSet::new();
    let mut percentiles = BTreeMap::new();
    for metric in Metric::TRACKED {
        let percentile = metric
            .value(team)
            .and_then(|value| distribution(metric).percentile(value, metric.lower_is_better()));
        match percentile {
            Some(p) => {
                percentiles.insert(metric, p);
            }
            None => {
                insufficient.insert(metric);
            }
        }
    }

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut game_plan = Vec::new();

    for rule in rules {
        let metric = rule.condition.metric();
        let Some(value) = metric.value(team) else {
            insufficient.insert(metric);
            continue;
        };
        if table.is_empty() {
            insufficient.insert(metric);
            continue;
        }

        // A team sitting on both the upper and lower cut has no usable spread.
        let flat = |dist: &MetricDistribution| {
            match (dist.quantile(thresholds.upper), dist.quantile(thresholds.lower)) {
                (Some(upper), Some(lower)) => value >= upper && value <= lower,
                _ => false,
            }
        };

        let holds = match rule.condition {
            AtOrAbove(..) | AtOrBelow(..) if flat(&distribution(metric)) => None,
            AtOrAbove(_, level) => distribution(metric)
                .quantile(thresholds.quantile(level))
                .map(|cut| value >= cut),
            AtOrBelow(_, level) => distribution(metric)
                .quantile(thresholds.quantile(level))
                .map(|cut| value <= cut),
            RankAtMost(cut) => Some(value <= thresholds.rank(cut) as f64),
            RankBeyond(cut) => Some(value > thresholds.rank(cut) as f64),
        };

        match holds {
            None => {
                insufficient.insert(metric);
            }
            Some(false) => {}
            Some(true) => {
                let label = ScoutingLabel {
                    metric,
                    text: rule.text.to_string(),
                };
                match rule.kind {
                    Strength => strengths.push(label),
                    Weakness => weaknesses.push(label),
                    GamePlan => game_plan.push(label),
                }
            }
        }
    }

    // Custom rule tables can still put one metric on both sides.
    let strong: BTreeSet<Metric> = strengths.iter().map(|l| l.metric).collect();
    let conflicted: BTreeSet<Metric> = weaknesses
        .iter()
        .map(|l| l.metric)
        .filter(|m| strong.contains(m))
        .collect();
    if !conflicted.is_empty() {
        tracing::debug!(
            "{}: dropping conflicting labels for {:?}",
            team.team,
            conflicted
        );
        strengths.retain(|l| !conflicted.contains(&l.metric));
        weaknesses.retain(|l| !conflicted.contains(&l.metric));
    }

    ScoutingProfile {
        team: team.team.clone(),
        season: table.season(),
        percentiles,
        strengths,
        weaknesses,
        game_plan,
        insufficient_data: insufficient.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{header_table, ladder_table, team};

    fn texts(labels: &[ScoutingLabel]) -> Vec<&str> {
        labels.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_top_team_strengths() {
        let table = ladder_table();
        let best = table.find_exact("Team 10").unwrap();
        let profile = classify(best, &table, &Thresholds::default());

        assert_eq!(
            texts(&profile.strengths),
            vec![
                "Elite offensive efficiency",
                "Dominant defensive performance",
                "High overall team rating",
                "Tested against strong schedule",
            ]
        );
        assert_eq!(texts(&profile.weaknesses), vec!["Lower national ranking"]);
        assert_eq!(
            texts(&profile.game_plan),
            vec!["Focus on defensive intensity - they have strong offense"]
        );
        assert_eq!(profile.percentiles[&Metric::Barthag], 90.0);
        assert_eq!(profile.percentiles[&Metric::AdjDefense], 90.0);
    }

    #[test]
    fn test_bottom_team_weaknesses() {
        let table = ladder_table();
        let worst = table.find_exact("Team 1").unwrap();
        let profile = classify(worst, &table, &Thresholds::default());

        assert_eq!(texts(&profile.strengths), vec!["Top 25 nationally ranked team"]);
        assert_eq!(
            texts(&profile.weaknesses),
            vec![
                "Struggles with offensive efficiency",
                "Defensive efficiency concerns",
                "Low overall team rating",
                "Weak strength of schedule",
            ]
        );
        assert_eq!(
            texts(&profile.game_plan),
            vec![
                "Attack their defense - they struggle defensively",
                "They may not be tested - apply early pressure",
            ]
        );
        assert_eq!(profile.percentiles[&Metric::Barthag], 0.0);
    }

    #[test]
    fn test_absent_metrics_are_insufficient_not_guessed() {
        let table = ladder_table();
        let profile = classify(table.find_exact("Team 5").unwrap(), &table, &Thresholds::default());
        for metric in [
            Metric::AdjTempo,
            Metric::EffectiveFgOffense,
            Metric::TurnoverRateDefense,
            Metric::OffReboundRate,
        ] {
            assert!(profile.insufficient_data.contains(&metric));
            assert!(!profile.percentiles.contains_key(&metric));
        }
        assert!(profile.game_plan.iter().all(|l| l.metric != Metric::AdjTempo));
    }

    #[test]
    fn test_empty_table_is_insufficient() {
        let empty = TeamTable::empty(2025);
        let lone = team("Lone", "X", 0.9, 120.0, 90.0);
        let profile = classify(&lone, &empty, &Thresholds::default());
        assert!(profile.is_insufficient());
        assert!(profile.insufficient_data.contains(&Metric::Barthag));
        assert!(profile.insufficient_data.contains(&Metric::AdjOffense));
    }

    #[test]
    fn test_flat_distribution_never_both_strength_and_weakness() {
        let teams = (0..4)
            .map(|i| {
                let mut t = team(&format!("Clone {}", i), "X", 0.5, 105.0, 105.0);
                t.rank = 50;
                t.adj_tempo = Some(68.0);
                t
            })
            .collect();
        let table = TeamTable::from_records(2025, teams);
        let profile = classify(&table.teams()[0], &table, &Thresholds::default());

        assert!(profile.strengths.is_empty());
        assert!(profile.weaknesses.is_empty());
        assert!(profile.game_plan.is_empty());
        for metric in [
            Metric::AdjOffense,
            Metric::AdjDefense,
            Metric::AdjTempo,
            Metric::Barthag,
            Metric::StrengthOfSchedule,
        ] {
            assert!(profile.insufficient_data.contains(&metric));
        }
        assert!(!profile.insufficient_data.contains(&Metric::Rank));
    }

    #[test]
    fn test_flat_metric_does_not_mute_spread_ones() {
        let teams = (1..=4)
            .map(|i| {
                let mut t = team(&format!("Team {}", i), "X", 0.5, 100.0 + i as f64, 105.0);
                t.adj_tempo = Some(68.0);
                t
            })
            .collect();
        let table = TeamTable::from_records(2025, teams);
        let profile = classify(table.find_exact("Team 4").unwrap(), &table, &Thresholds::default());

        assert_eq!(texts(&profile.strengths), vec!["Elite offensive efficiency"]);
        assert_eq!(
            texts(&profile.game_plan),
            vec!["Focus on defensive intensity - they have strong offense"]
        );
        assert!(profile.insufficient_data.contains(&Metric::AdjTempo));
        assert!(!profile.insufficient_data.contains(&Metric::AdjOffense));
    }

    #[test]
    fn test_no_metric_is_both_strength_and_weakness() {
        let table = header_table();
        for team in table.teams() {
            let profile = classify(team, &table, &Thresholds::default());
            let strong: BTreeSet<Metric> = profile.strengths.iter().map(|l| l.metric).collect();
            assert!(profile.weaknesses.iter().all(|l| !strong.contains(&l.metric)));
        }
    }

    #[test]
    fn test_four_factor_rules_fire_when_present() {
        let table = header_table();
        let auburn = table.find_exact("Auburn").unwrap();
        let profile = classify(auburn, &table, &Thresholds::default());
        // Auburn has the highest tempo and the highest opponent eFG%.
        assert!(texts(&profile.strengths).contains(&"High-tempo offense"));
        assert!(texts(&profile.weaknesses).contains(&"Allows efficient shooting"));

        let houston = table.find_exact("Houston").unwrap();
        let profile = classify(houston, &table, &Thresholds::default());
        assert!(texts(&profile.game_plan).contains(&"Emphasize ball security - they force turnovers"));
        assert!(texts(&profile.game_plan).contains(&"Box out aggressively - they're strong on offensive glass"));
        assert!(texts(&profile.game_plan).contains(&"Push tempo - they prefer slower pace"));
    }

    #[test]
    fn test_custom_rule_table() {
        let table = ladder_table();
        let rules = [rule(
            GamePlan,
            AtOrAbove(Metric::Wins, Level::Upper),
            "Hot team",
        )];
        let profile = classify_with(table.find_exact("Team 9").unwrap(), &table, &Thresholds::default(), &rules);
        assert_eq!(texts(&profile.game_plan), vec!["Hot team"]);
        assert!(profile.strengths.is_empty());
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Thresholds::default().validate().is_ok());
        let inverted = Thresholds {
            lower: 0.8,
            ..Thresholds::default()
        };
        assert!(inverted.validate().is_err());
        let out_of_range = Thresholds {
            upper: 1.5,
            ..Thresholds::default()
        };
        assert!(out_of_range.validate().is_err());
    }
}
