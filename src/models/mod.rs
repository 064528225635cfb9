use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::UNRANKED;

/// One season of the raw feed, exactly as the source delivered it.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub season: i32,
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    pub fn new(season: i32, text: impl Into<String>) -> Self {
        Self {
            season,
            text: text.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// Season-to-date statistics for one team.
///
/// Core metrics always hold a real number (bad cells fall back to `0.0`,
/// bad ranks to [`UNRANKED`]). The four-factor and tempo metrics are only
/// present when the season's feed carries those columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team: String,
    pub conference: String,
    pub record: String,
    pub wins: u32,
    pub losses: u32,
    pub rank: u32,
    pub offense_rank: u32,
    pub defense_rank: u32,
    pub adj_offensive_efficiency: f64,
    pub adj_defensive_efficiency: f64,
    pub barthag: f64,
    pub strength_of_schedule: f64,
    pub non_conference_sos: f64,
    pub wins_above_bubble: f64,
    pub effective_fg_offense: Option<f64>,
    pub effective_fg_defense: Option<f64>,
    pub turnover_rate_offense: Option<f64>,
    pub turnover_rate_defense: Option<f64>,
    pub off_rebound_rate: Option<f64>,
    pub def_rebound_rate: Option<f64>,
    pub free_throw_rate_offense: Option<f64>,
    pub free_throw_rate_defense: Option<f64>,
    pub adj_tempo: Option<f64>,
    /// Header columns the schema does not bind, keyed by repaired header name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl TeamRecord {
    pub fn is_ranked(&self) -> bool {
        self.rank != UNRANKED
    }

    pub fn summary(&self) -> TeamSummary {
        TeamSummary {
            team: self.team.clone(),
            conference: self.conference.clone(),
            record: self.record.clone(),
            barthag: self.barthag,
        }
    }
}

/// Lightweight projection used by search listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub team: String,
    pub conference: String,
    pub record: String,
    pub barthag: f64,
}

/// Every numeric metric a team record can be compared or ranked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "barthag")]
    Barthag,
    #[serde(rename = "adjoe")]
    AdjOffense,
    #[serde(rename = "adjde")]
    AdjDefense,
    #[serde(rename = "adjt")]
    AdjTempo,
    #[serde(rename = "sos")]
    StrengthOfSchedule,
    #[serde(rename = "ncsos")]
    NonConferenceSos,
    #[serde(rename = "wab")]
    WinsAboveBubble,
    #[serde(rename = "wins")]
    Wins,
    #[serde(rename = "losses")]
    Losses,
    #[serde(rename = "rank")]
    Rank,
    #[serde(rename = "efg_o")]
    EffectiveFgOffense,
    #[serde(rename = "efg_d")]
    EffectiveFgDefense,
    #[serde(rename = "tov_o")]
    TurnoverRateOffense,
    #[serde(rename = "tov_d")]
    TurnoverRateDefense,
    #[serde(rename = "or_o")]
    OffReboundRate,
    #[serde(rename = "dr_d")]
    DefReboundRate,
    #[serde(rename = "ftr_o")]
    FreeThrowRateOffense,
    #[serde(rename = "ftr_d")]
    FreeThrowRateDefense,
}

impl Metric {
    pub const ALL: [Metric; 18] = [
        Metric::Barthag,
        Metric::AdjOffense,
        Metric::AdjDefense,
        Metric::AdjTempo,
        Metric::StrengthOfSchedule,
        Metric::NonConferenceSos,
        Metric::WinsAboveBubble,
        Metric::Wins,
        Metric::Losses,
        Metric::Rank,
        Metric::EffectiveFgOffense,
        Metric::EffectiveFgDefense,
        Metric::TurnoverRateOffense,
        Metric::TurnoverRateDefense,
        Metric::OffReboundRate,
        Metric::DefReboundRate,
        Metric::FreeThrowRateOffense,
        Metric::FreeThrowRateDefense,
    ];

    /// Metrics a head-to-head comparison covers when the caller names none.
    pub const DEFAULT_COMPARISON: [Metric; 15] = [
        Metric::Barthag,
        Metric::AdjOffense,
        Metric::AdjDefense,
        Metric::AdjTempo,
        Metric::EffectiveFgOffense,
        Metric::EffectiveFgDefense,
        Metric::TurnoverRateOffense,
        Metric::TurnoverRateDefense,
        Metric::OffReboundRate,
        Metric::DefReboundRate,
        Metric::FreeThrowRateOffense,
        Metric::FreeThrowRateDefense,
        Metric::StrengthOfSchedule,
        Metric::NonConferenceSos,
        Metric::WinsAboveBubble,
    ];

    /// Metrics a scouting profile reports percentiles for.
    pub const TRACKED: [Metric; 16] = [
        Metric::Barthag,
        Metric::AdjOffense,
        Metric::AdjDefense,
        Metric::AdjTempo,
        Metric::StrengthOfSchedule,
        Metric::NonConferenceSos,
        Metric::WinsAboveBubble,
        Metric::Rank,
        Metric::EffectiveFgOffense,
        Metric::EffectiveFgDefense,
        Metric::TurnoverRateOffense,
        Metric::TurnoverRateDefense,
        Metric::OffReboundRate,
        Metric::DefReboundRate,
        Metric::FreeThrowRateOffense,
        Metric::FreeThrowRateDefense,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Barthag => "barthag",
            Metric::AdjOffense => "adjoe",
            Metric::AdjDefense => "adjde",
            Metric::AdjTempo => "adjt",
            Metric::StrengthOfSchedule => "sos",
            Metric::NonConferenceSos => "ncsos",
            Metric::WinsAboveBubble => "wab",
            Metric::Wins => "wins",
            Metric::Losses => "losses",
            Metric::Rank => "rank",
            Metric::EffectiveFgOffense => "efg_o",
            Metric::EffectiveFgDefense => "efg_d",
            Metric::TurnoverRateOffense => "tov_o",
            Metric::TurnoverRateDefense => "tov_d",
            Metric::OffReboundRate => "or_o",
            Metric::DefReboundRate => "dr_d",
            Metric::FreeThrowRateOffense => "ftr_o",
            Metric::FreeThrowRateDefense => "ftr_d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Barthag => "Barthag",
            Metric::AdjOffense => "Adj. Offense",
            Metric::AdjDefense => "Adj. Defense",
            Metric::AdjTempo => "Adj. Tempo",
            Metric::StrengthOfSchedule => "Strength of Schedule",
            Metric::NonConferenceSos => "Non-Con SOS",
            Metric::WinsAboveBubble => "Wins Above Bubble",
            Metric::Wins => "Wins",
            Metric::Losses => "Losses",
            Metric::Rank => "National Rank",
            Metric::EffectiveFgOffense => "Effective FG%",
            Metric::EffectiveFgDefense => "Opp Effective FG%",
            Metric::TurnoverRateOffense => "Turnover Rate",
            Metric::TurnoverRateDefense => "Opp Turnover Rate",
            Metric::OffReboundRate => "Off. Rebound Rate",
            Metric::DefReboundRate => "Def. Rebound Rate",
            Metric::FreeThrowRateOffense => "Free Throw Rate",
            Metric::FreeThrowRateDefense => "Opp Free Throw Rate",
        }
    }

    /// Whether a smaller value is the better one for the team that owns it.
    pub fn lower_is_better(self) -> bool {
        matches!(
            self,
            Metric::AdjDefense
                | Metric::Losses
                | Metric::Rank
                | Metric::EffectiveFgDefense
                | Metric::TurnoverRateOffense
                | Metric::FreeThrowRateDefense
        )
    }

    /// The metric's value on a record, or `None` when the season's schema
    /// lacks it (or, for rank, the team is unranked).
    pub fn value(self, team: &TeamRecord) -> Option<f64> {
        match self {
            Metric::Barthag => Some(team.barthag),
            Metric::AdjOffense => Some(team.adj_offensive_efficiency),
            Metric::AdjDefense => Some(team.adj_defensive_efficiency),
            Metric::AdjTempo => team.adj_tempo,
            Metric::StrengthOfSchedule => Some(team.strength_of_schedule),
            Metric::NonConferenceSos => Some(team.non_conference_sos),
            Metric::WinsAboveBubble => Some(team.wins_above_bubble),
            Metric::Wins => Some(team.wins as f64),
            Metric::Losses => Some(team.losses as f64),
            Metric::Rank => team.is_ranked().then_some(team.rank as f64),
            Metric::EffectiveFgOffense => team.effective_fg_offense,
            Metric::EffectiveFgDefense => team.effective_fg_defense,
            Metric::TurnoverRateOffense => team.turnover_rate_offense,
            Metric::TurnoverRateDefense => team.turnover_rate_defense,
            Metric::OffReboundRate => team.off_rebound_rate,
            Metric::DefReboundRate => team.def_rebound_rate,
            Metric::FreeThrowRateOffense => team.free_throw_rate_offense,
            Metric::FreeThrowRateDefense => team.free_throw_rate_defense,
        }
        .filter(|v| v.is_finite())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.key() == wanted)
            .ok_or_else(|| format!("unknown metric '{}'", s.trim()))
    }
}

/// Which side of a head-to-head holds the larger value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Advantage {
    Team1,
    Team2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub team1_value: f64,
    pub team2_value: f64,
    pub difference: f64,
    pub advantage: Advantage,
}

/// Per-metric head-to-head deltas. Only metrics resolved on both sides appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub team1: String,
    pub team2: String,
    pub metrics: BTreeMap<Metric, MetricComparison>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Strength,
    Weakness,
    GamePlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutingLabel {
    pub metric: Metric,
    pub text: String,
}

/// Qualitative read on one team against the rest of its season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutingProfile {
    pub team: String,
    pub season: i32,
    pub percentiles: BTreeMap<Metric, f64>,
    pub strengths: Vec<ScoutingLabel>,
    pub weaknesses: Vec<ScoutingLabel>,
    pub game_plan: Vec<ScoutingLabel>,
    /// Metrics the rules could not judge: absent on the team or without a
    /// distribution in the table.
    pub insufficient_data: Vec<Metric>,
}

impl ScoutingProfile {
    /// True when no metric could be judged at all.
    pub fn is_insufficient(&self) -> bool {
        self.percentiles.is_empty()
            && self.strengths.is_empty()
            && self.weaknesses.is_empty()
            && self.game_plan.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferenceSummary {
    /// `None` for the all-teams summary.
    pub conference: Option<String>,
    pub teams: usize,
    pub avg_barthag: f64,
    pub avg_adj_offense: f64,
    pub avg_adj_defense: f64,
    pub total_wins: u32,
    pub top_teams: Vec<TeamSummary>,
}

// API Response types
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
