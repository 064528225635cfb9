use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;
use std::collections::{BTreeSet, HashMap};

use crate::models::{ConferenceSummary, Metric, TeamRecord, TeamSummary};
use crate::services::normalizer::{DataQuality, Layout};

const TOP_TEAMS_PER_CONFERENCE: usize = 10;
const SUGGESTION_FLOOR: f64 = 0.75;

/// Normalized teams for one season, in source (rank) order.
///
/// Built once by the normalizer and never mutated afterwards; share it behind
/// an `Arc` and replace the whole table when a season is refetched.
#[derive(Debug, Clone)]
pub struct TeamTable {
    season: i32,
    columns: Vec<String>,
    teams: Vec<TeamRecord>,
    lowered: Vec<String>,
    by_name: HashMap<String, usize>,
    quality: DataQuality,
    fetched_at: Option<DateTime<Utc>>,
}

impl TeamTable {
    /// The "no data available" table.
    pub fn empty(season: i32) -> Self {
        Self::new(season, Vec::new(), Vec::new(), DataQuality::default(), None)
    }

    /// Table from records that did not come through the normalizer.
    pub fn from_records(season: i32, teams: Vec<TeamRecord>) -> Self {
        let quality = DataQuality {
            rows_seen: teams.len(),
            rows_admitted: teams.len(),
            ..DataQuality::default()
        };
        Self::new(season, Vec::new(), teams, quality, None)
    }

    pub(crate) fn new(
        season: i32,
        columns: Vec<String>,
        teams: Vec<TeamRecord>,
        quality: DataQuality,
        fetched_at: Option<DateTime<Utc>>,
    ) -> Self {
        let lowered: Vec<String> = teams.iter().map(|t| t.team.to_lowercase()).collect();
        let mut by_name = HashMap::with_capacity(lowered.len());
        for (index, name) in lowered.iter().enumerate() {
            by_name.entry(name.clone()).or_insert(index);
        }
        Self {
            season,
            columns,
            teams,
            lowered,
            by_name,
            quality,
            fetched_at,
        }
    }

    pub fn season(&self) -> i32 {
        self.season
    }

    pub fn teams(&self) -> &[TeamRecord] {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn quality(&self) -> &DataQuality {
        &self.quality
    }

    pub fn layout(&self) -> Option<Layout> {
        self.quality.layout
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Header names after duplicate repair, in source order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Source index of a (repaired) header name, case-insensitive.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn list_teams(&self) -> Vec<&str> {
        self.teams.iter().map(|t| t.team.as_str()).collect()
    }

    /// First team whose name equals `query`, ignoring case.
    pub fn find_exact(&self, query: &str) -> Option<&TeamRecord> {
        self.by_name
            .get(&query.trim().to_lowercase())
            .map(|&index| &self.teams[index])
    }

    /// Every team whose name contains `query`, ignoring case, in table order.
    /// An empty query matches every team.
    pub fn find_matching(&self, query: &str) -> Vec<&TeamRecord> {
        let needle = query.trim().to_lowercase();
        self.lowered
            .iter()
            .zip(&self.teams)
            .filter(|(name, _)| name.contains(&needle))
            .map(|(_, team)| team)
            .collect()
    }

    /// Exact mode returns at most one record; substring mode returns all.
    pub fn find_by_name(&self, query: &str, exact: bool) -> Vec<&TeamRecord> {
        if exact {
            self.find_exact(query).into_iter().collect()
        } else {
            self.find_matching(query)
        }
    }

    /// Exact match if there is one, otherwise the first substring match.
    pub fn find_team(&self, query: &str) -> Option<&TeamRecord> {
        self.find_exact(query)
            .or_else(|| self.find_matching(query).into_iter().next())
    }

    pub fn search(&self, query: &str) -> Vec<TeamSummary> {
        self.find_matching(query)
            .into_iter()
            .map(TeamRecord::summary)
            .collect()
    }

    /// Closest team names by Jaro-Winkler similarity, best first.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(f64, usize)> = self
            .lowered
            .iter()
            .enumerate()
            .map(|(index, name)| (strsim::jaro_winkler(&needle, name), index))
            .filter(|(score, _)| *score >= SUGGESTION_FLOOR)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, index)| self.teams[index].team.as_str())
            .collect()
    }

    /// Every resolved value of `metric` across the table.
    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.teams.iter().filter_map(|t| metric.value(t)).collect()
    }

    /// `(min, max)` barthag across the table.
    pub fn barthag_range(&self) -> Option<(f64, f64)> {
        self.teams.iter().map(|t| t.barthag).fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Distinct conference names, sorted.
    pub fn conferences(&self) -> Vec<&str> {
        self.teams
            .iter()
            .map(|t| t.conference.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Averages and top teams for one conference, or every team when
    /// `conference` is `None`. `None` if no team matches.
    pub fn conference_summary(&self, conference: Option<&str>) -> Option<ConferenceSummary> {
        let members: Vec<&TeamRecord> = self
            .teams
            .iter()
            .filter(|t| conference.map_or(true, |c| t.conference.eq_ignore_ascii_case(c.trim())))
            .collect();
        if members.is_empty() {
            return None;
        }

        let mut top: Vec<&TeamRecord> = members.clone();
        top.sort_by(|a, b| b.barthag.total_cmp(&a.barthag));

        Some(ConferenceSummary {
            conference: conference.map(|_| members[0].conference.clone()),
            teams: members.len(),
            avg_barthag: members.iter().map(|t| t.barthag).mean(),
            avg_adj_offense: members.iter().map(|t| t.adj_offensive_efficiency).mean(),
            avg_adj_defense: members.iter().map(|t| t.adj_defensive_efficiency).mean(),
            total_wins: members.iter().map(|t| t.wins).sum(),
            top_teams: top
                .into_iter()
                .take(TOP_TEAMS_PER_CONFERENCE)
                .map(TeamRecord::summary)
                .collect(),
        })
    }
}
