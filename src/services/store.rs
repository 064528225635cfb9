//! Per-season cache of normalized tables.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::FetchError;
use crate::services::normalizer::{normalize, ParseMode};
use crate::services::source::RawSource;
use crate::services::team_table::TeamTable;

/// Parse mode per season, with a default for seasons not listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsePolicy {
    pub default: ParseMode,
    pub overrides: HashMap<i32, ParseMode>,
}

impl ParsePolicy {
    pub fn new(default: ParseMode) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, season: i32, mode: ParseMode) -> Self {
        self.overrides.insert(season, mode);
        self
    }

    pub fn mode_for(&self, season: i32) -> ParseMode {
        self.overrides.get(&season).copied().unwrap_or(self.default)
    }
}

/// A table plus the reason it may be empty or stale.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub table: Arc<TeamTable>,
    pub diagnostic: Option<FetchError>,
}

impl Snapshot {
    fn fresh(table: Arc<TeamTable>) -> Self {
        Self { table, diagnostic: None }
    }
}

pub struct SeasonStore<S> {
    source: S,
    policy: ParsePolicy,
    ttl: Option<Duration>,
    tables: RwLock<HashMap<i32, Arc<TeamTable>>>,
}

impl<S: RawSource> SeasonStore<S> {
    pub fn new(source: S, policy: ParsePolicy) -> Self {
        Self {
            source,
            policy,
            ttl: None,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Cached tables older than `ttl` are refetched on the next snapshot.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn policy(&self) -> &ParsePolicy {
        &self.policy
    }

    /// The season's table, fetching it on first use.
    ///
    /// A failed fetch yields an empty table (or the expired one, if there is
    /// one) with the error attached, and leaves the cache untouched.
    pub async fn snapshot(&self, season: i32) -> Snapshot {
        let cached = self.tables.read().await.get(&season).cloned();
        if let Some(table) = &cached {
            if !self.is_expired(table) {
                tracing::debug!("Season {} served from cache", season);
                return Snapshot::fresh(table.clone());
            }
            tracing::debug!("Season {} cache expired", season);
        }

        match self.load(season).await {
            Ok(table) => Snapshot::fresh(table),
            Err(diagnostic) => Snapshot {
                table: cached.unwrap_or_else(|| Arc::new(TeamTable::empty(season))),
                diagnostic: Some(diagnostic),
            },
        }
    }

    /// Refetch unconditionally. On failure the previous table stays in place.
    pub async fn refresh(&self, season: i32) -> Snapshot {
        match self.load(season).await {
            Ok(table) => Snapshot::fresh(table),
            Err(diagnostic) => {
                let previous = self.tables.read().await.get(&season).cloned();
                Snapshot {
                    table: previous.unwrap_or_else(|| Arc::new(TeamTable::empty(season))),
                    diagnostic: Some(diagnostic),
                }
            }
        }
    }

    pub async fn invalidate(&self, season: i32) -> bool {
        self.tables.write().await.remove(&season).is_some()
    }

    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }

    pub async fn cached_seasons(&self) -> Vec<i32> {
        let mut seasons: Vec<i32> = self.tables.read().await.keys().copied().collect();
        seasons.sort_unstable();
        seasons
    }

    async fn load(&self, season: i32) -> Result<Arc<TeamTable>, FetchError> {
        let raw = self.source.fetch(season).await.map_err(|e| {
            tracing::error!(
                "Season {} unavailable from {}: {}",
                season,
                self.source.describe(),
                e
            );
            e
        })?;

        let table = Arc::new(normalize(&raw, self.policy.mode_for(season)));
        if table.is_empty() {
            tracing::warn!("Season {} produced no teams; not caching", season);
            return Ok(table);
        }

        tracing::info!("Season {}: cached {} teams", season, table.len());
        self.tables.write().await.insert(season, table.clone());
        Ok(table)
    }

    fn is_expired(&self, table: &TeamTable) -> bool {
        let (Some(ttl), Some(fetched_at)) = (self.ttl, table.fetched_at()) else {
            return false;
        };
        match (Utc::now() - fetched_at).to_std() {
            Ok(age) => age >= ttl,
            Err(_) => false,
        }
    }
}
