use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::services::normalizer::ParseMode;
use crate::services::scouting::Thresholds;
use crate::services::source::DEFAULT_BASE_URL;
use crate::services::store::ParsePolicy;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Process settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub default_season: i32,
    pub fetch_timeout: Duration,
    pub cache_ttl: Option<Duration>,
    pub parse_policy: ParsePolicy,
    pub port: u16,
    pub thresholds: Thresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_season: Utc::now().year(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            cache_ttl: None,
            parse_policy: ParsePolicy::default(),
            port: DEFAULT_PORT,
            thresholds: Thresholds::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any key lookup; unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Settings::default();

        let default_mode = match get("PARSE_MODE") {
            Some(raw) => parse_value::<ParseMode>("PARSE_MODE", &raw)?,
            None => ParseMode::Auto,
        };
        let overrides = match get("PARSE_MODE_SEASONS") {
            Some(raw) => parse_season_modes(&raw)?,
            None => HashMap::new(),
        };

        let mut thresholds = defaults.thresholds;
        let quantiles = [
            ("SCOUT_UPPER_QUANTILE", &mut thresholds.upper),
            ("SCOUT_LOWER_QUANTILE", &mut thresholds.lower),
            ("SCOUT_OVERALL_UPPER_QUANTILE", &mut thresholds.overall_upper),
            ("SCOUT_OVERALL_LOWER_QUANTILE", &mut thresholds.overall_lower),
            ("SCOUT_UNTESTED_SCHEDULE_QUANTILE", &mut thresholds.untested_schedule),
        ];
        for (name, slot) in quantiles {
            if let Some(raw) = get(name) {
                *slot = parse_value(name, &raw)?;
            }
        }
        if let Some(raw) = get("SCOUT_TOP_RANK") {
            thresholds.top_rank = parse_value("SCOUT_TOP_RANK", &raw)?;
        }
        if let Some(raw) = get("SCOUT_LOW_RANK") {
            thresholds.low_rank = parse_value("SCOUT_LOW_RANK", &raw)?;
        }

        Ok(Self {
            base_url: get("BARTTORVIK_BASE_URL").unwrap_or(defaults.base_url),
            default_season: match get("DEFAULT_SEASON") {
                Some(raw) => parse_value("DEFAULT_SEASON", &raw)?,
                None => defaults.default_season,
            },
            fetch_timeout: match get("FETCH_TIMEOUT_SECS") {
                Some(raw) => Duration::from_secs(parse_value("FETCH_TIMEOUT_SECS", &raw)?),
                None => defaults.fetch_timeout,
            },
            cache_ttl: match get("CACHE_TTL_SECS") {
                Some(raw) => Some(Duration::from_secs(parse_value("CACHE_TTL_SECS", &raw)?)),
                None => None,
            },
            parse_policy: ParsePolicy {
                default: default_mode,
                overrides,
            },
            port: match get("PORT") {
                Some(raw) => parse_value("PORT", &raw)?,
                None => defaults.port,
            },
            thresholds: thresholds.validate()?,
        })
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, raw.trim()))
}

/// `2024=fixed,2025=header` into a season map.
fn parse_season_modes(raw: &str) -> Result<HashMap<i32, ParseMode>, ConfigError> {
    let mut modes = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (season, mode) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::invalid("PARSE_MODE_SEASONS", entry))?;
        modes.insert(
            parse_value("PARSE_MODE_SEASONS", season)?,
            parse_value("PARSE_MODE_SEASONS", mode)?,
        );
    }
    Ok(modes)
}
