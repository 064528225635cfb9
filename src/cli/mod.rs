use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::models::{Advantage, Metric, TeamRecord};
use crate::services::{
    classify, compare_teams, percentile_rank, CompareOutcome, FeedSource, FileSource, HttpSource, SeasonStore,
    TeamTable,
};
use crate::utils::format_percentile;

/// Build the configured source: a local file or directory if given, else HTTP.
pub fn build_source(settings: &Settings, file: Option<&Path>) -> Result<FeedSource> {
    Ok(match file {
        Some(path) => FeedSource::File(FileSource::new(PathBuf::from(path))),
        None => FeedSource::Http(HttpSource::new(&settings.base_url, settings.fetch_timeout)?),
    })
}

async fn load_season(settings: &Settings, file: Option<&Path>, year: Option<i32>) -> Result<Arc<TeamTable>> {
    let season = year.unwrap_or(settings.default_season);
    let store = SeasonStore::new(build_source(settings, file)?, settings.parse_policy.clone());

    println!("📥 Loading {} season data...", season);
    let snapshot = store.snapshot(season).await;
    if let Some(diagnostic) = snapshot.diagnostic {
        bail!("No data available for season {}: {}", season, diagnostic);
    }
    if snapshot.table.is_empty() {
        bail!("Season {} feed contained no teams", season);
    }

    let quality = snapshot.table.quality();
    if quality.has_issues() {
        println!(
            "⚠️  {} of {} rows admitted ({} short, {} unnamed, {} coerced cells)",
            quality.rows_admitted,
            quality.rows_seen,
            quality.short_rows,
            quality.unnamed_rows,
            quality.coerced_cells
        );
    }
    Ok(snapshot.table)
}

fn not_found(table: &TeamTable, query: &str) -> anyhow::Error {
    let suggestions = table.suggest(query, 3);
    if suggestions.is_empty() {
        anyhow!("Team '{}' not found", query)
    } else {
        anyhow!("Team '{}' not found. Did you mean: {}?", query, suggestions.join(", "))
    }
}

fn rank_label(team: &TeamRecord) -> String {
    if team.is_ranked() {
        format!("#{}", team.rank)
    } else {
        "NR".to_string()
    }
}

pub async fn list_teams(settings: &Settings, file: Option<&Path>, year: Option<i32>, limit: Option<usize>) -> Result<()> {
    let table = load_season(settings, file, year).await?;

    println!("\n🏀 {} teams in {}:", table.len(), table.season());
    for team in table.teams().iter().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "{:>5}  {:<28} {:<8} {:<7} barthag {:.4}",
            rank_label(team),
            team.team,
            team.conference,
            team.record,
            team.barthag
        );
    }
    Ok(())
}

pub async fn query_team(
    settings: &Settings,
    file: Option<&Path>,
    year: Option<i32>,
    name: &str,
    exact: bool,
) -> Result<()> {
    let table = load_season(settings, file, year).await?;
    let matches = table.find_by_name(name, exact);
    if matches.is_empty() {
        return Err(not_found(&table, name));
    }

    for team in matches {
        println!("\n🏀 {} ({}) {}", team.team, team.conference, rank_label(team));
        println!("   Record: {} | WAB: {:+.1}", team.record, team.wins_above_bubble);
        println!(
            "   Adj. O: {:.1} (#{}) | Adj. D: {:.1} (#{}) | Barthag: {:.4}",
            team.adj_offensive_efficiency,
            team.offense_rank,
            team.adj_defensive_efficiency,
            team.defense_rank,
            team.barthag
        );
        println!(
            "   SOS: {:.3} | Non-con SOS: {:.3}",
            team.strength_of_schedule, team.non_conference_sos
        );
        if let Some(tempo) = team.adj_tempo {
            println!("   Tempo: {:.1}", tempo);
        }
        if let Some(percentile) = percentile_rank(&table, Metric::Barthag, team.barthag, false) {
            println!("   Barthag percentile: {}", format_percentile(percentile));
        }
    }
    Ok(())
}

pub async fn search_teams(settings: &Settings, file: Option<&Path>, year: Option<i32>, query: &str) -> Result<()> {
    let table = load_season(settings, file, year).await?;
    let results = table.search(query);

    if results.is_empty() {
        println!("📭 No teams match '{}'", query);
        return Ok(());
    }
    println!("\n🔎 {} match(es) for '{}':", results.len(), query);
    for summary in results {
        println!(
            "   {:<28} {:<8} {:<7} barthag {:.4}",
            summary.team, summary.conference, summary.record, summary.barthag
        );
    }
    Ok(())
}

pub async fn compare(
    settings: &Settings,
    file: Option<&Path>,
    year: Option<i32>,
    team1: &str,
    team2: &str,
    metrics: &[Metric],
) -> Result<()> {
    let table = load_season(settings, file, year).await?;
    let metrics = if metrics.is_empty() {
        Metric::DEFAULT_COMPARISON.to_vec()
    } else {
        metrics.to_vec()
    };

    let result = match compare_teams(&table, team1, team2, &metrics) {
        CompareOutcome::Compared(result) => result,
        CompareOutcome::TeamNotFound(query) => return Err(not_found(&table, &query)),
        CompareOutcome::NotComparable => {
            bail!("No requested metric is available for both {} and {}", team1, team2)
        }
    };

    println!("\n⚔️  {} vs {}", result.team1, result.team2);
    for (metric, delta) in &result.metrics {
        let edge = match delta.advantage {
            Advantage::Team1 => &result.team1,
            Advantage::Team2 => &result.team2,
        };
        println!(
            "   {:<22} {:>9.3} {:>9.3} {:>+9.3}  → {}",
            metric.label(),
            delta.team1_value,
            delta.team2_value,
            delta.difference,
            edge
        );
    }
    Ok(())
}

pub async fn scout(settings: &Settings, file: Option<&Path>, year: Option<i32>, name: &str) -> Result<()> {
    let table = load_season(settings, file, year).await?;
    let team = table.find_team(name).ok_or_else(|| not_found(&table, name))?;
    let profile = classify(team, &table, &settings.thresholds);

    println!("\n📋 Scouting report: {} ({})", profile.team, profile.season);
    for (metric, percentile) in &profile.percentiles {
        println!("   {:<22} {} percentile", metric.label(), format_percentile(*percentile));
    }

    let sections = [
        ("💪 Strengths", &profile.strengths),
        ("⚠️  Weaknesses", &profile.weaknesses),
        ("🎯 Game plan", &profile.game_plan),
    ];
    for (title, labels) in sections {
        println!("\n{}:", title);
        if labels.is_empty() {
            println!("   (none)");
        }
        for label in labels {
            println!("   • {}", label.text);
        }
    }

    if !profile.insufficient_data.is_empty() {
        let missing: Vec<&str> = profile.insufficient_data.iter().map(|m| m.key()).collect();
        println!("\nℹ️  Not enough data for: {}", missing.join(", "));
    }
    Ok(())
}

pub async fn conference(settings: &Settings, file: Option<&Path>, year: Option<i32>, name: Option<&str>) -> Result<()> {
    let table = load_season(settings, file, year).await?;
    let summary = table.conference_summary(name).ok_or_else(|| {
        anyhow!(
            "Unknown conference '{}'. Known: {}",
            name.unwrap_or_default(),
            table.conferences().join(", ")
        )
    })?;

    println!(
        "\n🏆 {} ({} teams, {} wins)",
        summary.conference.as_deref().unwrap_or("All conferences"),
        summary.teams,
        summary.total_wins
    );
    println!(
        "   Avg barthag: {:.4} | Avg Adj. O: {:.1} | Avg Adj. D: {:.1}",
        summary.avg_barthag, summary.avg_adj_offense, summary.avg_adj_defense
    );
    for (i, team) in summary.top_teams.iter().enumerate() {
        println!("   {:>2}. {:<28} {:<7} {:.4}", i + 1, team.team, team.record, team.barthag);
    }
    Ok(())
}
