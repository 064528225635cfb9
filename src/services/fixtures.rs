//! Synthetic feed documents shared by the unit tests.

use crate::models::{RawDocument, TeamRecord};
use crate::services::normalizer::{normalize, ParseMode};
use crate::services::team_table::TeamTable;

/// Header of the positional feed: `rank` appears twice (index 0 and 9) and
/// `sos`, `ncsos`, `WAB` sit at 15, 16 and 41.
pub const FIXED_HEADER: &str = "rank,team,conf,record,adjoe,oe Rank,adjde,de Rank,barthag,rank,\
proj. W,Proj. L,Pro Con W,Pro Con L,Con Rec.,sos,ncsos,consos,Proj. SOS,Proj. Noncon SOS,\
Proj. Con SOS,elite SOS,elite noncon SOS,Opp OE,Opp DE,Opp Proj. OE,Opp Proj DE,Con Adj OE,\
Con Adj DE,Qual O,Qual D,Qual Barthag,Qual Games,FUN,ConPF,ConPA,ConPoss,ConOE,ConDE,\
ConSOSRemain,Conf Win%,WAB,WAB Rk,Fun Rk,adjt";

/// One 45-column positional row. Efficiency ranks are `rank + 10` and
/// `rank + 20`; sos, ncsos and WAB are `0.7`, `-1.5` and `3.5`.
pub fn fixed_row(
    rank: u32,
    team: &str,
    conf: &str,
    record: &str,
    adjoe: f64,
    adjde: f64,
    barthag: f64,
) -> String {
    let mut cells: Vec<String> = vec![
        rank.to_string(),
        team.to_string(),
        conf.to_string(),
        record.to_string(),
        adjoe.to_string(),
        (rank + 10).to_string(),
        adjde.to_string(),
        (rank + 20).to_string(),
        barthag.to_string(),
        rank.to_string(),
    ];
    cells.extend((10..15).map(|_| "20.1".to_string()));
    cells.push("0.7".to_string());
    cells.push("-1.5".to_string());
    cells.extend((17..41).map(|_| "1.0".to_string()));
    cells.push("3.5".to_string());
    cells.push(rank.to_string());
    cells.push(rank.to_string());
    cells.push("67.5".to_string());
    cells.join(",")
}

pub fn fixed_document(rows: &[String]) -> String {
    let mut text = String::from(FIXED_HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

/// Header-driven document with reordered columns, four-factor metrics, a
/// duplicated `rank` header and an unbound `Con Adj OE` column.
pub fn header_document() -> String {
    [
        "team,conf,rank,record,barthag,adjoe,adjde,adjt,efg_o,efg_d,tov_o,tov_d,or_o,or_d,ftr_o,ftr_d,sos,ncsos,WAB,Con Adj OE,rank",
        "Houston,B12,1,30-4,0.975,121.5,86.0,62.3,53.1,43.9,14.2,21.0,38.5,27.1,33.0,30.2,0.71,-1.2,8.9,120.1,1",
        "Duke,ACC,2,31-3,0.972,126.0,89.2,66.1,57.2,45.0,15.1,16.4,36.0,26.0,35.5,24.1,0.69,2.3,9.8,124.9,3",
        "Auburn,SEC,3,28-6,0.951,124.1,92.3,68.7,55.0,47.2,14.8,17.3,33.2,29.0,36.1,28.8,0.80,3.1,10.2,123.0,2",
    ]
    .join("\n")
}

pub fn header_table() -> TeamTable {
    normalize(&RawDocument::new(2025, header_document()), ParseMode::HeaderDriven)
}

/// Minimal record with the given core metrics; everything else defaulted.
pub fn team(name: &str, conference: &str, barthag: f64, adjoe: f64, adjde: f64) -> TeamRecord {
    TeamRecord {
        team: name.to_string(),
        conference: conference.to_string(),
        record: "0-0".to_string(),
        wins: 0,
        losses: 0,
        rank: 999,
        offense_rank: 999,
        defense_rank: 999,
        adj_offensive_efficiency: adjoe,
        adj_defensive_efficiency: adjde,
        barthag,
        strength_of_schedule: 0.0,
        non_conference_sos: 0.0,
        wins_above_bubble: 0.0,
        effective_fg_offense: None,
        effective_fg_defense: None,
        turnover_rate_offense: None,
        turnover_rate_defense: None,
        off_rebound_rate: None,
        def_rebound_rate: None,
        free_throw_rate_offense: None,
        free_throw_rate_defense: None,
        adj_tempo: None,
        extra: Default::default(),
    }
}

/// Ten teams with evenly spread metrics: team `i` (1-based) has
/// barthag `i / 10`, adjoe `100 + i`, adjde `110 - i`, sos `i`, rank `i * 12`.
pub fn ladder_table() -> TeamTable {
    let teams = (1..=10)
        .map(|i| {
            let mut t = team(
                &format!("Team {}", i),
                if i % 2 == 0 { "Even" } else { "Odd" },
                i as f64 / 10.0,
                100.0 + i as f64,
                110.0 - i as f64,
            );
            t.strength_of_schedule = i as f64;
            t.rank = i * 12;
            t.wins = i;
            t.losses = 10 - i;
            t.record = format!("{}-{}", i, 10 - i);
            t
        })
        .collect();
    TeamTable::from_records(2025, teams)
}
