//! Turns one season of the raw team-results feed into a typed [`TeamTable`].
//!
//! The feed is addressed two ways. Header-driven parsing binds fields by
//! header name and tolerates added or reordered columns. Fixed-position
//! parsing ignores header names and reads the historical 44+-column layout by
//! index, which is the only safe choice for releases whose header does not
//! line up with the data. Both go through one [`ColumnSpec`].
//!
//! Data-quality problems (short rows, bad cells, duplicate headers) are
//! repaired locally and counted in [`DataQuality`]; nothing here returns an
//! error. An unusable document yields an empty table.

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::models::{RawDocument, TeamRecord};
use crate::services::team_table::TeamTable;
use crate::utils::{parse_metric, parse_rank, split_record, METRIC_DEFAULT, UNRANKED};

/// Minimum data-row width of the historical positional layout.
pub const FIXED_MIN_COLUMNS: usize = 44;

const UNKNOWN_CONFERENCE: &str = "Unknown";
const EMPTY_RECORD: &str = "0-0";

/// A typed slot in [`TeamRecord`] that a column can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Rank,
    Team,
    Conference,
    Record,
    AdjOffense,
    OffenseRank,
    AdjDefense,
    DefenseRank,
    Barthag,
    StrengthOfSchedule,
    NonConferenceSos,
    WinsAboveBubble,
    EffectiveFgOffense,
    EffectiveFgDefense,
    TurnoverRateOffense,
    TurnoverRateDefense,
    OffReboundRate,
    OppOffReboundRate,
    DefReboundRate,
    FreeThrowRateOffense,
    FreeThrowRateDefense,
    AdjTempo,
}

/// How a cell bound to a field is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Text,
    /// Real number, `0.0` on failure.
    Real,
    /// Real number, absent on failure.
    OptionalReal,
    /// Positive integer, [`UNRANKED`] on failure.
    Rank,
}

impl Field {
    pub fn kind(self) -> CellKind {
        match self {
            Field::Team | Field::Conference | Field::Record => CellKind::Text,
            Field::Rank | Field::OffenseRank | Field::DefenseRank => CellKind::Rank,
            Field::AdjOffense
            | Field::AdjDefense
            | Field::Barthag
            | Field::StrengthOfSchedule
            | Field::NonConferenceSos
            | Field::WinsAboveBubble => CellKind::Real,
            _ => CellKind::OptionalReal,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Rank => "rank",
            Field::Team => "team",
            Field::Conference => "conf",
            Field::Record => "record",
            Field::AdjOffense => "adjoe",
            Field::OffenseRank => "oe_rank",
            Field::AdjDefense => "adjde",
            Field::DefenseRank => "de_rank",
            Field::Barthag => "barthag",
            Field::StrengthOfSchedule => "sos",
            Field::NonConferenceSos => "ncsos",
            Field::WinsAboveBubble => "wab",
            Field::EffectiveFgOffense => "efg_o",
            Field::EffectiveFgDefense => "efg_d",
            Field::TurnoverRateOffense => "tov_o",
            Field::TurnoverRateDefense => "tov_d",
            Field::OffReboundRate => "or_o",
            Field::OppOffReboundRate => "or_d",
            Field::DefReboundRate => "dr_d",
            Field::FreeThrowRateOffense => "ftr_o",
            Field::FreeThrowRateDefense => "ftr_d",
            Field::AdjTempo => "adjt",
        }
    }
}

/// Caller-facing choice of parsing strategy for a season.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    #[default]
    Auto,
    HeaderDriven,
    FixedPosition,
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ParseMode::Auto),
            "header" | "header-driven" | "header_driven" => Ok(ParseMode::HeaderDriven),
            "fixed" | "fixed-position" | "fixed_position" => Ok(ParseMode::FixedPosition),
            other => Err(format!("unknown parse mode '{}'", other)),
        }
    }
}

/// The strategy that actually produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    HeaderDriven,
    FixedPosition,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::HeaderDriven => f.write_str("header-driven"),
            Layout::FixedPosition => f.write_str("fixed-position"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderColumn {
    pub field: Field,
    /// Lowercase header names accepted for this field, in preference order.
    pub aliases: &'static [&'static str],
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionColumn {
    pub field: Field,
    pub index: usize,
    pub required: bool,
}

/// Versioned description of the columns a season's feed is expected to carry.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSpec {
    HeaderDriven {
        columns: Vec<HeaderColumn>,
    },
    FixedPosition {
        min_columns: usize,
        columns: Vec<PositionColumn>,
    },
}

impl ColumnSpec {
    pub const VERSION: u32 = 1;

    pub fn header_driven() -> Self {
        let column = |field: Field, aliases: &'static [&'static str], required: bool| HeaderColumn {
            field,
            aliases,
            required,
        };
        ColumnSpec::HeaderDriven {
            columns: vec![
                column(Field::Rank, &["rank"], false),
                column(Field::Team, &["team"], true),
                column(Field::Conference, &["conf", "conference"], false),
                column(Field::Record, &["record"], true),
                column(Field::AdjOffense, &["adjoe", "adj oe", "adj_oe"], true),
                column(Field::OffenseRank, &["oe rank", "oe_rank"], false),
                column(Field::AdjDefense, &["adjde", "adj de", "adj_de"], true),
                column(Field::DefenseRank, &["de rank", "de_rank"], false),
                column(Field::Barthag, &["barthag"], true),
                column(Field::StrengthOfSchedule, &["sos"], false),
                column(Field::NonConferenceSos, &["ncsos", "nc sos", "non-con sos"], false),
                column(Field::WinsAboveBubble, &["wab"], false),
                column(Field::EffectiveFgOffense, &["efg_o", "efg%"], false),
                column(Field::EffectiveFgDefense, &["efg_d", "efgd%"], false),
                column(Field::TurnoverRateOffense, &["tov_o", "tor"], false),
                column(Field::TurnoverRateDefense, &["tov_d", "tord"], false),
                column(Field::OffReboundRate, &["or_o", "orb"], false),
                column(Field::OppOffReboundRate, &["or_d"], false),
                column(Field::DefReboundRate, &["dr_d", "def_reb"], false),
                column(Field::FreeThrowRateOffense, &["ftr_o", "ftr"], false),
                column(Field::FreeThrowRateDefense, &["ftr_d", "ftrd"], false),
                column(Field::AdjTempo, &["adjt", "adjte", "adj t.", "adj_t"], false),
            ],
        }
    }

    /// The historical `team_results.csv` layout, addressed by index.
    pub fn fixed_position() -> Self {
        let column = |field: Field, index: usize, required: bool| PositionColumn { field, index, required };
        ColumnSpec::FixedPosition {
            min_columns: FIXED_MIN_COLUMNS,
            columns: vec![
                column(Field::Rank, 0, true),
                column(Field::Team, 1, true),
                column(Field::Conference, 2, true),
                column(Field::Record, 3, true),
                column(Field::AdjOffense, 4, true),
                column(Field::OffenseRank, 5, true),
                column(Field::AdjDefense, 6, true),
                column(Field::DefenseRank, 7, true),
                column(Field::Barthag, 8, true),
                column(Field::StrengthOfSchedule, 15, true),
                column(Field::NonConferenceSos, 16, true),
                column(Field::WinsAboveBubble, 41, true),
            ],
        }
    }

    pub fn layout(&self) -> Layout {
        match self {
            ColumnSpec::HeaderDriven { .. } => Layout::HeaderDriven,
            ColumnSpec::FixedPosition { .. } => Layout::FixedPosition,
        }
    }
}

/// What normalization had to repair or discard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub layout: Option<Layout>,
    pub rows_seen: usize,
    pub rows_admitted: usize,
    pub short_rows: usize,
    pub unnamed_rows: usize,
    pub unreadable_rows: usize,
    pub coerced_cells: usize,
    /// `(original, repaired)` pairs for duplicated header names.
    pub renamed_headers: Vec<(String, String)>,
    pub unresolved_columns: Vec<String>,
}

impl DataQuality {
    pub fn has_issues(&self) -> bool {
        self.short_rows > 0
            || self.unnamed_rows > 0
            || self.unreadable_rows > 0
            || self.coerced_cells > 0
            || !self.unresolved_columns.is_empty()
    }
}

/// Normalize a document with a caller-selected or auto-detected strategy.
pub fn normalize(raw: &RawDocument, mode: ParseMode) -> TeamTable {
    let Some(sheet) = Sheet::parse(&raw.text) else {
        tracing::warn!("Season {} document has no header line; no data available", raw.season);
        return TeamTable::empty(raw.season);
    };

    let spec = match mode {
        ParseMode::HeaderDriven => ColumnSpec::header_driven(),
        ParseMode::FixedPosition => ColumnSpec::fixed_position(),
        ParseMode::Auto => detect_spec(&sheet),
    };

    normalize_sheet(raw, sheet, &spec)
}

/// Normalize a document against an explicit column contract.
pub fn normalize_with(raw: &RawDocument, spec: &ColumnSpec) -> TeamTable {
    match Sheet::parse(&raw.text) {
        Some(sheet) => normalize_sheet(raw, sheet, spec),
        None => {
            tracing::warn!("Season {} document has no header line; no data available", raw.season);
            TeamTable::empty(raw.season)
        }
    }
}

/// Rename second and later occurrences of a header name to `name_1`,
/// `name_2`, ... so every column has a distinct name.
///
/// Names compare case-insensitively after trimming. A suffix that would
/// collide with another header is skipped. Blank names become `col_<index>`.
pub fn repair_headers<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let originals: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let trimmed = name.as_ref().trim();
            if trimmed.is_empty() {
                format!("col_{}", i)
            } else {
                trimmed.to_string()
            }
        })
        .collect();

    let mut taken: HashSet<String> = originals.iter().map(|n| n.to_lowercase()).collect();
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut repaired = Vec::with_capacity(originals.len());

    for name in originals {
        let key = name.to_lowercase();
        let count = occurrences.entry(key).or_insert(0);
        if *count == 0 {
            *count = 1;
            repaired.push(name);
            continue;
        }
        let candidate = loop {
            let candidate = format!("{}_{}", name, count);
            *count += 1;
            if taken.insert(candidate.to_lowercase()) {
                break candidate;
            }
        };
        repaired.push(candidate);
    }

    repaired
}

/// Header line plus data rows, after blank lines are skipped.
struct Sheet {
    raw_header: Vec<String>,
    header: Vec<String>,
    rows: Vec<StringRecord>,
    unreadable_rows: usize,
}

impl Sheet {
    fn parse(text: &str) -> Option<Sheet> {
        let mut builder = ReaderBuilder::new();
        builder.has_headers(false).flexible(true);

        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        let mut unreadable_rows = 0usize;

        // One reader per line: an unbalanced quote must not swallow later rows.
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let mut record = StringRecord::new();
            match builder.from_reader(line.as_bytes()).read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::debug!("Skipping unreadable row: {}", e);
                    unreadable_rows += 1;
                    continue;
                }
            }
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            if header.is_none() {
                header = Some(record.iter().map(str::to_string).collect());
            } else {
                rows.push(record);
            }
        }

        let raw_header = header?;
        let header = repair_headers(&raw_header[..]);
        Some(Sheet {
            raw_header,
            header,
            rows,
            unreadable_rows,
        })
    }

    fn renamed_headers(&self) -> Vec<(String, String)> {
        self.raw_header
            .iter()
            .zip(&self.header)
            .filter(|(original, repaired)| original.trim() != repaired.as_str())
            .filter(|(original, _)| !original.trim().is_empty())
            .map(|(original, repaired)| (original.trim().to_string(), repaired.clone()))
            .collect()
    }

    /// Most common data-row width; ties go to the wider row.
    fn modal_width(&self) -> Option<usize> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for row in &self.rows {
            *counts.entry(row.len()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(width, _)| width)
    }
}

/// Header-driven when every required column resolves and the data rows are as
/// wide as the header; fixed-position otherwise.
fn detect_spec(sheet: &Sheet) -> ColumnSpec {
    let header_spec = ColumnSpec::header_driven();
    let resolved = match &header_spec {
        ColumnSpec::HeaderDriven { columns } => bind_headers(&sheet.header, columns).is_ok(),
        ColumnSpec::FixedPosition { .. } => false,
    };
    let aligned = sheet
        .modal_width()
        .map_or(true, |width| width == sheet.header.len());

    if resolved && aligned {
        tracing::debug!("Auto-detected header-driven layout");
        header_spec
    } else {
        tracing::info!(
            "Header is not trustworthy (resolved: {}, aligned: {}); using fixed-position layout",
            resolved,
            aligned
        );
        ColumnSpec::fixed_position()
    }
}

struct Binding {
    columns: Vec<(Field, usize)>,
    min_width: usize,
    /// Header columns not bound to a field: `(index, repaired name)`.
    extras: Vec<(usize, String)>,
}

/// Resolve header aliases to column indices. Errors with the names of the
/// required fields that did not resolve.
fn bind_headers(header: &[String], columns: &[HeaderColumn]) -> Result<Binding, Vec<String>> {
    let lowered: Vec<String> = header.iter().map(|h| h.to_lowercase()).collect();
    let mut bound = Vec::new();
    let mut missing = Vec::new();
    let mut min_width = 0usize;

    for column in columns {
        let index = column
            .aliases
            .iter()
            .find_map(|alias| lowered.iter().position(|h| h == alias));
        match index {
            Some(index) => {
                if column.required {
                    min_width = min_width.max(index + 1);
                }
                bound.push((column.field, index));
            }
            None if column.required => missing.push(column.field.name().to_string()),
            None => {}
        }
    }

    if !missing.is_empty() {
        return Err(missing);
    }

    let used: HashSet<usize> = bound.iter().map(|(_, index)| *index).collect();
    let extras = header
        .iter()
        .enumerate()
        .filter(|(index, _)| !used.contains(index))
        .map(|(index, name)| (index, name.clone()))
        .collect();

    Ok(Binding {
        columns: bound,
        min_width,
        extras,
    })
}

fn bind_positions(min_columns: usize, columns: &[PositionColumn]) -> Binding {
    let required_width = columns
        .iter()
        .filter(|c| c.required)
        .map(|c| c.index + 1)
        .max()
        .unwrap_or(0);
    Binding {
        columns: columns.iter().map(|c| (c.field, c.index)).collect(),
        min_width: min_columns.max(required_width),
        extras: Vec::new(),
    }
}

fn normalize_sheet(raw: &RawDocument, sheet: Sheet, spec: &ColumnSpec) -> TeamTable {
    let season = raw.season;
    let layout = spec.layout();
    let mut quality = DataQuality {
        layout: Some(layout),
        rows_seen: sheet.rows.len(),
        unreadable_rows: sheet.unreadable_rows,
        renamed_headers: sheet.renamed_headers(),
        ..DataQuality::default()
    };

    for (original, repaired) in &quality.renamed_headers {
        tracing::info!("Season {}: duplicate header '{}' bound as '{}'", season, original, repaired);
    }

    let binding = match spec {
        ColumnSpec::HeaderDriven { columns } => match bind_headers(&sheet.header, columns) {
            Ok(binding) => binding,
            Err(missing) => {
                tracing::warn!(
                    "Season {}: required columns missing from header: {}",
                    season,
                    missing.join(", ")
                );
                quality.unresolved_columns = missing;
                return TeamTable::new(season, sheet.header, Vec::new(), quality, Some(raw.fetched_at));
            }
        },
        ColumnSpec::FixedPosition { min_columns, columns } => bind_positions(*min_columns, columns),
    };

    let mut teams = Vec::with_capacity(sheet.rows.len());
    for (line, row) in sheet.rows.iter().enumerate() {
        if row.len() < binding.min_width {
            tracing::debug!(
                "Season {}: dropping data row {} ({} columns, need {})",
                season,
                line + 1,
                row.len(),
                binding.min_width
            );
            quality.short_rows += 1;
            continue;
        }

        let mut reader = RowReader::new(row, &binding.columns);
        let Some(mut team) = reader.build() else {
            tracing::debug!("Season {}: dropping data row {} with no team name", season, line + 1);
            quality.unnamed_rows += 1;
            continue;
        };
        quality.coerced_cells += reader.coerced;

        for (index, name) in &binding.extras {
            if let Some(cell) = row.get(*index) {
                team.extra.insert(name.clone(), cell.trim().to_string());
            }
        }
        teams.push(team);
    }
    quality.rows_admitted = teams.len();

    if quality.has_issues() {
        tracing::warn!(
            "Season {} normalized ({}): {} of {} rows admitted, {} short, {} unnamed, {} unreadable, {} cells coerced",
            season,
            layout,
            quality.rows_admitted,
            quality.rows_seen,
            quality.short_rows,
            quality.unnamed_rows,
            quality.unreadable_rows,
            quality.coerced_cells
        );
    } else {
        tracing::info!("Season {} normalized ({}): {} teams", season, layout, quality.rows_admitted);
    }

    TeamTable::new(season, sheet.header, teams, quality, Some(raw.fetched_at))
}

/// Reads typed values out of one data row, counting every fallback.
struct RowReader<'a> {
    row: &'a StringRecord,
    columns: &'a [(Field, usize)],
    coerced: usize,
}

impl<'a> RowReader<'a> {
    fn new(row: &'a StringRecord, columns: &'a [(Field, usize)]) -> Self {
        Self { row, columns, coerced: 0 }
    }

    fn cell(&self, field: Field) -> Option<&'a str> {
        let row = self.row;
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, index)| row.get(*index))
    }

    fn text(&self, field: Field, default: &str) -> String {
        match self.cell(field).map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => default.to_string(),
        }
    }

    fn real(&mut self, field: Field) -> f64 {
        let Some(cell) = self.cell(field) else {
            return METRIC_DEFAULT;
        };
        parse_metric(cell).unwrap_or_else(|| self.fallback(field, cell, "0.0", METRIC_DEFAULT))
    }

    fn optional_real(&mut self, field: Field) -> Option<f64> {
        let cell = self.cell(field)?;
        let value = parse_metric(cell);
        if value.is_none() && !cell.trim().is_empty() {
            self.fallback(field, cell, "absent", ());
        }
        value
    }

    fn rank(&mut self, field: Field) -> u32 {
        let Some(cell) = self.cell(field) else {
            return UNRANKED;
        };
        parse_rank(cell).unwrap_or_else(|| self.fallback(field, cell, "unranked", UNRANKED))
    }

    fn fallback<T>(&mut self, field: Field, cell: &str, shown: &str, value: T) -> T {
        tracing::debug!("Coercing {} cell '{}' to {}", field.name(), cell.trim(), shown);
        self.coerced += 1;
        value
    }

    /// `None` when the row has no team name.
    fn build(&mut self) -> Option<TeamRecord> {
        let team = self.text(Field::Team, "");
        if team.is_empty() {
            return None;
        }

        let record = self.text(Field::Record, EMPTY_RECORD);
        let (wins, losses) = split_record(&record).unwrap_or((0, 0));

        let mut barthag = self.real(Field::Barthag);
        if !(0.0..=1.0).contains(&barthag) {
            barthag = self.fallback(Field::Barthag, &barthag.to_string(), "0.0", METRIC_DEFAULT);
        }

        let opp_off_rebound = self.optional_real(Field::OppOffReboundRate);
        let def_rebound_rate = self
            .optional_real(Field::DefReboundRate)
            .or_else(|| opp_off_rebound.map(|or_d| 100.0 - or_d));

        Some(TeamRecord {
            team,
            conference: self.text(Field::Conference, UNKNOWN_CONFERENCE),
            record,
            wins,
            losses,
            rank: self.rank(Field::Rank),
            offense_rank: self.rank(Field::OffenseRank),
            defense_rank: self.rank(Field::DefenseRank),
            adj_offensive_efficiency: self.real(Field::AdjOffense),
            adj_defensive_efficiency: self.real(Field::AdjDefense),
            barthag,
            strength_of_schedule: self.real(Field::StrengthOfSchedule),
            non_conference_sos: self.real(Field::NonConferenceSos),
            wins_above_bubble: self.real(Field::WinsAboveBubble),
            effective_fg_offense: self.optional_real(Field::EffectiveFgOffense),
            effective_fg_defense: self.optional_real(Field::EffectiveFgDefense),
            turnover_rate_offense: self.optional_real(Field::TurnoverRateOffense),
            turnover_rate_defense: self.optional_real(Field::TurnoverRateDefense),
            off_rebound_rate: self.optional_real(Field::OffReboundRate),
            def_rebound_rate,
            free_throw_rate_offense: self.optional_real(Field::FreeThrowRateOffense),
            free_throw_rate_defense: self.optional_real(Field::FreeThrowRateDefense),
            adj_tempo: self.optional_real(Field::AdjTempo),
            extra: BTreeMap::new(),
        })
    }
}
