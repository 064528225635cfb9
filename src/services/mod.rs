pub mod comparison;
pub mod normalizer;
pub mod scouting;
pub mod source;
pub mod store;
pub mod team_table;

#[cfg(test)]
pub mod fixtures;

pub use comparison::*;
pub use normalizer::{normalize, normalize_with, ColumnSpec, DataQuality, Layout, ParseMode};
pub use scouting::{classify, Thresholds};
pub use source::{FeedSource, FileSource, HttpSource, RawSource, StaticSource};
pub use store::{ParsePolicy, SeasonStore, Snapshot};
pub use team_table::TeamTable;
