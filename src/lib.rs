//! College basketball ratings feed: ingestion, normalization, comparison and
//! scouting, with an HTTP API and a CLI on top.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
