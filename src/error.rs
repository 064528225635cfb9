use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Why a raw season document could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("source unreachable: {0}")]
    Unreachable(String),
    #[error("source answered with HTTP {0}")]
    Status(u16),
    #[error("source timed out after {0:?}")]
    Timeout(Duration),
    #[error("could not read source: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {name}")]
    Invalid { name: String, value: String },
}

impl ConfigError {
    pub fn invalid(name: impl Into<String>, value: impl Display) -> Self {
        ConfigError::Invalid {
            name: name.into(),
            value: value.to_string(),
        }
    }
}
