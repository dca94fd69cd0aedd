use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure reading the indicator feed.
///
/// Too little history is a distinct case from a value that exists but is
/// unusable, so callers can tell "not yet" apart from "zero".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("feed unavailable: {0}")]
    Unavailable(String),
}
