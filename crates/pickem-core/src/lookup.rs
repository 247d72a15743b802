// Game result lookup: the one external input to ranking.

use async_trait::async_trait;
use thiserror::Error;

use crate::game::{Game, WeekKey};

/// Why a schedule could not be fetched. Any of these makes the current
/// ranking cycle unavailable; the caller retries by recomputing later.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode scoreboard: {0}")]
    Decode(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Source of per-week game records.
///
/// Implementations may return an empty list (nothing scheduled or known yet)
/// or a subset of the games a contest references; both are valid. Called
/// repeatedly while polling; implementations need not cache.
#[async_trait]
pub trait GameLookup: Send + Sync {
    async fn fetch_week_games(&self, week: WeekKey) -> Result<Vec<Game>, LookupError>;
}

