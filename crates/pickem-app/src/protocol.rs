// WebSocket message types exchanged with leaderboard viewers.
//
// Every message is `{"type": "...", "payload": {...}}`; payload-less client
// requests may omit `payload`.

use chrono::{DateTime, Utc};
use pickem_core::contest::{Contest, ContestError, Entry};
use pickem_core::game::{SeasonType, WeekKey};
use pickem_core::ranking::{Leaderboard, TiePolicy};
use serde::{Deserialize, Serialize};

/// Requests from a connected viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Latest published leaderboard, without fetching.
    GetLeaderboard,
    /// Fetch fresh results and recompute before replying.
    Refresh,
    /// Rank an arbitrary contest and entry set against live results.
    Rank(RankRequest),
}

/// Self-contained ranking request: contest definition, entries and week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRequest {
    pub game_ids: Vec<String>,
    pub tiebreaker_game_id: String,
    pub entries: Vec<Entry>,
    pub year: u16,
    pub season_type: SeasonType,
    pub week: u8,
    #[serde(default)]
    pub ties: Option<TiePolicy>,
}

impl RankRequest {
    pub fn week_key(&self) -> WeekKey {
        WeekKey {
            year: self.year,
            season_type: self.season_type,
            week: self.week,
        }
    }

    /// Build the contest and check every entry against it.
    pub fn contest(&self) -> Result<Contest, ContestError> {
        let contest = Contest::new(self.game_ids.clone(), self.tiebreaker_game_id.clone())?;
        for entry in &self.entries {
            contest.validate_entry(entry)?;
        }
        Ok(contest)
    }
}

/// A computed leaderboard and its freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    /// True when the latest refresh failed and this is the last good result.
    pub stale: bool,
    pub computed_at: DateTime<Utc>,
    pub leaderboard: Leaderboard,
}

/// Replies and pushes to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Leaderboard(LeaderboardSnapshot),
    /// Results could not be fetched and nothing is cached.
    Unavailable { message: String },
    /// The request itself was bad.
    Error { message: String },
}
