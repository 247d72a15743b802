// Game records as reported by the scoreboard source.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One side of a game. Picks are stored on-chain as `0` (away) / `1` (home),
/// so this serializes as that integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Side {
    Away,
    Home,
}

impl Side {
    /// Parse a stored pick value. Anything other than `0` or `1` is rejected.
    pub fn from_pick(value: u8) -> Option<Self> {
        match value {
            0 => Some(Side::Away),
            1 => Some(Side::Home),
            _ => None,
        }
    }

    /// The stored pick value for this side.
    pub fn as_pick(self) -> u8 {
        match self {
            Side::Away => 0,
            Side::Home => 1,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Side::from_pick(value).ok_or_else(|| format!("invalid pick value {value}, expected 0 or 1"))
    }
}

impl From<Side> for u8 {
    fn from(side: Side) -> u8 {
        side.as_pick()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Away => write!(f, "away"),
            Side::Home => write!(f, "home"),
        }
    }
}

// ---------------------------------------------------------------------------
// Status / season
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
}

/// Season segment, numbered the way the scoreboard API numbers `seasontype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonType {
    Preseason,
    Regular,
    Postseason,
}

impl SeasonType {
    pub fn api_code(self) -> u8 {
        match self {
            SeasonType::Preseason => 1,
            SeasonType::Regular => 2,
            SeasonType::Postseason => 3,
        }
    }

    pub fn from_api_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SeasonType::Preseason),
            2 => Some(SeasonType::Regular),
            3 => Some(SeasonType::Postseason),
            _ => None,
        }
    }
}

/// Identifies one scoring week: `(year, season type, week)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub year: u16,
    pub season_type: SeasonType,
    pub week: u8,
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.year,
            self.season_type.api_code(),
            self.week
        )
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A single sporting event within a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Canonical identifier; lexicographic order over these is oracle order.
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    /// Present once the game has started.
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    pub status: GameStatus,
}

impl Game {
    pub fn is_final(&self) -> bool {
        self.status == GameStatus::Final
    }

    /// The winning side of a finished game.
    ///
    /// Returns `None` while the game is not final, when a final game is
    /// missing a score, and on a tie.
    pub fn winner(&self) -> Option<Side> {
        if !self.is_final() {
            return None;
        }
        let (home, away) = (self.home_score?, self.away_score?);
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Some(Side::Home),
            std::cmp::Ordering::Less => Some(Side::Away),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Combined final score, used as the tiebreaker target. `None` until
    /// final, or if the reported scores overflow a `u32` sum.
    pub fn total_points(&self) -> Option<u32> {
        if !self.is_final() {
            return None;
        }
        self.home_score?.checked_add(self.away_score?)
    }
}

// ---------------------------------------------------------------------------
// WeekGames
// ---------------------------------------------------------------------------

/// Games of one week indexed by `game_id`.
#[derive(Debug, Clone, Default)]
pub struct WeekGames {
    games: HashMap<String, Game>,
}

impl WeekGames {
    /// Index a fetched schedule. A repeated `game_id` keeps the later record.
    pub fn new(games: Vec<Game>) -> Self {
        let mut map = HashMap::with_capacity(games.len());
        for game in games {
            if map.contains_key(&game.game_id) {
                warn!("duplicate game {} in schedule, using latest record", game.game_id);
            }
            map.insert(game.game_id.clone(), game);
        }
        Self { games: map }
    }

    pub fn get(&self, game_id: &str) -> Option<&Game> {
        self.games.get(game_id)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl FromIterator<Game> for WeekGames {
    fn from_iter<I: IntoIterator<Item = Game>>(iter: I) -> Self {
        WeekGames::new(iter.into_iter().collect())
    }
}
