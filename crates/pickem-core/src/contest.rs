// Contest definition and participant entries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::{Side, WeekGames};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContestError {
    #[error("contest has no games")]
    NoGames,

    #[error("game {0} appears more than once in the contest")]
    DuplicateGame(String),

    #[error("tiebreaker game {0} is not one of the contest games")]
    TiebreakerNotInContest(String),

    #[error("entry {entry_id} has {actual} picks, contest has {expected} games")]
    PickCountMismatch {
        entry_id: String,
        expected: usize,
        actual: usize,
    },
}

// ---------------------------------------------------------------------------
// Contest
// ---------------------------------------------------------------------------

/// A set of games scored together as one round.
///
/// `game_ids` is held in oracle order (ascending lexicographic), which is the
/// order picks are stored and scored in. It is fixed when the contest is
/// built and never derived from kickoff times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contest {
    game_ids: Vec<String>,
    tiebreaker_game_id: String,
}

impl Contest {
    pub fn new(
        mut game_ids: Vec<String>,
        tiebreaker_game_id: impl Into<String>,
    ) -> Result<Self, ContestError> {
        let tiebreaker_game_id = tiebreaker_game_id.into();
        if game_ids.is_empty() {
            return Err(ContestError::NoGames);
        }

        let mut seen = HashSet::with_capacity(game_ids.len());
        for id in &game_ids {
            if !seen.insert(id.as_str()) {
                return Err(ContestError::DuplicateGame(id.clone()));
            }
        }
        if !seen.contains(tiebreaker_game_id.as_str()) {
            return Err(ContestError::TiebreakerNotInContest(tiebreaker_game_id));
        }

        game_ids.sort();
        Ok(Self {
            game_ids,
            tiebreaker_game_id,
        })
    }

    /// Game ids in oracle order.
    pub fn game_ids(&self) -> &[String] {
        &self.game_ids
    }

    pub fn tiebreaker_game_id(&self) -> &str {
        &self.tiebreaker_game_id
    }

    /// Number of games in the contest.
    pub fn len(&self) -> usize {
        self.game_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.game_ids.is_empty()
    }

    pub fn oracle_index(&self, game_id: &str) -> Option<usize> {
        self.game_ids
            .binary_search_by(|id| id.as_str().cmp(game_id))
            .ok()
    }

    /// True once every contest game is final in `games`. A game missing from
    /// the schedule keeps the contest open.
    pub fn games_finalized(&self, games: &WeekGames) -> bool {
        self.game_ids
            .iter()
            .all(|id| games.get(id).is_some_and(|g| g.is_final()))
    }

    /// Check that an entry carries exactly one pick per contest game.
    pub fn validate_entry(&self, entry: &Entry) -> Result<(), ContestError> {
        if entry.picks.len() != self.game_ids.len() {
            return Err(ContestError::PickCountMismatch {
                entry_id: entry.entry_id.clone(),
                expected: self.game_ids.len(),
                actual: entry.picks.len(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One participant submission. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: String,
    pub owner: String,
    /// One pick per contest game, in oracle order.
    pub picks: Vec<Side>,
    pub tiebreaker_points: u32,
    /// Correct-pick count as last stored upstream. Informational only;
    /// ranking always recomputes from `picks`.
    #[serde(default)]
    pub correct_picks: Option<u32>,
}
