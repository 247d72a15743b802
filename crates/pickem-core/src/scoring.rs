// Per-entry scoring against finished games.
//
// Only final games are scored. A tied final counts toward the scored total
// but has no winner, so no pick on it can be correct.

use serde::{Deserialize, Serialize};

use crate::contest::{Contest, Entry};
use crate::game::{Side, WeekGames};

/// Result of one contest game as far as it is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub game_id: String,
    /// Winning side; `None` until final, and for a tied final.
    pub winner: Option<Side>,
    pub completed: bool,
}

/// How a single pick stands right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickMark {
    Correct,
    Incorrect,
    /// Final game ended level.
    Push,
    /// Not final yet, or missing from the schedule.
    Pending,
}

/// Score of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryScore {
    pub correct_picks: u32,
    /// Contest games final at scoring time.
    pub scored_games: u32,
    /// `|guess - actual total|`, once the tiebreaker game is final.
    pub tiebreaker_distance: Option<u32>,
    /// One mark per contest game, oracle order.
    pub marks: Vec<PickMark>,
}

/// Contest-wide outcomes resolved from one schedule fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSheet {
    outcomes: Vec<GameOutcome>,
    scored_games: u32,
    tiebreaker_total: Option<u32>,
    finalized: bool,
}

impl ScoreSheet {
    /// Resolve every contest game against the fetched schedule. Games absent
    /// from `games` stay pending.
    pub fn resolve(contest: &Contest, games: &WeekGames) -> Self {
        let outcomes: Vec<GameOutcome> = contest
            .game_ids()
            .iter()
            .map(|id| match games.get(id) {
                Some(game) => GameOutcome {
                    game_id: id.clone(),
                    winner: game.winner(),
                    completed: game.is_final(),
                },
                None => GameOutcome {
                    game_id: id.clone(),
                    winner: None,
                    completed: false,
                },
            })
            .collect();

        let scored_games = outcomes.iter().filter(|o| o.completed).count() as u32;
        let tiebreaker_total = games
            .get(contest.tiebreaker_game_id())
            .and_then(|g| g.total_points());

        Self {
            finalized: contest.games_finalized(games),
            outcomes,
            scored_games,
            tiebreaker_total,
        }
    }

    /// Outcomes in oracle order.
    pub fn outcomes(&self) -> &[GameOutcome] {
        &self.outcomes
    }

    pub fn scored_games(&self) -> u32 {
        self.scored_games
    }

    pub fn total_games(&self) -> u32 {
        self.outcomes.len() as u32
    }

    /// Actual combined score of the tiebreaker game, once final.
    pub fn tiebreaker_total(&self) -> Option<u32> {
        self.tiebreaker_total
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn score(&self, entry: &Entry) -> EntryScore {
        let marks: Vec<PickMark> = self
            .outcomes
            .iter()
            .enumerate()
            .map(|(idx, outcome)| {
                if !outcome.completed {
                    return PickMark::Pending;
                }
                match (outcome.winner, entry.picks.get(idx)) {
                    (None, _) => PickMark::Push,
                    (Some(winner), Some(&pick)) if pick == winner => PickMark::Correct,
                    (Some(_), _) => PickMark::Incorrect,
                }
            })
            .collect();

        let correct_picks = marks.iter().filter(|m| **m == PickMark::Correct).count() as u32;

        EntryScore {
            correct_picks,
            scored_games: self.scored_games,
            tiebreaker_distance: self
                .tiebreaker_total
                .map(|total| entry.tiebreaker_points.abs_diff(total)),
            marks,
        }
    }
}
