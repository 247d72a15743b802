// Oracle order <-> display order.
//
// Picks are stored and scored in oracle order (ascending game id). Users see
// games in kickoff order. `PickAlignment` is the permutation between the two,
// rebuilt from the contest and the fetched schedule on every run.

use serde::{Deserialize, Serialize};

use crate::contest::Contest;
use crate::game::WeekGames;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickAlignment {
    /// `display_to_oracle[d]` is the oracle index of the d-th game on screen.
    display_to_oracle: Vec<usize>,
    /// Inverse permutation; `None` for contest games missing from the schedule.
    oracle_to_display: Vec<Option<usize>>,
}

impl PickAlignment {
    /// Build the alignment for `contest` against the fetched `games`.
    ///
    /// Games missing from the schedule are left out of the display order.
    /// Equal kickoffs fall back to oracle order.
    pub fn build(contest: &Contest, games: &WeekGames) -> Self {
        let mut scheduled: Vec<(usize, _)> = contest
            .game_ids()
            .iter()
            .enumerate()
            .filter_map(|(oracle_idx, id)| games.get(id).map(|g| (oracle_idx, g.kickoff)))
            .collect();
        // Stable sort keeps oracle order among equal kickoffs.
        scheduled.sort_by_key(|&(_, kickoff)| kickoff);

        let display_to_oracle: Vec<usize> = scheduled.into_iter().map(|(idx, _)| idx).collect();

        let mut oracle_to_display = vec![None; contest.len()];
        for (display_idx, &oracle_idx) in display_to_oracle.iter().enumerate() {
            oracle_to_display[oracle_idx] = Some(display_idx);
        }

        Self {
            display_to_oracle,
            oracle_to_display,
        }
    }

    /// Number of games shown.
    pub fn display_len(&self) -> usize {
        self.display_to_oracle.len()
    }

    pub fn oracle_index(&self, display_idx: usize) -> Option<usize> {
        self.display_to_oracle.get(display_idx).copied()
    }

    pub fn display_index(&self, oracle_idx: usize) -> Option<usize> {
        self.oracle_to_display.get(oracle_idx).copied().flatten()
    }

    /// Oracle indices in display order.
    pub fn display_order(&self) -> &[usize] {
        &self.display_to_oracle
    }

    /// Re-order an oracle-ordered slice into display order. Positions past the
    /// end of `values` are skipped.
    pub fn to_display<T: Clone>(&self, values: &[T]) -> Vec<T> {
        self.display_to_oracle
            .iter()
            .filter_map(|&idx| values.get(idx).cloned())
            .collect()
    }
}
