// Leaderboard ordering and rank assignment.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::alignment::PickAlignment;
use crate::contest::{Contest, Entry};
use crate::game::WeekGames;
use crate::scoring::{EntryScore, GameOutcome, PickMark, ScoreSheet};

/// How entries tied on both correct picks and tiebreaker distance are ranked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Every entry gets its own rank by sorted position (1, 2, 3).
    #[default]
    Sequential,
    /// Fully tied entries share a rank and the next rank is skipped (1, 1, 3).
    Shared,
}

/// Whether the leaderboard reflects partial results or the settled week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingPhase {
    Live,
    Final,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: u32,
    pub entry: Entry,
    pub score: EntryScore,
}

/// A ranked projection of one contest. Never persisted as the record of
/// outcome; recompute it from entries and game data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub phase: RankingPhase,
    pub total_games: u32,
    pub scored_games: u32,
    pub tiebreaker_game_id: String,
    pub tiebreaker_total: Option<u32>,
    /// Oracle order.
    pub games: Vec<GameOutcome>,
    /// Oracle indices in kickoff order, for presentation.
    pub display_order: Vec<usize>,
    pub entries: Vec<RankedEntry>,
}

impl Leaderboard {
    pub fn is_final(&self) -> bool {
        self.phase == RankingPhase::Final
    }

    /// Game outcomes in kickoff order.
    pub fn display_games(&self) -> Vec<&GameOutcome> {
        self.display_order
            .iter()
            .filter_map(|&idx| self.games.get(idx))
            .collect()
    }

    /// An entry's pick marks in kickoff order.
    pub fn display_marks(&self, ranked: &RankedEntry) -> Vec<PickMark> {
        self.display_order
            .iter()
            .filter_map(|&idx| ranked.score.marks.get(idx).copied())
            .collect()
    }

    pub fn entry(&self, entry_id: &str) -> Option<&RankedEntry> {
        self.entries.iter().find(|r| r.entry.entry_id == entry_id)
    }
}

/// Score and rank `entries` against the current schedule.
///
/// Sorted by correct picks descending, then tiebreaker distance ascending
/// once the tiebreaker game is final. Anything still tied keeps input order.
pub fn rank_entries(
    contest: &Contest,
    games: &WeekGames,
    entries: &[Entry],
    policy: TiePolicy,
) -> Leaderboard {
    let sheet = ScoreSheet::resolve(contest, games);
    let alignment = PickAlignment::build(contest, games);

    let mut scored: Vec<(&Entry, EntryScore)> =
        entries.iter().map(|e| (e, sheet.score(e))).collect();
    // `sort_by` is stable, which is what keeps unresolved ties in input order.
    scored.sort_by(|(_, a), (_, b)| compare_scores(a, b));

    let mut ranked: Vec<RankedEntry> = Vec::with_capacity(scored.len());
    for (position, (entry, score)) in scored.into_iter().enumerate() {
        let rank = match (policy, ranked.last()) {
            (TiePolicy::Shared, Some(prev)) if compare_scores(&prev.score, &score).is_eq() => {
                prev.rank
            }
            _ => position as u32 + 1,
        };
        ranked.push(RankedEntry {
            rank,
            entry: entry.clone(),
            score,
        });
    }

    Leaderboard {
        phase: if sheet.is_finalized() {
            RankingPhase::Final
        } else {
            RankingPhase::Live
        },
        total_games: sheet.total_games(),
        scored_games: sheet.scored_games(),
        tiebreaker_game_id: contest.tiebreaker_game_id().to_string(),
        tiebreaker_total: sheet.tiebreaker_total(),
        games: sheet.outcomes().to_vec(),
        display_order: alignment.display_order().to_vec(),
        entries: ranked,
    }
}

fn compare_scores(a: &EntryScore, b: &EntryScore) -> Ordering {
    b.correct_picks
        .cmp(&a.correct_picks)
        .then_with(|| match (a.tiebreaker_distance, b.tiebreaker_distance) {
            (Some(da), Some(db)) => da.cmp(&db),
            _ => Ordering::Equal,
        })
}
