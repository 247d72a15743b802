// End-to-end scoring scenarios through the public API: a fake lookup feeds
// `rank_entries` the way the service does on each poll.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use pickem_core::contest::{Contest, Entry};
use pickem_core::game::{Game, GameStatus, SeasonType, Side, WeekGames, WeekKey};
use pickem_core::lookup::{GameLookup, LookupError};
use pickem_core::ranking::{rank_entries, RankingPhase, TiePolicy};
use pickem_core::scoring::PickMark;

// ===========================================================================
// Helpers
// ===========================================================================

const WEEK: WeekKey = WeekKey {
    year: 2024,
    season_type: SeasonType::Regular,
    week: 5,
};

/// Lookup that replays a queue of schedules, one per call.
struct ReplayLookup {
    frames: Mutex<Vec<Vec<Game>>>,
}

impl ReplayLookup {
    fn new(mut frames: Vec<Vec<Game>>) -> Self {
        frames.reverse();
        Self {
            frames: Mutex::new(frames),
        }
    }
}

#[async_trait]
impl GameLookup for ReplayLookup {
    async fn fetch_week_games(&self, _week: WeekKey) -> Result<Vec<Game>, LookupError> {
        self.frames
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| LookupError::Decode("no more frames".into()))
    }
}

fn game(id: &str, hour: u32, score: Option<(u32, u32)>, status: GameStatus) -> Game {
    Game {
        game_id: id.into(),
        home_team: format!("{id} home"),
        away_team: format!("{id} away"),
        kickoff: Utc.with_ymd_and_hms(2024, 10, 6, hour, 0, 0).unwrap(),
        home_score: score.map(|s| s.0),
        away_score: score.map(|s| s.1),
        status,
    }
}

fn entry(id: &str, picks: &[u8], tiebreaker: u32) -> Entry {
    Entry {
        entry_id: id.into(),
        owner: format!("0x{id}"),
        picks: picks.iter().map(|&p| Side::from_pick(p).unwrap()).collect(),
        tiebreaker_points: tiebreaker,
        correct_picks: None,
    }
}

fn contest() -> Contest {
    Contest::new(vec!["401C".into(), "401A".into(), "401B".into()], "401C").unwrap()
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn all_final_with_tied_game() {
    let games = WeekGames::new(vec![
        game("401A", 13, Some((21, 14)), GameStatus::Final),
        game("401B", 16, Some((10, 17)), GameStatus::Final),
        game("401C", 20, Some((7, 7)), GameStatus::Final),
    ]);
    let board = rank_entries(&contest(), &games, &[entry("1", &[1, 0, 1], 14)], TiePolicy::Sequential);

    let r = &board.entries[0];
    assert_eq!(r.score.correct_picks, 2);
    assert_eq!(r.score.scored_games, 3);
    assert_eq!(board.scored_games, board.total_games);
    assert_eq!(board.phase, RankingPhase::Final);
    assert_eq!(board.games[2].winner, None);
    assert!(board.games[2].completed);
    assert_eq!(r.score.tiebreaker_distance, Some(0));
}

#[test]
fn only_first_game_final() {
    let games = WeekGames::new(vec![
        game("401A", 13, Some((21, 14)), GameStatus::Final),
        game("401B", 16, Some((3, 0)), GameStatus::InProgress),
        game("401C", 20, None, GameStatus::Scheduled),
    ]);
    let entries = vec![entry("hit", &[1, 0, 1], 40), entry("miss", &[0, 0, 1], 40)];
    let board = rank_entries(&contest(), &games, &entries, TiePolicy::Sequential);

    assert_eq!(board.scored_games, 1);
    assert_eq!(board.phase, RankingPhase::Live);
    assert_eq!(board.entry("hit").unwrap().score.correct_picks, 1);
    assert_eq!(board.entry("miss").unwrap().score.correct_picks, 0);
    assert_eq!(board.entry("hit").unwrap().rank, 1);
}

#[tokio::test]
async fn polling_progresses_from_live_to_final() {
    let lookup = ReplayLookup::new(vec![
        vec![],
        vec![
            game("401A", 13, Some((21, 14)), GameStatus::Final),
            game("401B", 16, Some((7, 3)), GameStatus::InProgress),
            game("401C", 20, None, GameStatus::Scheduled),
        ],
        vec![
            game("401A", 13, Some((21, 14)), GameStatus::Final),
            game("401B", 16, Some((10, 17)), GameStatus::Final),
            game("401C", 20, Some((24, 20)), GameStatus::Final),
        ],
    ]);
    let entries = vec![
        entry("X", &[1, 0, 0], 45),
        entry("Y", &[1, 0, 0], 50),
        entry("Z", &[0, 1, 1], 44),
    ];
    let contest = contest();

    // Nothing known yet.
    let games = WeekGames::new(lookup.fetch_week_games(WEEK).await.unwrap());
    let board = rank_entries(&contest, &games, &entries, TiePolicy::Sequential);
    assert_eq!(board.scored_games, 0);
    assert!(board.display_order.is_empty());
    let order: Vec<&str> = board.entries.iter().map(|r| r.entry.entry_id.as_str()).collect();
    assert_eq!(order, vec!["X", "Y", "Z"]);

    // One game final.
    let games = WeekGames::new(lookup.fetch_week_games(WEEK).await.unwrap());
    let board = rank_entries(&contest, &games, &entries, TiePolicy::Sequential);
    assert_eq!(board.scored_games, 1);
    assert_eq!(board.entry("Z").unwrap().score.marks[0], PickMark::Incorrect);
    assert_eq!(board.entry("Z").unwrap().rank, 3);

    // Settled: X is 1 away from 44, Y is 6 away.
    let games = WeekGames::new(lookup.fetch_week_games(WEEK).await.unwrap());
    let board = rank_entries(&contest, &games, &entries, TiePolicy::Sequential);
    assert!(board.is_final());
    let ranks: Vec<(&str, u32)> = board
        .entries
        .iter()
        .map(|r| (r.entry.entry_id.as_str(), r.rank))
        .collect();
    assert_eq!(ranks, vec![("X", 1), ("Y", 2), ("Z", 3)]);

    // Exhausted source surfaces as an error, not an empty board.
    assert!(lookup.fetch_week_games(WEEK).await.is_err());
}

#[test]
fn leaderboard_serializes_picks_as_integers() {
    let games = WeekGames::new(vec![game("401A", 13, Some((21, 14)), GameStatus::Final)]);
    let board = rank_entries(&contest(), &games, &[entry("1", &[1, 0, 1], 30)], TiePolicy::Sequential);
    let json = serde_json::to_value(&board).unwrap();

    assert_eq!(json["phase"], "live");
    assert_eq!(json["entries"][0]["entry"]["picks"], serde_json::json!([1, 0, 1]));
    assert_eq!(json["games"][0]["winner"], 1);
    assert_eq!(json["entries"][0]["score"]["marks"][0], "correct");

    let back: pickem_core::ranking::Leaderboard = serde_json::from_value(json).unwrap();
    assert_eq!(back, board);
}
