// Leaderboard service: fetch, rank, publish, and fall back to the last good
// result when the scoreboard is unreachable.
//
// Each refresh is a full recomputation from entries and freshly fetched
// games, so retrying is just refreshing again.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use pickem_core::contest::{Contest, Entry};
use pickem_core::game::{WeekGames, WeekKey};
use pickem_core::lookup::{GameLookup, LookupError};
use pickem_core::ranking::{rank_entries, TiePolicy};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::entries;
use crate::protocol::{ClientMessage, LeaderboardSnapshot, RankRequest, ServerMessage};

/// Answers viewer requests. Implemented by [`LeaderboardService`]; the
/// WebSocket layer only depends on this.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, msg: ClientMessage) -> ServerMessage;
}

// ---------------------------------------------------------------------------
// Entry loading
// ---------------------------------------------------------------------------

/// Import `csv_path` into the database, then return every stored entry that
/// fits `contest`.
///
/// A failed import only warns, so earlier imports still serve. Stored rows
/// from before a change to the contest's games are dropped with a warning.
/// Errors if no entry survives.
pub fn load_contest_entries(
    db: &Database,
    contest_id: &str,
    contest: &Contest,
    csv_path: &Path,
) -> anyhow::Result<Vec<Entry>> {
    match entries::load_entries(csv_path, contest) {
        Ok(imported) => {
            db.upsert_entries(contest_id, &imported)
                .context("failed to store imported entries")?;
            info!("Imported {} entries from {}", imported.len(), csv_path.display());
        }
        Err(e) => warn!("Entry import skipped: {}", e),
    }

    let stored = db
        .load_entries(contest_id)
        .context("failed to load entries")?;
    let valid: Vec<Entry> = stored
        .into_iter()
        .filter(|entry| match contest.validate_entry(entry) {
            Ok(()) => true,
            Err(e) => {
                warn!("ignoring stored entry: {}", e);
                false
            }
        })
        .collect();

    if valid.is_empty() {
        anyhow::bail!("contest {contest_id} has no valid entries");
    }
    Ok(valid)
}

// ---------------------------------------------------------------------------
// LeaderboardService
// ---------------------------------------------------------------------------

pub struct LeaderboardService {
    contest_id: String,
    contest: Contest,
    week: WeekKey,
    entries: Vec<Entry>,
    tie_policy: TiePolicy,
    lookup: Arc<dyn GameLookup>,
    db: Database,
    latest: watch::Sender<Option<LeaderboardSnapshot>>,
    /// Refreshes are numbered when their fetch starts; a result only
    /// replaces one from an earlier-started refresh.
    next_refresh: AtomicU64,
    published_refresh: AtomicU64,
}

impl LeaderboardService {
    /// Create the service, seeding the published leaderboard from the last
    /// saved one (marked stale) if there is one.
    pub fn new(
        contest_id: impl Into<String>,
        contest: Contest,
        week: WeekKey,
        entries: Vec<Entry>,
        tie_policy: TiePolicy,
        lookup: Arc<dyn GameLookup>,
        db: Database,
    ) -> Self {
        let contest_id = contest_id.into();
        let cached = match db.load_leaderboard(&contest_id) {
            Ok(Some((computed_at, leaderboard))) => {
                info!("Loaded cached leaderboard for {} from {}", contest_id, computed_at);
                Some(LeaderboardSnapshot {
                    stale: true,
                    computed_at,
                    leaderboard,
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring unreadable cached leaderboard: {:#}", e);
                None
            }
        };
        let (latest, _) = watch::channel(cached);

        Self {
            contest_id,
            contest,
            week,
            entries,
            tie_policy,
            lookup,
            db,
            latest,
            next_refresh: AtomicU64::new(1),
            published_refresh: AtomicU64::new(0),
        }
    }

    pub fn contest_id(&self) -> &str {
        &self.contest_id
    }

    /// Receive every newly published leaderboard.
    pub fn subscribe(&self) -> watch::Receiver<Option<LeaderboardSnapshot>> {
        self.latest.subscribe()
    }

    pub fn latest(&self) -> Option<LeaderboardSnapshot> {
        self.latest.borrow().clone()
    }

    /// Fetch the week's games, rank all entries and publish the result.
    ///
    /// On lookup failure the published leaderboard (if any) is flagged stale
    /// and the error is returned. When refreshes overlap, a result never
    /// replaces one from a refresh that started later; the newer board is
    /// returned instead.
    pub async fn refresh(&self) -> Result<LeaderboardSnapshot, LookupError> {
        let seq = self.next_refresh.fetch_add(1, Ordering::SeqCst);
        let games = match self.lookup.fetch_week_games(self.week).await {
            Ok(games) => WeekGames::new(games),
            Err(e) => {
                warn!("Scoreboard fetch for {} failed: {}", self.week, e);
                self.latest.send_if_modified(|current| {
                    if self.published_refresh.load(Ordering::SeqCst) > seq {
                        return false;
                    }
                    match current {
                        Some(snapshot) if !snapshot.stale => {
                            snapshot.stale = true;
                            true
                        }
                        _ => false,
                    }
                });
                return Err(e);
            }
        };

        let leaderboard = rank_entries(&self.contest, &games, &self.entries, self.tie_policy);
        let snapshot = LeaderboardSnapshot {
            stale: false,
            computed_at: Utc::now(),
            leaderboard,
        };
        debug!(
            contest = %self.contest_id,
            scored = snapshot.leaderboard.scored_games,
            total = snapshot.leaderboard.total_games,
            "leaderboard recomputed"
        );

        // The watch lock serializes the sequence check, the cache write and
        // the publish, so the cached board is always the published one.
        let published = self.latest.send_if_modified(|current| {
            if self.published_refresh.load(Ordering::SeqCst) > seq {
                return false;
            }
            self.published_refresh.store(seq, Ordering::SeqCst);
            if let Err(e) = self.db.save_leaderboard(
                &self.contest_id,
                snapshot.computed_at,
                &snapshot.leaderboard,
            ) {
                warn!("Failed to cache leaderboard: {:#}", e);
            }
            *current = Some(snapshot.clone());
            true
        });
        if !published {
            debug!("refresh {} superseded by a later one", seq);
            return Ok(self.latest().unwrap_or(snapshot));
        }
        Ok(snapshot)
    }

    /// Refresh, falling back to the last known leaderboard on failure.
    pub async fn refresh_or_stale(&self) -> ServerMessage {
        match self.refresh().await {
            Ok(snapshot) => ServerMessage::Leaderboard(snapshot),
            Err(e) => self.latest_or_unavailable(&e.to_string()),
        }
    }

    fn latest_or_unavailable(&self, message: &str) -> ServerMessage {
        match self.latest() {
            Some(snapshot) => ServerMessage::Leaderboard(snapshot),
            None => ServerMessage::Unavailable {
                message: message.to_string(),
            },
        }
    }

    /// Rank a caller-supplied contest. Nothing is cached or published.
    pub async fn rank(&self, req: RankRequest) -> ServerMessage {
        let contest = match req.contest() {
            Ok(contest) => contest,
            Err(e) => {
                return ServerMessage::Error {
                    message: e.to_string(),
                }
            }
        };

        match self.lookup.fetch_week_games(req.week_key()).await {
            Ok(games) => {
                let games = WeekGames::new(games);
                let policy = req.ties.unwrap_or(self.tie_policy);
                ServerMessage::Leaderboard(LeaderboardSnapshot {
                    stale: false,
                    computed_at: Utc::now(),
                    leaderboard: rank_entries(&contest, &games, &req.entries, policy),
                })
            }
            Err(e) => ServerMessage::Unavailable {
                message: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl RequestHandler for LeaderboardService {
    async fn handle(&self, msg: ClientMessage) -> ServerMessage {
        match msg {
            ClientMessage::GetLeaderboard => {
                self.latest_or_unavailable("leaderboard not computed yet")
            }
            ClientMessage::Refresh => self.refresh_or_stale().await,
            ClientMessage::Rank(req) => self.rank(req).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Refresh on a fixed interval until `shutdown` flips to true or its sender
/// is dropped. The first refresh happens immediately.
pub async fn run_poller(
    service: Arc<LeaderboardService>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "Polling {} every {}s for contest {}",
        service.week,
        interval.as_secs(),
        service.contest_id
    );
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.refresh().await {
                    Ok(snapshot) if snapshot.leaderboard.is_final() => {
                        debug!("contest {} is final", service.contest_id);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Leaderboard unavailable this cycle: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Poller shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use chrono::TimeZone;
    use pickem_core::game::{Game, GameStatus, SeasonType, Side};

    const WEEK: WeekKey = WeekKey {
        year: 2024,
        season_type: SeasonType::Regular,
        week: 5,
    };

    /// Serves a fixed schedule until switched off.
    struct ToggleLookup {
        up: AtomicBool,
        calls: AtomicUsize,
        games: Vec<Game>,
    }

    #[async_trait]
    impl GameLookup for ToggleLookup {
        async fn fetch_week_games(&self, _week: WeekKey) -> Result<Vec<Game>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.up.load(Ordering::SeqCst) {
                Ok(self.games.clone())
            } else {
                Err(LookupError::Status {
                    url: "http://scoreboard.test".into(),
                    status: 503,
                })
            }
        }
    }

    /// First fetch blocks until released and sees only game "a" final;
    /// every later fetch sees the whole week final.
    struct GatedLookup {
        calls: AtomicUsize,
        gate: Notify,
    }

    #[async_trait]
    impl GameLookup for GatedLookup {
        async fn fetch_week_games(&self, _week: WeekKey) -> Result<Vec<Game>, LookupError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
                let mut in_progress = final_game("b", 3, 17);
                in_progress.status = GameStatus::InProgress;
                return Ok(vec![final_game("a", 20, 10), in_progress]);
            }
            Ok(vec![final_game("a", 20, 10), final_game("b", 3, 17)])
        }
    }

    fn final_game(id: &str, home: u32, away: u32) -> Game {
        Game {
            game_id: id.into(),
            home_team: "H".into(),
            away_team: "A".into(),
            kickoff: Utc.with_ymd_and_hms(2024, 10, 6, 17, 0, 0).unwrap(),
            home_score: Some(home),
            away_score: Some(away),
            status: GameStatus::Final,
        }
    }

    fn service(up: bool, db: Database) -> (Arc<ToggleLookup>, LeaderboardService) {
        let lookup = Arc::new(ToggleLookup {
            up: AtomicBool::new(up),
            calls: AtomicUsize::new(0),
            games: vec![final_game("a", 20, 10), final_game("b", 3, 17)],
        });
        let svc = service_with(lookup.clone(), db);
        (lookup, svc)
    }

    fn service_with(lookup: Arc<dyn GameLookup>, db: Database) -> LeaderboardService {
        let contest = Contest::new(vec!["a".into(), "b".into()], "b").unwrap();
        let entries = vec![
            Entry {
                entry_id: "1".into(),
                owner: "0x1".into(),
                picks: vec![Side::Away, Side::Away],
                tiebreaker_points: 20,
                correct_picks: None,
            },
            Entry {
                entry_id: "2".into(),
                owner: "0x2".into(),
                picks: vec![Side::Home, Side::Away],
                tiebreaker_points: 30,
                correct_picks: None,
            },
        ];
        LeaderboardService::new(
            "c1",
            contest,
            WEEK,
            entries,
            TiePolicy::Sequential,
            lookup,
            db,
        )
    }

    #[tokio::test]
    async fn refresh_publishes_and_caches() {
        let (_, svc) = service(true, Database::open(":memory:").unwrap());
        let mut rx = svc.subscribe();

        let snapshot = svc.refresh().await.unwrap();
        assert!(!snapshot.stale);
        assert_eq!(snapshot.leaderboard.entries[0].entry.entry_id, "2");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&snapshot));
        assert!(svc.db.load_leaderboard("c1").unwrap().is_some());
    }

    #[tokio::test]
    async fn failure_marks_published_board_stale() {
        let (lookup, svc) = service(true, Database::open(":memory:").unwrap());
        svc.refresh().await.unwrap();

        lookup.up.store(false, Ordering::SeqCst);
        match svc.refresh_or_stale().await {
            ServerMessage::Leaderboard(snapshot) => assert!(snapshot.stale),
            other => panic!("expected stale leaderboard, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_without_history_is_unavailable() {
        let (_, svc) = service(false, Database::open(":memory:").unwrap());
        assert!(matches!(
            svc.refresh_or_stale().await,
            ServerMessage::Unavailable { .. }
        ));
        assert!(matches!(
            svc.handle(ClientMessage::GetLeaderboard).await,
            ServerMessage::Unavailable { .. }
        ));
    }

    #[tokio::test]
    async fn rank_request_with_bad_contest_is_error() {
        let (_, svc) = service(true, Database::open(":memory:").unwrap());
        let req = RankRequest {
            game_ids: vec!["a".into()],
            tiebreaker_game_id: "zzz".into(),
            entries: vec![],
            year: 2024,
            season_type: SeasonType::Regular,
            week: 5,
            ties: None,
        };
        assert!(matches!(
            svc.handle(ClientMessage::Rank(req)).await,
            ServerMessage::Error { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn poller_refreshes_until_shutdown() {
        let (_, svc) = service(true, Database::open(":memory:").unwrap());
        let svc = Arc::new(svc);
        let mut rx = svc.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_poller(svc.clone(), Duration::from_secs(30), shutdown_rx));

        rx.changed().await.unwrap();
        assert!(svc.latest().is_some());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn poller_fetches_once_per_interval() {
        let (lookup, svc) = service(true, Database::open(":memory:").unwrap());
        let svc = Arc::new(svc);
        let mut rx = svc.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_poller(svc.clone(), Duration::from_secs(30), shutdown_rx));

        rx.changed().await.unwrap();
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn slow_refresh_does_not_overwrite_newer_board() {
        let lookup = Arc::new(GatedLookup {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
        });
        let svc = Arc::new(service_with(lookup.clone(), Database::open(":memory:").unwrap()));

        let slow = tokio::spawn({
            let svc = svc.clone();
            async move { svc.refresh().await }
        });
        while lookup.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let fresh = svc.refresh().await.unwrap();
        assert!(fresh.leaderboard.is_final());

        lookup.gate.notify_one();
        let late = slow.await.unwrap().unwrap();

        assert_eq!(late, fresh);
        assert_eq!(svc.latest(), Some(fresh.clone()));
        let (_, cached) = svc.db.load_leaderboard("c1").unwrap().unwrap();
        assert!(cached.is_final());
    }
}
