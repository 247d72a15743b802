// SQLite persistence for contest entries and last known leaderboards.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pickem_core::contest::Entry;
use pickem_core::game::Side;
use pickem_core::ranking::Leaderboard;
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed store. The leaderboard table is a cache for serving stale
/// results while the scoreboard is unreachable; it is never authoritative.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                contest_id        TEXT NOT NULL,
                entry_id          TEXT NOT NULL,
                owner             TEXT NOT NULL,
                picks             TEXT NOT NULL,
                tiebreaker_points INTEGER NOT NULL,
                correct_picks     INTEGER,
                imported_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (contest_id, entry_id)
            );

            CREATE TABLE IF NOT EXISTS leaderboards (
                contest_id  TEXT PRIMARY KEY,
                computed_at TEXT NOT NULL,
                payload     TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned, which only happens after a panic
    /// while holding the lock.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert or update entries for a contest. An updated entry keeps its
    /// original position.
    pub fn upsert_entries(&self, contest_id: &str, entries: &[Entry]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin entry import")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO entries
                        (contest_id, entry_id, owner, picks, tiebreaker_points, correct_picks)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT (contest_id, entry_id) DO UPDATE SET
                        owner = excluded.owner,
                        picks = excluded.picks,
                        tiebreaker_points = excluded.tiebreaker_points,
                        correct_picks = excluded.correct_picks,
                        imported_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                )
                .context("failed to prepare entry upsert")?;
            for entry in entries {
                let picks = serde_json::to_string(&entry.picks)
                    .context("failed to serialize picks")?;
                stmt.execute(params![
                    contest_id,
                    entry.entry_id,
                    entry.owner,
                    picks,
                    entry.tiebreaker_points,
                    entry.correct_picks,
                ])
                .with_context(|| format!("failed to store entry {}", entry.entry_id))?;
            }
        }
        tx.commit().context("failed to commit entry import")?;
        Ok(())
    }

    /// Entries for a contest in first-import order, so unresolved ties rank
    /// the same way across restarts.
    pub fn load_entries(&self, contest_id: &str) -> Result<Vec<Entry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT entry_id, owner, picks, tiebreaker_points, correct_picks
                 FROM entries WHERE contest_id = ?1 ORDER BY rowid",
            )
            .context("failed to prepare load_entries query")?;

        let rows = stmt
            .query_map(params![contest_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, Option<u32>>(4)?,
                ))
            })
            .context("failed to query entries")?;

        let mut entries = Vec::new();
        for row in rows {
            let (entry_id, owner, picks_json, tiebreaker_points, correct_picks) =
                row.context("failed to read entry row")?;
            let picks: Vec<Side> = serde_json::from_str(&picks_json)
                .with_context(|| format!("corrupt picks for entry {entry_id}"))?;
            entries.push(Entry {
                entry_id,
                owner,
                picks,
                tiebreaker_points,
                correct_picks,
            });
        }
        Ok(entries)
    }

    /// Remember the most recent leaderboard for a contest.
    pub fn save_leaderboard(
        &self,
        contest_id: &str,
        computed_at: DateTime<Utc>,
        board: &Leaderboard,
    ) -> Result<()> {
        let payload = serde_json::to_string(board).context("failed to serialize leaderboard")?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO leaderboards (contest_id, computed_at, payload)
                 VALUES (?1, ?2, ?3)",
                params![contest_id, computed_at.to_rfc3339(), payload],
            )
            .context("failed to save leaderboard")?;
        Ok(())
    }

    /// The last saved leaderboard and when it was computed, if any.
    pub fn load_leaderboard(&self, contest_id: &str) -> Result<Option<(DateTime<Utc>, Leaderboard)>> {
        let row: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT computed_at, payload FROM leaderboards WHERE contest_id = ?1",
                params![contest_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("failed to load leaderboard")?;

        let Some((computed_at, payload)) = row else {
            return Ok(None);
        };
        let computed_at = DateTime::parse_from_rfc3339(&computed_at)
            .context("corrupt leaderboard timestamp")?
            .with_timezone(&Utc);
        let board = serde_json::from_str(&payload).context("corrupt leaderboard payload")?;
        Ok(Some((computed_at, board)))
    }
}
