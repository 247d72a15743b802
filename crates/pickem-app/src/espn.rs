// Scoreboard sources: the public ESPN API and saved scoreboard documents.
//
// Both decode the same JSON shape, so a snapshot saved from the live
// endpoint replays exactly.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use pickem_core::game::{Game, GameStatus, WeekKey};
use pickem_core::lookup::{GameLookup, LookupError};
use serde::Deserialize;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// ESPN response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EspnScoreboard {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Debug, Deserialize)]
struct EspnEvent {
    id: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
    #[serde(default)]
    status: Option<EspnStatus>,
}

#[derive(Debug, Deserialize)]
struct EspnCompetition {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    competitors: Vec<EspnCompetitor>,
    #[serde(default)]
    status: Option<EspnStatus>,
}

#[derive(Debug, Deserialize)]
struct EspnCompetitor {
    #[serde(rename = "homeAway", default)]
    home_away: String,
    /// A string on the scoreboard endpoint, a number on some others.
    #[serde(default)]
    score: Option<serde_json::Value>,
    #[serde(default)]
    team: Option<EspnTeam>,
}

#[derive(Debug, Deserialize)]
struct EspnTeam {
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
    #[serde(default)]
    abbreviation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EspnStatus {
    #[serde(rename = "type", default)]
    status_type: Option<EspnStatusType>,
}

#[derive(Debug, Deserialize)]
struct EspnStatusType {
    #[serde(default)]
    completed: bool,
    /// "pre", "in" or "post".
    #[serde(default)]
    state: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Decode a scoreboard document into games. Events that lack a kickoff time
/// or a home/away pair are skipped with a warning.
pub fn parse_scoreboard(json: &str) -> Result<Vec<Game>, LookupError> {
    let board: EspnScoreboard =
        serde_json::from_str(json).map_err(|e| LookupError::Decode(e.to_string()))?;

    let mut games = Vec::with_capacity(board.events.len());
    for event in &board.events {
        match parse_event(event) {
            Some(game) => games.push(game),
            None => warn!("skipping scoreboard event {}: incomplete record", event.id),
        }
    }
    Ok(games)
}

fn parse_event(event: &EspnEvent) -> Option<Game> {
    let comp = event.competitions.first()?;

    let status_type = comp
        .status
        .as_ref()
        .or(event.status.as_ref())
        .and_then(|s| s.status_type.as_ref());
    let status = match status_type {
        Some(t) if t.completed => GameStatus::Final,
        Some(t) if t.state.as_deref() == Some("in") => GameStatus::InProgress,
        _ => GameStatus::Scheduled,
    };
    let started = status != GameStatus::Scheduled
        || status_type.is_some_and(|t| t.state.as_deref() == Some("post"));

    let kickoff = comp
        .date
        .as_deref()
        .or(event.date.as_deref())
        .and_then(parse_kickoff)?;

    let home = comp.competitors.iter().find(|c| c.home_away == "home")?;
    let away = comp.competitors.iter().find(|c| c.home_away == "away")?;

    let (home_score, away_score) = if started {
        (parse_score(home), parse_score(away))
    } else {
        (None, None)
    };

    Some(Game {
        game_id: event.id.clone(),
        home_team: team_name(home),
        away_team: team_name(away),
        kickoff,
        home_score,
        away_score,
        status,
    })
}

fn team_name(competitor: &EspnCompetitor) -> String {
    competitor
        .team
        .as_ref()
        .and_then(|t| t.display_name.clone().or_else(|| t.abbreviation.clone()))
        .unwrap_or_default()
}

fn parse_score(competitor: &EspnCompetitor) -> Option<u32> {
    match competitor.score.as_ref()? {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        _ => None,
    }
}

/// ESPN dates are minute precision (`2024-10-06T17:00Z`); accept full
/// RFC 3339 too.
pub fn parse_kickoff(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// EspnClient
// ---------------------------------------------------------------------------

/// Live scoreboard over HTTP. No API key required.
pub struct EspnClient {
    http: reqwest::Client,
    base_url: String,
}

impl EspnClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Http {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl GameLookup for EspnClient {
    async fn fetch_week_games(&self, week: WeekKey) -> Result<Vec<Game>, LookupError> {
        let http_err = |e: reqwest::Error| LookupError::Http {
            url: self.base_url.clone(),
            message: e.to_string(),
        };

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("dates", week.year.to_string()),
                ("seasontype", week.season_type.api_code().to_string()),
                ("week", week.week.to_string()),
            ])
            .send()
            .await
            .map_err(http_err)?;

        if !resp.status().is_success() {
            return Err(LookupError::Status {
                url: self.base_url.clone(),
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text().await.map_err(http_err)?;
        let games = parse_scoreboard(&body)?;
        debug!(%week, games = games.len(), "fetched scoreboard");
        Ok(games)
    }
}

// ---------------------------------------------------------------------------
// SnapshotLookup
// ---------------------------------------------------------------------------

/// Reads `{dir}/{year}-{seasontype}-{week}.json` scoreboard documents.
pub struct SnapshotLookup {
    dir: PathBuf,
}

impl SnapshotLookup {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, week: WeekKey) -> PathBuf {
        self.dir.join(format!("{week}.json"))
    }
}

#[async_trait]
impl GameLookup for SnapshotLookup {
    async fn fetch_week_games(&self, week: WeekKey) -> Result<Vec<Game>, LookupError> {
        let path = self.path_for(week);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| LookupError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        parse_scoreboard(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
      "events": [
        {
          "id": "401671789",
          "date": "2024-10-06T13:30Z",
          "competitions": [{
            "date": "2024-10-06T13:30Z",
            "status": {"type": {"state": "post", "completed": true}},
            "competitors": [
              {"homeAway": "home", "score": "17", "team": {"displayName": "Minnesota Vikings"}},
              {"homeAway": "away", "score": "23", "team": {"displayName": "New York Jets"}}
            ]
          }]
        },
        {
          "id": "401671801",
          "date": "2024-10-06T17:00Z",
          "competitions": [{
            "status": {"type": {"state": "in", "completed": false}},
            "competitors": [
              {"homeAway": "away", "score": 7, "team": {"abbreviation": "CAR"}},
              {"homeAway": "home", "score": "10", "team": {"displayName": "Chicago Bears"}}
            ]
          }]
        },
        {
          "id": "401671813",
          "date": "2024-10-07T00:20Z",
          "competitions": [{
            "status": {"type": {"state": "pre", "completed": false}},
            "competitors": [
              {"homeAway": "home", "score": "0", "team": {"displayName": "Los Angeles Chargers"}},
              {"homeAway": "away", "score": "0", "team": {"displayName": "Denver Broncos"}}
            ]
          }]
        },
        {
          "id": "broken",
          "competitions": [{"competitors": []}]
        }
      ]
    }"#;

    #[test]
    fn parses_status_scores_and_kickoff() {
        let games = parse_scoreboard(SAMPLE).unwrap();
        assert_eq!(games.len(), 3);

        let done = &games[0];
        assert_eq!(done.status, GameStatus::Final);
        assert_eq!((done.home_score, done.away_score), (Some(17), Some(23)));
        assert_eq!(done.home_team, "Minnesota Vikings");
        assert_eq!(done.kickoff, Utc.with_ymd_and_hms(2024, 10, 6, 13, 30, 0).unwrap());

        let live = &games[1];
        assert_eq!(live.status, GameStatus::InProgress);
        assert_eq!((live.home_score, live.away_score), (Some(10), Some(7)));
        assert_eq!(live.away_team, "CAR");

        let upcoming = &games[2];
        assert_eq!(upcoming.status, GameStatus::Scheduled);
        assert_eq!(upcoming.home_score, None);
    }

    #[test]
    fn empty_scoreboard_is_not_an_error() {
        assert!(parse_scoreboard("{}").unwrap().is_empty());
        assert!(parse_scoreboard(r#"{"events": []}"#).unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(
            parse_scoreboard("<html>502</html>"),
            Err(LookupError::Decode(_))
        ));
    }

    #[test]
    fn kickoff_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 10, 6, 17, 0, 0).unwrap();
        assert_eq!(parse_kickoff("2024-10-06T17:00Z"), Some(expected));
        assert_eq!(parse_kickoff("2024-10-06T17:00:00Z"), Some(expected));
        assert_eq!(parse_kickoff("2024-10-06T13:00:00-04:00"), Some(expected));
        assert_eq!(parse_kickoff("Sunday"), None);
    }

    #[tokio::test]
    async fn snapshot_missing_file_is_io_error() {
        let lookup = SnapshotLookup::new(std::env::temp_dir().join("pickem_no_snapshots_here"));
        let week = WeekKey {
            year: 2024,
            season_type: pickem_core::game::SeasonType::Regular,
            week: 5,
        };
        assert!(lookup.path_for(week).ends_with("2024-2-5.json"));
        assert!(matches!(
            lookup.fetch_week_games(week).await,
            Err(LookupError::Io { .. })
        ));
    }
}
