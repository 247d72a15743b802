// Configuration loading and parsing (contest.toml, service.toml).

use std::path::{Path, PathBuf};

use pickem_core::contest::{Contest, ContestError};
use pickem_core::game::{SeasonType, WeekKey};
use pickem_core::ranking::TiePolicy;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Public ESPN NFL scoreboard endpoint.
pub const DEFAULT_SCOREBOARD_URL: &str =
    "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub contest: ContestConfig,
    pub source: SourceConfig,
    pub poll_interval_secs: u64,
    pub tie_policy: TiePolicy,
    pub ws_port: u16,
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// contest.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[contest]` table in contest.toml.
#[derive(Debug, Clone, Deserialize)]
struct ContestFile {
    contest: ContestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContestConfig {
    /// Stable key for persisted entries and leaderboards.
    pub id: String,
    pub name: String,
    pub year: u16,
    pub season_type: SeasonType,
    pub week: u8,
    pub game_ids: Vec<String>,
    pub tiebreaker_game_id: String,
    pub entries_csv: String,
}

impl ContestConfig {
    pub fn week_key(&self) -> WeekKey {
        WeekKey {
            year: self.year,
            season_type: self.season_type,
            week: self.week,
        }
    }

    pub fn build_contest(&self) -> Result<Contest, ContestError> {
        Contest::new(self.game_ids.clone(), self.tiebreaker_game_id.clone())
    }
}

// ---------------------------------------------------------------------------
// service.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire service.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceFile {
    source: SourceConfig,
    polling: PollingSection,
    #[serde(default)]
    ranking: RankingSection,
    websocket: WebsocketSection,
    database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
struct PollingSection {
    interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RankingSection {
    #[serde(default)]
    ties: TiePolicy,
}

#[derive(Debug, Clone, Deserialize)]
struct WebsocketSection {
    port: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Live ESPN scoreboard over HTTP.
    Espn,
    /// Saved scoreboard documents on disk.
    Snapshot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_SCOREBOARD_URL.to_string()
}

fn default_snapshot_dir() -> String {
    "data/scoreboards".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/contest.toml` and
/// `config/service.toml`, both relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let contest_path = config_dir.join("contest.toml");
    let contest_text = read_file(&contest_path)?;
    let contest_file: ContestFile =
        toml::from_str(&contest_text).map_err(|e| ConfigError::ParseError {
            path: contest_path.clone(),
            source: e,
        })?;

    let service_path = config_dir.join("service.toml");
    let service_text = read_file(&service_path)?;
    let service_file: ServiceFile =
        toml::from_str(&service_text).map_err(|e| ConfigError::ParseError {
            path: service_path.clone(),
            source: e,
        })?;

    let config = Config {
        contest: contest_file.contest,
        source: service_file.source,
        poll_interval_secs: service_file.polling.interval_secs,
        tie_policy: service_file.ranking.ties,
        ws_port: service_file.websocket.port,
        db_path: service_file.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// The files `load_config_from` reads from `config/`.
const CONFIG_FILES: [&str; 2] = ["contest.toml", "service.toml"];

/// Seed `config/` from `defaults/` with any of the service's config files it
/// lacks. Files already in `config/` are never overwritten. Returns the paths
/// written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    let mut copied = Vec::new();
    for name in CONFIG_FILES {
        let target = config_dir.join(name);
        if target.is_file() {
            continue;
        }
        let source = defaults_dir.join(name);
        if !source.is_file() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "config/{name} is missing and there is no defaults/{name} in {}",
                    base_dir.display()
                ),
            });
        }

        std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", config_dir.display()),
        })?;
        std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {} to {}: {e}", source.display(), target.display()),
        })?;
        info!("Seeded {} from defaults", target.display());
        copied.push(target);
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// into `config/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let contest = &config.contest;

    if contest.id.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "contest.id".into(),
            message: "must not be empty".into(),
        });
    }

    if contest.year == 0 {
        return Err(ConfigError::ValidationError {
            field: "contest.year".into(),
            message: "must be greater than 0".into(),
        });
    }

    if !(1..=25).contains(&contest.week) {
        return Err(ConfigError::ValidationError {
            field: "contest.week".into(),
            message: format!("must be between 1 and 25 inclusive, got {}", contest.week),
        });
    }

    if let Err(e) = contest.build_contest() {
        let field = match e {
            ContestError::TiebreakerNotInContest(_) => "contest.tiebreaker_game_id",
            _ => "contest.game_ids",
        };
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message: e.to_string(),
        });
    }

    if config.source.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "source.timeout_secs".into(),
            message: "must be > 0".into(),
        });
    }

    if config.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "polling.interval_secs".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
