// Entry import from CSV exports of submitted picks.
//
// Columns: entry_id, owner, picks, tiebreaker_points[, correct_picks].
// `picks` is a run of 0/1 digits in ascending game-id order ("1011").

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use pickem_core::contest::{Contest, Entry};
use pickem_core::game::Side;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum EntryImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    entry_id: String,
    owner: String,
    picks: String,
    tiebreaker_points: u32,
    #[serde(default)]
    correct_picks: Option<u32>,
}

/// Parse a pick string. Commas and whitespace between digits are ignored.
pub fn parse_picks(raw: &str) -> Option<Vec<Side>> {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .map(|c| c.to_digit(10).and_then(|d| Side::from_pick(d as u8)))
        .collect()
}

/// Malformed rows are skipped; read failures abort the import.
fn load_entries_from_reader<R: Read>(rdr: R, contest: &Contest) -> Result<Vec<Entry>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    reader.headers()?;

    for result in reader.deserialize::<RawEntry>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                warn!("skipping malformed entry row: {}", e);
                continue;
            }
        };

        let Some(picks) = parse_picks(&raw.picks) else {
            warn!("skipping entry '{}': picks '{}' are not 0/1 digits", raw.entry_id, raw.picks);
            continue;
        };

        let entry = Entry {
            entry_id: raw.entry_id,
            owner: raw.owner,
            picks,
            tiebreaker_points: raw.tiebreaker_points,
            correct_picks: raw.correct_picks,
        };

        if let Err(e) = contest.validate_entry(&entry) {
            warn!("skipping entry: {}", e);
            continue;
        }
        if !seen.insert(entry.entry_id.clone()) {
            warn!("duplicate entry '{}', keeping the first", entry.entry_id);
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Load and validate contest entries from a CSV file. Zero valid rows is an
/// error.
pub fn load_entries(path: &Path, contest: &Contest) -> Result<Vec<Entry>, EntryImportError> {
    let file = std::fs::File::open(path).map_err(|e| EntryImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let entries = load_entries_from_reader(file, contest).map_err(|e| EntryImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;

    if entries.is_empty() {
        return Err(EntryImportError::Validation(format!(
            "{} produced zero valid entries",
            path.display()
        )));
    }
    Ok(entries)
}
