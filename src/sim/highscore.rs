/// Per-map highscore tables, persisted as JSON.
///
/// Each map (keyed by `MapInfo`: name + raw structure) keeps its best
/// `MAX_HIGH_SCORES` times, ascending. Equal times keep the earlier entry
/// first. Every mutating call writes the whole store back to disk; a failed
/// write is logged and the in-memory table stays authoritative.
///
/// ## File format:
/// ```json
/// {
///   "highscores": [
///     { "mapName": "...", "mapStructure": "...",
///       "scores": [ { "player": "...", "time": 12.3 } ] }
///   ],
///   "lastUsedName": "..."
/// }
/// ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::level::MapInfo;
use super::session::round_tenths;

pub const MAX_HIGH_SCORES: usize = 10;
pub const MAX_NAME_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum HighscoreError {
    #[error("highscore file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("highscore file {path} is not valid: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("player name must not be empty")]
    InvalidName,
    #[error("invalid time {0}")]
    InvalidTime(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub player: String,
    pub time: f64,
}

// ── On-disk schema ──

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct HighscoreFile {
    highscores: Vec<MapScores>,
    #[serde(default)]
    last_used_name: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapScores {
    map_name: String,
    map_structure: String,
    scores: Vec<Score>,
}

// ══════════════════════════════════════════════════════════════
// Store
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct HighscoreStore {
    tables: BTreeMap<MapInfo, Vec<Score>>,
    last_used_name: String,
    /// Backing file. `None` keeps the store in memory only.
    path: Option<PathBuf>,
}

impl HighscoreStore {
    /// Empty store. With `path: None` it never touches disk.
    pub fn new(path: Option<PathBuf>) -> Self {
        HighscoreStore { path, ..Self::default() }
    }

    /// Load from `path`. A missing file gives an empty store bound to that path.
    pub fn load(path: &Path) -> Result<Self, HighscoreError> {
        let mut store = Self::new(Some(path.to_path_buf()));

        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no highscore file at {}, starting fresh", path.display());
                return Ok(store);
            }
            Err(source) => return Err(HighscoreError::Io { path: path.to_path_buf(), source }),
        };

        let file: HighscoreFile = serde_json::from_str(&text)
            .map_err(|source| HighscoreError::Format { path: path.to_path_buf(), source })?;

        for entry in file.highscores {
            let key = MapInfo { name: entry.map_name, structure: entry.map_structure };
            let mut scores = entry.scores;
            scores.truncate(MAX_HIGH_SCORES);
            if store.tables.insert(key.clone(), scores).is_some() {
                warn!("duplicate highscore table for '{}', keeping the last one", key.name);
            }
        }
        store.last_used_name = file.last_used_name;
        info!("loaded highscores for {} map(s)", store.tables.len());
        Ok(store)
    }

    /// Write the whole store to its backing file (no-op when in memory).
    pub fn save(&self) -> Result<(), HighscoreError> {
        let path = match &self.path {
            Some(p) => p,
            None => return Ok(()),
        };
        let file = HighscoreFile {
            highscores: self.tables.iter().map(|(key, scores)| MapScores {
                map_name: key.name.clone(),
                map_structure: key.structure.clone(),
                scores: scores.clone(),
            }).collect(),
            last_used_name: self.last_used_name.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|source| HighscoreError::Format { path: path.clone(), source })?;

        let io_err = |source: io::Error| HighscoreError::Io { path: path.clone(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, json).map_err(io_err)
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!("{e}; keeping scores in memory");
        }
    }

    // ── Mutations (each one persists) ──

    /// Insert a finished run. Returns the 1-based rank, or `None` if the
    /// time did not make the table.
    pub fn record_score(
        &mut self,
        map: &MapInfo,
        player: &str,
        time: f64,
    ) -> Result<Option<usize>, HighscoreError> {
        let player: String = player.trim().chars().take(MAX_NAME_LEN).collect();
        if player.is_empty() {
            return Err(HighscoreError::InvalidName);
        }
        if !time.is_finite() || time < 0.0 {
            return Err(HighscoreError::InvalidTime(time));
        }
        let time = round_tenths(time);

        self.last_used_name = player.clone();
        let scores = self.tables.entry(map.clone()).or_default();
        let pos = scores.iter().position(|s| s.time > time).unwrap_or(scores.len());
        scores.insert(pos, Score { player, time });
        scores.truncate(MAX_HIGH_SCORES);

        let rank = (pos < MAX_HIGH_SCORES).then_some(pos + 1);
        info!("score {time:.1}s on '{}': rank {rank:?}", map.name);
        self.persist();
        Ok(rank)
    }

    /// Forget every table.
    pub fn reset(&mut self) {
        self.tables.clear();
        info!("highscores reset");
        self.persist();
    }

    // ── Queries ──

    /// Ranked scores for a map, `None` if it never had any.
    pub fn query(&self, map: &MapInfo) -> Option<&[Score]> {
        self.tables.get(map).map(Vec::as_slice)
    }

    /// Maps with a table, sorted by name.
    pub fn maps(&self) -> impl Iterator<Item = &MapInfo> + '_ {
        self.tables.keys()
    }

    pub fn best_time(&self, map: &MapInfo) -> Option<f64> {
        self.query(map)?.first().map(|s| s.time)
    }

    /// Would `time` earn a place in the table?
    pub fn qualifies(&self, map: &MapInfo, time: f64) -> bool {
        match self.query(map) {
            None => true,
            Some(scores) if scores.len() < MAX_HIGH_SCORES => true,
            Some(scores) => scores.last().map_or(true, |worst| round_tenths(time) < worst.time),
        }
    }

    pub fn last_used_name(&self) -> &str {
        &self.last_used_name
    }
}
