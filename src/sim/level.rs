/// Level loader: map parsing and level catalog.
///
/// ## Sources (listing order):
///   1. Built-in embedded levels
///   2. `levels/` directory (individual `.map` files, sorted by filename)
///   3. Any map file passed explicitly (command line)
///
/// ## Map format (`.map`):
///   ```
///   name=Level name
///   timeLimit=120
///   map=
///   <grid rows>
///   ```
///
/// Lines before `map=` are `key=value` metadata, split on the first `=`.
/// Unknown keys and blank lines are ignored. The `map` value is ignored;
/// the line only marks where the grid starts. Blank lines inside the
/// grid are skipped and do NOT advance the row index.
///
/// ## Tile legend:
///   '#' = Wall        'p' = Player         'b' = Box
///   'X' = Target      'B' = Box on target  'P' = Player on target
///   anything else = nothing (floor if reachable, see floodfill)

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::domain::board::Board;
use crate::domain::floodfill;
use crate::domain::tile::EntityKind;

const MAP_KEY: &str = "map";
const NAME_KEY: &str = "name";
const TIME_LIMIT_KEY: &str = "timeLimit";
const DEFAULT_NAME: &str = "Unnamed Map";

#[derive(Debug, Error)]
pub enum MapError {
    #[error("not a valid Sokoban map: no `map=` section")]
    InvalidMapFormat,
    #[error("cannot read map {}: {source}", path.display())]
    MapSourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no built-in level #{0}")]
    UnknownLevel(usize),
}

/// Parsed map, before any entity is placed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelDef {
    pub name: String,
    /// Countdown in seconds; None when the file does not say.
    pub time_limit: Option<u32>,
    pub width: usize,
    pub height: usize,
    /// Non-empty grid rows in encounter order.
    pub rows: Vec<String>,
}

/// Highscore identity of a level: name + exact grid text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapInfo {
    pub name: String,
    pub structure: String,
}

impl LevelDef {
    /// Grid rows, each terminated by `\n`.
    pub fn structure(&self) -> String {
        let mut s = String::with_capacity(self.rows.iter().map(|r| r.len() + 1).sum());
        for row in &self.rows {
            s.push_str(row);
            s.push('\n');
        }
        s
    }

    pub fn map_info(&self) -> MapInfo {
        MapInfo { name: self.name.clone(), structure: self.structure() }
    }
}

/// Where a level comes from. Kept by the session so restart can reload it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelSource {
    Embedded(usize),
    File(PathBuf),
}

/// Catalog entry for the level select screen.
#[derive(Clone, Debug)]
pub struct LevelEntry {
    pub name: String,
    pub source: LevelSource,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Load and parse a level from its source.
pub fn load_level(source: &LevelSource) -> Result<LevelDef, MapError> {
    match source {
        LevelSource::Embedded(idx) => {
            let text = EMBEDDED_LEVELS.get(*idx).ok_or(MapError::UnknownLevel(*idx))?;
            parse_map(text)
        }
        LevelSource::File(path) => load_map_file(path),
    }
}

/// Read and parse a map file.
pub fn load_map_file(path: &Path) -> Result<LevelDef, MapError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        warn!("cannot open map {}: {}", path.display(), source);
        MapError::MapSourceUnavailable { path: path.to_path_buf(), source }
    })?;
    let def = parse_map(&text)?;
    info!("loaded map '{}' ({}x{}) from {}", def.name, def.width, def.height, path.display());
    Ok(def)
}

/// Parse map text. Two passes over the same lines: the first sizes the
/// grid and proves a `map` section exists, the second reads metadata
/// and collects rows.
pub fn parse_map(text: &str) -> Result<LevelDef, MapError> {
    // Pass 1: dimensions.
    let mut in_grid = false;
    let mut width = 0;
    let mut height = 0;
    for line in text.lines() {
        if line.is_empty() { continue; }
        if in_grid {
            width = width.max(line.chars().count());
            height += 1;
        } else if split_key(line).0 == MAP_KEY {
            in_grid = true;
        }
    }
    if !in_grid {
        return Err(MapError::InvalidMapFormat);
    }

    // Pass 2: metadata + rows.
    let mut name: Option<String> = None;
    let mut time_limit: Option<u32> = None;
    let mut rows = Vec::with_capacity(height);
    let mut in_grid = false;
    for line in text.lines() {
        if line.is_empty() { continue; }
        if in_grid {
            rows.push(line.to_string());
            continue;
        }
        match split_key(line) {
            (MAP_KEY, _) => in_grid = true,
            (NAME_KEY, Some(v)) => name = Some(v.to_string()),
            (TIME_LIMIT_KEY, Some(v)) => match v.trim().parse::<u32>() {
                Ok(t) => time_limit = Some(t),
                Err(_) => warn!("ignoring invalid timeLimit value '{}'", v),
            },
            (key, _) => debug!("ignoring metadata line '{}'", key),
        }
    }

    Ok(LevelDef {
        name: name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
        time_limit,
        width,
        height,
        rows,
    })
}

/// Stamp a parsed level onto a fresh board and derive its floor.
pub fn build_board(def: &LevelDef) -> Board {
    let mut board = Board::new(def.width, def.height);
    for (y, row) in def.rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            for &kind in EntityKind::placements_for(ch) {
                if let Err(e) = board.place(kind, x, y) {
                    warn!("map '{}': skipping {:?} at ({}, {}): {}", def.name, kind, x, y, e);
                }
            }
        }
    }
    if board.player().is_none() {
        warn!("map '{}' has no player", def.name);
    }
    if let Err(e) = floodfill::fill_floor(&mut board) {
        warn!("map '{}': floodfill stopped: {}", def.name, e);
    }
    board
}

/// Every playable level: embedded ones first, then `*.map` files in `dir`.
pub fn level_catalog(dir: &Path) -> Vec<LevelEntry> {
    let mut entries: Vec<LevelEntry> = EMBEDDED_LEVELS
        .iter()
        .enumerate()
        .filter_map(|(i, text)| match parse_map(text) {
            Ok(def) => Some(LevelEntry { name: def.name, source: LevelSource::Embedded(i) }),
            Err(e) => {
                warn!("built-in level #{} is broken: {}", i, e);
                None
            }
        })
        .collect();
    entries.extend(load_from_directory(dir));
    entries
}

// ══════════════════════════════════════════════════════════════
// Internal
// ══════════════════════════════════════════════════════════════

/// `key=value` → (key, Some(value)); anything else → (line, None).
fn split_key(line: &str) -> (&str, Option<&str>) {
    match line.split_once('=') {
        Some((k, v)) => (k, Some(v)),
        None => (line, None),
    }
}

fn load_from_directory(dir: &Path) -> Vec<LevelEntry> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!("no levels directory {}: {}", dir.display(), e);
            return vec![];
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |x| x == "map"))
        .collect();
    paths.sort();

    let mut results = vec![];
    for path in paths {
        match load_map_file(&path) {
            Ok(def) => results.push(LevelEntry { name: def.name, source: LevelSource::File(path) }),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    results
}

// ══════════════════════════════════════════════════════════════
// Embedded levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED_LEVELS: &[&str] = &[
    "name=First Steps
timeLimit=60
map=
#####
#p bX#
#####
",
    "name=Corner Pocket
timeLimit=90
map=
 #####
 #p  #
 # b #
##   #
#X b #
#   X#
######
",
    "name=Storeroom
timeLimit=150
map=
  ####
###  ####
#     b #
# #  #b #
# X X#p #
#########
",
    "name=Warehouse
timeLimit=240
map=
    #####
    #   #
    #b  #
  ###  b##
  #  b b #
### # ## #   ######
#   # ## #####  XX#
# b  b          XX#
##### ### #p##  XX#
    #     #########
    #######
",
];
