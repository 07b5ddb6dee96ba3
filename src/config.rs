/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use log::{info, warn};
use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub levels_dir: PathBuf,
    pub highscore_file: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
    pub move_time_ms: u32,       // move animation length; 0 = instant
    pub default_time_limit: u32, // seconds, for maps without timeLimit
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            tick_rate_ms: default_tick_rate(),
            move_time_ms: default_move_time(),
            default_time_limit: default_time_limit(),
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_move_time")]
    move_time_ms: u32,
    #[serde(default = "default_time_limit")]
    default_time_limit: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_highscore_file")]
    highscore_file: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 50 }
fn default_move_time() -> u32 { 60 }
fn default_time_limit() -> u32 { 120 }
fn default_levels_dir() -> String { "levels".into() }
fn default_highscore_file() -> String { "highscores.json".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            tick_rate_ms: default_tick_rate(),
            move_time_ms: default_move_time(),
            default_time_limit: default_time_limit(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            highscore_file: default_highscore_file(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::resolve(toml_cfg, &search_dirs)
    }

    /// Parse config text directly (no file lookup, paths left relative).
    #[cfg(test)]
    fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        Ok(Self::resolve(parse_toml(text)?, &[]))
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        // Levels: first candidate dir that actually has the folder.
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        // Highscores: relative names live in the writable data dir.
        let hs = PathBuf::from(&toml_cfg.general.highscore_file);
        let highscore_file = if hs.is_absolute() || search_dirs.is_empty() {
            hs
        } else {
            data_dir().join(hs)
        };

        GameConfig {
            timing: TimingConfig {
                tick_rate_ms: toml_cfg.timing.tick_rate_ms.max(1),
                move_time_ms: toml_cfg.timing.move_time_ms,
                default_time_limit: toml_cfg.timing.default_time_limit,
            },
            levels_dir,
            highscore_file,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Writable directory for highscores and the log file.
pub fn data_dir() -> PathBuf {
    // 1. Exe directory, if writable (portable installs)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            let test_path = parent.join(".write_test_sokoban");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    // 2. XDG data home (~/.local/share/sokoban) for system installs
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/sokoban");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. Fallback to CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Search for config.toml in candidate directories.
fn parse_toml(text: &str) -> Result<TomlConfig, toml::de::Error> {
    toml::from_str(text)
}

fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() { continue; }
        match std::fs::read_to_string(&path) {
            Ok(text) => match parse_toml(&text) {
                Ok(cfg) => {
                    info!("using {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    warn!("config.toml parse error: {e}; using default settings");
                    return TomlConfig::default();
                }
            },
            Err(e) => warn!("could not read {}: {e}", path.display()),
        }
    }
    TomlConfig::default()
}
