/// WorldState: everything the frontend shows, across all screens.
///
/// ## Phases
///
/// ```text
///   Title ──▶ LevelSelect ──▶ Playing ──won, qualifies──▶ NameEntry ──▶ Highscores
///     │                          ▲  │                                      │
///     └──────▶ Highscores        │  └──won/lost──▶ (ended board, R/ESC)    │
///                                └─────────────────────────────────────────┘
/// ```
///
/// The session itself owns board and countdown. This layer only routes
/// input to it, reacts to its events, and keeps menu cursors.

use std::time::Duration;

use log::{debug, info, warn};

use crate::config::TimingConfig;
use crate::domain::entity::Direction;
use crate::domain::tile::EntityKind;
use super::event::GameEvent;
use super::highscore::{HighscoreError, HighscoreStore, MAX_NAME_LEN};
use super::level::{self, LevelDef, LevelEntry, MapError, MapInfo};
use super::session::GameSession;

/// Title menu entries, in display order.
pub const TITLE_ITEMS: &[&str] = &["Play", "Highscores", "Reset highscores", "Quit"];

/// How long a status message stays up, in frames.
const MESSAGE_TICKS: u32 = 60;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    LevelSelect,
    Playing,
    NameEntry,
    Highscores,
}

/// Result of a title menu selection that main has to act on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TitleAction {
    None,
    Quit,
}

pub struct WorldState {
    pub phase: Phase,
    pub timing: TimingConfig,

    // ── Levels ──
    pub catalog: Vec<LevelEntry>,
    pub select_cursor: usize,
    pub session: Option<GameSession>,

    // ── Highscores ──
    pub highscores: HighscoreStore,
    /// Map shown on the highscore screen.
    pub hs_map: Option<MapInfo>,
    /// Rank earned by the last submitted score, highlighted on that screen.
    pub last_rank: Option<usize>,
    pub name_input: String,

    // ── UI ──
    pub title_cursor: usize,
    pub message: String,
    pub message_timer: u32,
    /// The current message is a blocked-move hint; the next step clears it.
    blocked_hint: bool,
    pub anim_tick: u32,
}

impl WorldState {
    pub fn new(catalog: Vec<LevelEntry>, highscores: HighscoreStore, timing: TimingConfig) -> Self {
        WorldState {
            phase: Phase::Title,
            timing,
            catalog,
            select_cursor: 0,
            session: None,
            highscores,
            hs_map: None,
            last_rank: None,
            name_input: String::new(),
            title_cursor: 0,
            message: String::new(),
            message_timer: 0,
            blocked_hint: false,
            anim_tick: 0,
        }
    }

    pub fn set_message(&mut self, msg: impl Into<String>) {
        self.message = msg.into();
        self.message_timer = MESSAGE_TICKS;
        self.blocked_hint = false;
    }

    // ── Per-frame ──

    /// Advance clocks by one frame of `dt`.
    pub fn tick(&mut self, dt: Duration) {
        self.anim_tick = self.anim_tick.wrapping_add(1);
        if self.message_timer > 0 {
            self.message_timer -= 1;
            if self.message_timer == 0 { self.message.clear(); }
        }
        let events = match self.session.as_mut() {
            Some(s) => s.tick(dt),
            None => return,
        };
        self.on_events(&events);
    }

    // ── Title ──

    pub fn title_move(&mut self, down: bool) {
        let n = TITLE_ITEMS.len();
        self.title_cursor = if down { (self.title_cursor + 1) % n } else { (self.title_cursor + n - 1) % n };
    }

    pub fn title_select(&mut self) -> TitleAction {
        match self.title_cursor {
            0 => {
                self.phase = Phase::LevelSelect;
            }
            1 => self.open_highscores(None),
            2 => {
                self.highscores.reset();
                self.set_message("Highscores cleared");
            }
            _ => return TitleAction::Quit,
        }
        TitleAction::None
    }

    // ── Level select ──

    pub fn select_move(&mut self, delta: isize) {
        if self.catalog.is_empty() { return; }
        let max = self.catalog.len() - 1;
        self.select_cursor = self.select_cursor.saturating_add_signed(delta).min(max);
    }

    /// Load the catalog entry under the cursor and start playing it.
    pub fn start_selected(&mut self) {
        let entry = match self.catalog.get(self.select_cursor) {
            Some(e) => e.clone(),
            None => return,
        };
        match level::load_level(&entry.source) {
            Ok(def) => self.start_level(def),
            Err(e) => self.report_load_error(&e),
        }
    }

    /// Show the board; the countdown waits for `begin_session`.
    pub fn start_level(&mut self, def: LevelDef) {
        self.session = Some(GameSession::new(def, &self.timing));
        self.phase = Phase::Playing;
        self.last_rank = None;
        self.message.clear();
        self.message_timer = 0;
    }

    pub fn report_load_error(&mut self, e: &MapError) {
        warn!("level load failed: {e}");
        self.set_message(format!("Cannot load level: {e}"));
    }

    // ── Playing ──

    /// Start the countdown of a loaded or restarted board.
    pub fn begin_session(&mut self) {
        let events = match self.session.as_mut() {
            Some(s) => s.begin(),
            None => return,
        };
        self.on_events(&events);
    }

    pub fn handle_direction(&mut self, dir: Direction) {
        let events = match self.session.as_mut() {
            Some(s) => s.handle_input(dir),
            None => return,
        };
        self.on_events(&events);
    }

    pub fn restart(&mut self) {
        let fresh = match &self.session {
            Some(s) => s.restart(),
            None => return,
        };
        self.session = Some(fresh);
        self.phase = Phase::Playing;
        self.message.clear();
        self.message_timer = 0;
    }

    /// Leave the board and go back to the level list.
    pub fn leave_level(&mut self) {
        self.session = None;
        self.phase = Phase::LevelSelect;
    }

    fn on_events(&mut self, events: &[GameEvent]) {
        for ev in events {
            match ev {
                GameEvent::SessionStarted { time_limit } => {
                    self.set_message(format!("Go! {time_limit}s on the clock"));
                }
                GameEvent::PlayerMoved { x, y } => {
                    debug!("player at ({x}, {y})");
                    if self.blocked_hint {
                        self.message.clear();
                        self.message_timer = 0;
                        self.blocked_hint = false;
                    }
                }
                GameEvent::BoxPushed { x, y, on_target } => {
                    debug!("box pushed to ({x}, {y})");
                    if *on_target {
                        self.set_message(self.targets_message());
                    }
                }
                GameEvent::MoveBlocked { dir } => {
                    self.set_message(format!("Can't move {}", dir.name()));
                    self.blocked_hint = true;
                }
                GameEvent::LevelWon { elapsed } => self.on_won(*elapsed),
                GameEvent::TimeUp => self.set_message("Time's up! R: retry  ESC: levels"),
            }
        }
    }

    fn targets_message(&self) -> String {
        match &self.session {
            Some(s) => {
                let board = s.board();
                format!("Box on target ({}/{})", board.boxes_on_target(), board.count(EntityKind::Box))
            }
            None => String::new(),
        }
    }

    fn on_won(&mut self, elapsed: f64) {
        let map = match &self.session {
            Some(s) => s.map_info().clone(),
            None => return,
        };
        if self.highscores.qualifies(&map, elapsed) {
            self.message.clear();
            self.message_timer = 0;
            self.name_input = self.highscores.last_used_name().to_string();
            self.phase = Phase::NameEntry;
            info!("new highscore candidate: {elapsed:.1}s");
        } else {
            self.set_message(format!("Solved in {elapsed:.1}s! R: retry  ESC: levels"));
        }
    }

    // ── Name entry ──

    pub fn name_push(&mut self, c: char) {
        if !c.is_control() && self.name_input.chars().count() < MAX_NAME_LEN {
            self.name_input.push(c);
        }
    }

    pub fn name_pop(&mut self) {
        self.name_input.pop();
    }

    /// Record the finished run under the typed name.
    pub fn submit_name(&mut self) {
        let (map, elapsed) = match &self.session {
            Some(s) => match s.elapsed_on_win() {
                Some(t) => (s.map_info().clone(), t),
                None => return,
            },
            None => return,
        };
        match self.highscores.record_score(&map, &self.name_input, elapsed) {
            Ok(rank) => {
                self.open_highscores(Some(map));
                self.last_rank = rank;
            }
            Err(HighscoreError::InvalidName) => self.set_message("Please enter a name"),
            Err(e) => {
                warn!("could not record score: {e}");
                self.set_message(format!("Score not saved: {e}"));
                self.phase = Phase::Playing;
            }
        }
    }

    /// Skip the prompt; the ended board stays visible.
    pub fn skip_name(&mut self) {
        self.phase = Phase::Playing;
        self.set_message("Score skipped. R: retry  ESC: levels");
    }

    // ── Highscore screen ──

    /// Show the table for `map`, or the first map that has one.
    pub fn open_highscores(&mut self, map: Option<MapInfo>) {
        self.hs_map = map.or_else(|| self.highscores.maps().next().cloned());
        self.last_rank = None;
        self.phase = Phase::Highscores;
    }

    /// Page through maps that have tables.
    pub fn highscores_cycle(&mut self, forward: bool) {
        let maps: Vec<&MapInfo> = self.highscores.maps().collect();
        if maps.is_empty() { return; }
        let cur = self.hs_map.as_ref().and_then(|m| maps.iter().position(|k| *k == m));
        let next = match (cur, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1) % maps.len(),
            (Some(i), false) => (i + maps.len() - 1) % maps.len(),
        };
        self.hs_map = Some(maps[next].clone());
        self.last_rank = None;
    }

    /// Leave the highscore screen: back to the board if a session is
    /// still around, else to the title.
    pub fn close_highscores(&mut self) {
        self.phase = if self.session.is_some() { Phase::Playing } else { Phase::Title };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level::{parse_map, LevelSource};
    use crate::sim::session::{Outcome, SessionState};

    const QUICK: &str = "name=Quick\ntimeLimit=20\nmap=\n#pbX#\n";

    fn world() -> WorldState {
        let timing = TimingConfig { move_time_ms: 0, ..TimingConfig::default() };
        let catalog = vec![LevelEntry { name: "First".into(), source: LevelSource::Embedded(0) }];
        WorldState::new(catalog, HighscoreStore::new(None), timing)
    }

    fn win_quick(w: &mut WorldState, secs: u64) {
        w.start_level(parse_map(QUICK).unwrap());
        w.begin_session();
        w.tick(Duration::from_secs(secs));
        w.handle_direction(Direction::Right);
    }

    #[test]
    fn title_menu_wraps_and_routes() {
        let mut w = world();
        w.title_move(false);
        assert_eq!(TITLE_ITEMS[w.title_cursor], "Quit");
        assert_eq!(w.title_select(), TitleAction::Quit);
        w.title_move(true);
        assert_eq!(w.title_select(), TitleAction::None);
        assert_eq!(w.phase, Phase::LevelSelect);
    }

    #[test]
    fn select_loads_board_and_enter_starts_it() {
        let mut w = world();
        w.phase = Phase::LevelSelect;
        w.select_move(5);
        assert_eq!(w.select_cursor, 0);
        w.start_selected();
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(w.session.as_ref().unwrap().state(), SessionState::NotStarted);

        w.begin_session();
        assert!(w.session.as_ref().unwrap().accepts_input());
        assert!(w.message.starts_with("Go!"));
    }

    #[test]
    fn loaded_board_waits_for_begin() {
        let mut w = world();
        w.start_level(parse_map(QUICK).unwrap());
        w.tick(Duration::from_secs(5));
        w.handle_direction(Direction::Right);
        let s = w.session.as_ref().unwrap();
        assert_eq!(s.state(), SessionState::NotStarted);
        assert_eq!(s.time_remaining(), 20.0);
        assert_eq!(s.moves(), 0);

        w.begin_session();
        w.tick(Duration::from_secs(5));
        assert_eq!(w.session.as_ref().unwrap().time_remaining(), 15.0);
    }

    #[test]
    fn blocked_move_is_reported_until_next_step() {
        let mut w = world();
        w.start_level(parse_map("timeLimit=20\nmap=\n#p  b X#\n").unwrap());
        w.begin_session();
        w.handle_direction(Direction::Left);
        assert_eq!(w.message, "Can't move left");

        w.handle_direction(Direction::Right);
        assert!(w.message.is_empty());
        assert_eq!(w.session.as_ref().unwrap().moves(), 1);
    }

    #[test]
    fn box_on_target_reports_progress() {
        let mut w = world();
        w.start_level(parse_map("timeLimit=20\nmap=\n#pbX  bX#\n").unwrap());
        w.begin_session();
        w.handle_direction(Direction::Right);
        assert_eq!(w.message, "Box on target (1/2)");
        assert_eq!(w.phase, Phase::Playing);
    }

    #[test]
    fn missing_map_file_stays_on_select() {
        let mut w = world();
        w.catalog.push(LevelEntry {
            name: "Gone".into(),
            source: LevelSource::File("/nonexistent/gone.map".into()),
        });
        w.phase = Phase::LevelSelect;
        w.select_move(1);
        w.start_selected();
        assert_eq!(w.phase, Phase::LevelSelect);
        assert!(w.session.is_none());
        assert!(w.message.starts_with("Cannot load level"));
    }

    #[test]
    fn qualifying_win_prompts_with_last_name() {
        let mut w = world();
        w.highscores.record_score(&parse_map(QUICK).unwrap().map_info(), "ann", 15.0).unwrap();
        win_quick(&mut w, 3);
        assert_eq!(w.phase, Phase::NameEntry);
        assert_eq!(w.name_input, "ann");

        w.name_pop();
        w.name_push('!');
        w.submit_name();
        assert_eq!(w.phase, Phase::Highscores);
        assert_eq!(w.last_rank, Some(1));
        let scores = w.highscores.query(w.hs_map.as_ref().unwrap()).unwrap();
        assert_eq!(scores[0].player, "an!");
        assert_eq!(scores[0].time, 3.0);
    }

    #[test]
    fn empty_name_is_refused() {
        let mut w = world();
        win_quick(&mut w, 1);
        w.name_input.clear();
        w.submit_name();
        assert_eq!(w.phase, Phase::NameEntry);
        assert_eq!(w.message, "Please enter a name");
    }

    #[test]
    fn name_input_is_capped() {
        let mut w = world();
        for _ in 0..30 {
            w.name_push('x');
        }
        w.name_push('\u{7}');
        assert_eq!(w.name_input.chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn timeout_reports_and_restart_recovers() {
        let mut w = world();
        w.start_level(parse_map(QUICK).unwrap());
        w.begin_session();
        w.tick(Duration::from_secs(25));
        assert_eq!(w.session.as_ref().unwrap().outcome(), Some(Outcome::Lost));
        assert!(w.message.starts_with("Time's up"));

        w.restart();
        let s = w.session.as_ref().unwrap();
        assert_eq!(s.state(), SessionState::NotStarted);
        assert!(!s.accepts_input());
        assert_eq!(s.time_remaining(), 20.0);
        assert!(w.message.is_empty());

        w.begin_session();
        assert!(w.session.as_ref().unwrap().accepts_input());
    }

    #[test]
    fn highscore_pages_cycle_through_maps() {
        let mut w = world();
        let a = MapInfo { name: "A".into(), structure: "x\n".into() };
        let b = MapInfo { name: "B".into(), structure: "y\n".into() };
        w.highscores.record_score(&b, "p", 2.0).unwrap();
        w.highscores.record_score(&a, "p", 1.0).unwrap();
        w.open_highscores(None);
        assert_eq!(w.hs_map.as_ref(), Some(&a));
        w.highscores_cycle(true);
        assert_eq!(w.hs_map.as_ref(), Some(&b));
        w.highscores_cycle(true);
        assert_eq!(w.hs_map.as_ref(), Some(&a));
        w.highscores_cycle(false);
        assert_eq!(w.hs_map.as_ref(), Some(&b));
        w.close_highscores();
        assert_eq!(w.phase, Phase::Title);
    }
}
