/// GameSession: one timed attempt at one level.
///
/// ## State machine
///
/// ```text
///   NotStarted ──begin()──▶ Running ──all boxes on targets──▶ Ended(Won)
///                              │
///                              └────countdown hits 0─────────▶ Ended(Lost)
/// ```
///
/// `Ended` is terminal. `restart()` builds a brand-new session from the
/// pristine level; a session is never reused.
///
/// Input is accepted only while `Running`. The countdown is driven by
/// `tick(dt)` from the frontend loop, which also advances move animations.
/// Late or duplicate ticks after the session ended are ignored.

use std::time::Duration;

use log::{error, info};

use crate::config::TimingConfig;
use crate::domain::board::Board;
use crate::domain::entity::Direction;
use crate::domain::rules::{self, MoveOutcome};
use crate::domain::tile::EntityKind;
use super::event::GameEvent;
use super::level::{self, LevelDef, MapInfo};

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Outcome {
    /// Elapsed seconds, rounded to one decimal.
    Won { elapsed: f64 },
    Lost,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SessionState {
    NotStarted,
    Running,
    Ended(Outcome),
}

pub struct GameSession {
    /// Level as loaded. Never mutated; restart rebuilds from it.
    level: LevelDef,
    map_info: MapInfo,
    board: Board,
    timing: TimingConfig,
    time_limit: u32,
    elapsed: Duration,
    state: SessionState,
    moves: u32,
    pushes: u32,
}

/// Round to one decimal place, half away from zero.
pub fn round_tenths(secs: f64) -> f64 {
    (secs * 10.0).round() / 10.0
}

// ── Construction ──

impl GameSession {
    pub fn new(level: LevelDef, timing: &TimingConfig) -> Self {
        let board = level::build_board(&level);
        let time_limit = level.time_limit.unwrap_or(timing.default_time_limit);
        GameSession {
            map_info: level.map_info(),
            level,
            board,
            timing: timing.clone(),
            time_limit,
            elapsed: Duration::ZERO,
            state: SessionState::NotStarted,
            moves: 0,
            pushes: 0,
        }
    }

    /// Fresh session on the same level, back in `NotStarted`.
    pub fn restart(&self) -> GameSession {
        GameSession::new(self.level.clone(), &self.timing)
    }
}

// ── Queries ──

impl GameSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started(&self) -> bool {
        self.state != SessionState::NotStarted
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, SessionState::Ended(_))
    }

    /// True only while running (started and not ended).
    pub fn accepts_input(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            SessionState::Ended(o) => Some(o),
            _ => None,
        }
    }

    pub fn elapsed_on_win(&self) -> Option<f64> {
        match self.state {
            SessionState::Ended(Outcome::Won { elapsed }) => Some(elapsed),
            _ => None,
        }
    }

    pub fn time_limit(&self) -> u32 {
        self.time_limit
    }

    /// Seconds left on the countdown, never negative.
    pub fn time_remaining(&self) -> f64 {
        (self.time_limit as f64 - self.elapsed.as_secs_f64()).max(0.0)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn map_info(&self) -> &MapInfo {
        &self.map_info
    }

    pub fn level_name(&self) -> &str {
        &self.level.name
    }

    pub fn top_entity_at(&self, x: usize, y: usize) -> Option<EntityKind> {
        self.board.top_kind_at(x, y)
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn pushes(&self) -> u32 {
        self.pushes
    }
}

// ── Transitions ──

impl GameSession {
    /// Start the countdown. Only meaningful from `NotStarted`.
    pub fn begin(&mut self) -> Vec<GameEvent> {
        if self.state != SessionState::NotStarted {
            return vec![];
        }
        self.state = SessionState::Running;
        info!("session started on '{}' ({}s)", self.level.name, self.time_limit);
        vec![GameEvent::SessionStarted { time_limit: self.time_limit }]
    }

    /// Advance the clock by `dt`: countdown (while running) and move animations.
    pub fn tick(&mut self, dt: Duration) -> Vec<GameEvent> {
        let mut events = vec![];
        let dt_ms = u32::try_from(dt.as_millis()).unwrap_or(u32::MAX);

        if self.state == SessionState::Running {
            self.elapsed += dt;
            if self.elapsed.as_secs_f64() >= self.time_limit as f64 {
                self.elapsed = Duration::from_secs(u64::from(self.time_limit));
                self.state = SessionState::Ended(Outcome::Lost);
                self.board.stop_transits();
                info!("time up on '{}'", self.level.name);
                events.push(GameEvent::TimeUp);
                return events;
            }
        }

        self.board.tick_transits(dt_ms);
        events
    }

    /// Forward one directional input to the movement rules.
    pub fn handle_input(&mut self, dir: Direction) -> Vec<GameEvent> {
        if !self.accepts_input() {
            return vec![];
        }
        let player = match self.board.player() {
            Some(p) => p,
            None => return vec![],
        };

        let chain = match rules::attempt_move(&self.board, player, dir) {
            MoveOutcome::Blocked => return vec![GameEvent::MoveBlocked { dir }],
            MoveOutcome::Busy => return vec![],
            MoveOutcome::Started(chain) => chain,
        };

        if let Err(e) = self.board.commit(&chain.movers, dir, self.timing.move_time_ms) {
            error!("rejected resolved move: {e}");
            return vec![];
        }

        let mut events = Vec::with_capacity(3);
        let (px, py) = self.board.entity(chain.initiator()).pos();
        events.push(GameEvent::PlayerMoved { x: px, y: py });
        for &pushed in chain.pushed() {
            let (x, y) = self.board.entity(pushed).pos();
            let on_target = self.board.has_kind_at(EntityKind::WinArea, x, y);
            events.push(GameEvent::BoxPushed { x, y, on_target });
        }
        self.moves += 1;
        self.pushes += chain.pushed().len() as u32;

        self.check_completion(&mut events);
        events
    }

    /// Win check, run after every committed move.
    fn check_completion(&mut self, events: &mut Vec<GameEvent>) {
        if self.state != SessionState::Running || !self.board.is_solved() {
            return;
        }
        let elapsed = round_tenths(self.time_limit as f64 - self.time_remaining());
        self.state = SessionState::Ended(Outcome::Won { elapsed });
        info!("'{}' solved in {:.1}s ({} moves, {} pushes)",
            self.level.name, elapsed, self.moves, self.pushes);
        events.push(GameEvent::LevelWon { elapsed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level::parse_map;

    fn instant() -> TimingConfig {
        TimingConfig { tick_rate_ms: 50, move_time_ms: 0, default_time_limit: 120 }
    }

    fn session(text: &str) -> GameSession {
        GameSession::new(parse_map(text).unwrap(), &instant())
    }

    const ONE_BOX: &str = "name=One\ntimeLimit=30\nmap=\n#####\n#p b X#\n#####\n";

    #[test]
    fn not_started_ignores_input() {
        let mut s = session(ONE_BOX);
        assert_eq!(s.state(), SessionState::NotStarted);
        assert!(!s.accepts_input());
        assert!(s.handle_input(Direction::Right).is_empty());
        assert_eq!(s.board().player_pos(), Some((1, 1)));
        // Countdown does not run before begin.
        s.tick(Duration::from_secs(100));
        assert_eq!(s.time_remaining(), 30.0);
        assert!(!s.is_ended());
    }

    #[test]
    fn begin_only_once() {
        let mut s = session(ONE_BOX);
        assert_eq!(s.begin(), vec![GameEvent::SessionStarted { time_limit: 30 }]);
        assert!(s.started() && s.accepts_input());
        assert!(s.begin().is_empty());
    }

    #[test]
    fn end_to_end_win() {
        let mut s = session(ONE_BOX);
        s.begin();
        s.tick(Duration::from_millis(1200));
        let ev = s.handle_input(Direction::Right);
        assert_eq!(ev, vec![GameEvent::PlayerMoved { x: 2, y: 1 }]);
        s.tick(Duration::from_millis(1240));
        let ev = s.handle_input(Direction::Right);
        assert_eq!(ev, vec![
            GameEvent::PlayerMoved { x: 3, y: 1 },
            GameEvent::BoxPushed { x: 4, y: 1, on_target: false },
        ]);
        s.tick(Duration::from_millis(700));
        let remaining = s.time_remaining();
        let ev = s.handle_input(Direction::Right);
        assert!(ev.contains(&GameEvent::BoxPushed { x: 5, y: 1, on_target: true }));

        // 30 - remaining = 3.14 -> 3.1
        let expected = round_tenths(30.0 - remaining);
        assert_eq!(expected, 3.1);
        assert!(ev.contains(&GameEvent::LevelWon { elapsed: expected }));
        assert_eq!(s.elapsed_on_win(), Some(expected));
        assert_eq!(s.outcome(), Some(Outcome::Won { elapsed: expected }));
        assert!(!s.accepts_input());
        assert_eq!((s.moves(), s.pushes()), (3, 2));
    }

    #[test]
    fn countdown_stops_after_win() {
        let mut s = session("timeLimit=10\nmap=\n#pbX#\n");
        s.begin();
        s.tick(Duration::from_secs(2));
        s.handle_input(Direction::Right);
        assert_eq!(s.elapsed_on_win(), Some(2.0));
        assert!(s.tick(Duration::from_secs(60)).is_empty());
        assert_eq!(s.time_remaining(), 8.0);
        assert_eq!(s.elapsed_on_win(), Some(2.0));
    }

    #[test]
    fn timeout_loses_once() {
        let mut s = session(ONE_BOX);
        s.begin();
        assert!(s.tick(Duration::from_secs(29)).is_empty());
        assert_eq!(s.tick(Duration::from_millis(1500)), vec![GameEvent::TimeUp]);
        assert_eq!(s.outcome(), Some(Outcome::Lost));
        assert_eq!(s.time_remaining(), 0.0);
        assert!(!s.accepts_input());

        // Duplicate / late ticks never re-trigger the transition.
        assert!(s.tick(Duration::from_millis(100)).is_empty());
        assert!(s.tick(Duration::ZERO).is_empty());
        assert_eq!(s.outcome(), Some(Outcome::Lost));
        assert!(s.handle_input(Direction::Right).is_empty());
    }

    #[test]
    fn blocked_move_reports_and_keeps_position() {
        let mut s = session("timeLimit=10\nmap=\n#pb#\n");
        s.begin();
        assert_eq!(s.handle_input(Direction::Right), vec![GameEvent::MoveBlocked { dir: Direction::Right }]);
        assert_eq!(s.board().player_pos(), Some((1, 0)));
        assert_eq!(s.moves(), 0);
    }

    #[test]
    fn partial_solution_is_not_a_win() {
        let mut s = session("timeLimit=60\nmap=\n#######\n#pb XB#\n#######\n");
        s.begin();
        // Box already on target at (5,1); the other one is one push short.
        s.handle_input(Direction::Right);
        assert!(!s.is_ended());
        s.handle_input(Direction::Right);
        assert_eq!(s.top_entity_at(4, 1), Some(EntityKind::Box));
        assert!(s.is_ended());
    }

    #[test]
    fn move_animation_debounces_input() {
        let timing = TimingConfig { move_time_ms: 60, ..instant() };
        // The box sits off the walking path so no step solves the level.
        let text = "timeLimit=60\nmap=\n######\n#p   #\n##b###\n##X###\n";
        let mut s = GameSession::new(parse_map(text).unwrap(), &timing);
        s.begin();
        assert_eq!(s.handle_input(Direction::Right), vec![GameEvent::PlayerMoved { x: 2, y: 1 }]);
        // Second press during the animation is dropped, not queued.
        assert!(s.handle_input(Direction::Right).is_empty());
        assert_eq!(s.board().player_pos(), Some((2, 1)));

        s.tick(Duration::from_millis(60));
        assert_eq!(s.handle_input(Direction::Right), vec![GameEvent::PlayerMoved { x: 3, y: 1 }]);
        assert_eq!(s.board().player_pos(), Some((3, 1)));
        assert!(s.accepts_input());
    }

    #[test]
    fn boxless_map_is_won_on_first_step() {
        let mut s = session("timeLimit=60\nmap=\n#p #\n");
        s.begin();
        assert_eq!(
            s.handle_input(Direction::Right),
            vec![GameEvent::PlayerMoved { x: 2, y: 0 }, GameEvent::LevelWon { elapsed: 0.0 }],
        );
        assert!(s.is_ended());
        assert_eq!(s.elapsed_on_win(), Some(0.0));
    }

    #[test]
    fn restart_gives_fresh_session() {
        let mut s = session(ONE_BOX);
        s.begin();
        s.tick(Duration::from_secs(5));
        s.handle_input(Direction::Right);
        s.handle_input(Direction::Right);

        let fresh = s.restart();
        assert_eq!(fresh.state(), SessionState::NotStarted);
        assert_eq!(fresh.time_remaining(), 30.0);
        assert_eq!(fresh.board().player_pos(), Some((1, 1)));
        assert_eq!(fresh.top_entity_at(3, 1), Some(EntityKind::Box));
        assert_eq!(fresh.map_info(), s.map_info());
        assert_eq!(fresh.moves(), 0);
    }

    #[test]
    fn missing_time_limit_uses_default() {
        let s = session("map=\n#pbX#\n");
        assert_eq!(s.time_limit(), 120);
    }

    #[test]
    fn no_player_never_moves() {
        let mut s = session("timeLimit=5\nmap=\n#bX#\n");
        s.begin();
        assert!(s.handle_input(Direction::Left).is_empty());
        assert!(!s.is_ended());
    }

    #[test]
    fn rounding_is_one_decimal() {
        assert_eq!(round_tenths(3.14), 3.1);
        assert_eq!(round_tenths(3.15000001), 3.2);
        assert_eq!(round_tenths(0.0), 0.0);
        assert_eq!(round_tenths(29.96), 30.0);
    }
}
