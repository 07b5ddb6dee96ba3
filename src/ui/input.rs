/// Input state tracker.
///
/// Collects the key presses delivered since the previous frame.
///   - Moves are per-press: one Press (or auto-repeat) is one move attempt.
///     Presses that land while a move is still animating are dropped by the
///     session, so holding a key walks at the animation pace.
///   - Release events are ignored.
///   - Raw events are kept for text entry (highscore name).

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::Direction;

pub const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w')];
pub const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s')];
pub const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a')];
pub const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d')];

pub struct InputState {
    /// Press/Repeat key codes from the most recent drain, in arrival order.
    presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for text entry.
    pub raw_events: Vec<KeyEvent>,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
        }
    }

    /// Drain all pending terminal events without blocking.
    /// Call this once per frame, before the session tick.
    pub fn drain_events(&mut self) {
        self.presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                self.raw_events.push(key);
                self.presses.push(key.code);
            }
        }
    }

    /// Was this key pressed this frame?
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.presses.contains(&code)
    }

    /// Convenience: was any of these keys pressed?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Directional presses this frame, in arrival order.
    pub fn directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.presses.iter().filter_map(|&code| direction_for(code))
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}

pub fn direction_for(code: KeyCode) -> Option<Direction> {
    if KEYS_UP.contains(&code) {
        Some(Direction::Up)
    } else if KEYS_DOWN.contains(&code) {
        Some(Direction::Down)
    } else if KEYS_LEFT.contains(&code) {
        Some(Direction::Left)
    } else if KEYS_RIGHT.contains(&code) {
        Some(Direction::Right)
    } else {
        None
    }
}
