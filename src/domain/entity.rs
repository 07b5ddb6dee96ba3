/// Entities: one placed instance of an `EntityKind` on the grid,
/// plus the movement direction and the in-flight move animation.

use super::tile::EntityKind;

/// Movement direction (one cell per accepted input).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Clockwise from up. Floodfill visits neighbours in this order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Left => "left",
        }
    }

    /// Step `(x, y)` one cell. None if the result leaves a `width` x `height` board.
    pub fn step(self, x: usize, y: usize, width: usize, height: usize) -> Option<(usize, usize)> {
        let (nx, ny) = match self {
            Direction::Up => (x, y.checked_sub(1)?),
            Direction::Down => (x, y + 1),
            Direction::Left => (x.checked_sub(1)?, y),
            Direction::Right => (x + 1, y),
        };
        if nx < width && ny < height {
            Some((nx, ny))
        } else {
            None
        }
    }
}

/// Index of an entity inside its board.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct EntityId(pub usize);

/// Presentation-only move animation.
///
/// The logical position is committed before a transit starts; the
/// renderer uses `progress()` to draw the entity between `from` and
/// its current cell. While a transit is active the entity refuses
/// new moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transit {
    pub dir: Direction,
    pub elapsed_ms: u32,
    pub duration_ms: u32,
}

impl Transit {
    pub fn new(dir: Direction, duration_ms: u32) -> Self {
        Transit { dir, elapsed_ms: 0, duration_ms }
    }

    /// 0.0 = just left the previous cell, 1.0 = arrived.
    pub fn progress(&self) -> f32 {
        if self.duration_ms == 0 { return 1.0; }
        (self.elapsed_ms as f32 / self.duration_ms as f32).min(1.0)
    }

    /// Advance by `dt_ms`. Returns true once the animation is finished.
    pub fn advance(&mut self, dt_ms: u32) -> bool {
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        self.elapsed_ms >= self.duration_ms
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub x: usize,
    pub y: usize,
    pub transit: Option<Transit>,
}

impl Entity {
    pub fn new(kind: EntityKind, x: usize, y: usize) -> Self {
        Entity { kind, x, y, transit: None }
    }

    pub fn pos(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    pub fn in_transit(&self) -> bool {
        self.transit.is_some()
    }

    /// Move one cell and, if `animate_ms > 0`, start a transit.
    /// Callers have already validated the target cell.
    pub fn commit_step(&mut self, to: (usize, usize), dir: Direction, animate_ms: u32) {
        self.x = to.0;
        self.y = to.1;
        self.transit = if animate_ms > 0 {
            Some(Transit::new(dir, animate_ms))
        } else {
            None
        };
    }

    /// Advance the transit, clearing it when done.
    pub fn tick_transit(&mut self, dt_ms: u32) {
        if let Some(t) = self.transit.as_mut() {
            if t.advance(dt_ms) {
                self.transit = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_stays_on_board() {
        assert_eq!(Direction::Up.step(0, 0, 3, 3), None);
        assert_eq!(Direction::Left.step(0, 2, 3, 3), None);
        assert_eq!(Direction::Right.step(2, 0, 3, 3), None);
        assert_eq!(Direction::Down.step(1, 2, 3, 3), None);
        assert_eq!(Direction::Right.step(1, 1, 3, 3), Some((2, 1)));
        assert_eq!(Direction::Up.step(1, 1, 3, 3), Some((1, 0)));
    }

    #[test]
    fn step_agrees_with_offset() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.offset();
            let (nx, ny) = dir.step(5, 5, 10, 10).unwrap();
            assert_eq!(nx as i32 - 5, dx);
            assert_eq!(ny as i32 - 5, dy);
        }
    }

    #[test]
    fn transit_lifecycle() {
        let mut e = Entity::new(EntityKind::Box, 1, 1);
        e.commit_step((2, 1), Direction::Right, 60);
        assert_eq!(e.pos(), (2, 1));
        assert!(e.in_transit());

        e.tick_transit(30);
        let p = e.transit.unwrap().progress();
        assert!((p - 0.5).abs() < 0.01);

        e.tick_transit(30);
        assert!(!e.in_transit());
    }

    #[test]
    fn zero_duration_skips_transit() {
        let mut e = Entity::new(EntityKind::Player, 0, 0);
        e.commit_step((0, 1), Direction::Down, 0);
        assert!(!e.in_transit());
        // Ticking an idle entity is a no-op.
        e.tick_transit(100);
        assert!(!e.in_transit());
    }
}
