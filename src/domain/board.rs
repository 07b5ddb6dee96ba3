/// Board: the grid extents plus every placed entity.
///
/// ## Ownership
///
/// The board owns all entities in one `Vec<Entity>`; an `EntityId` is an
/// index into it. The player is referenced by id, never stored twice.
/// Entities are never removed while a board lives, so ids stay valid.
///
/// ## Occupancy
///
/// Several entities may share a cell (floor under a box under nothing,
/// win-area under the player, ...). `top_entity_at` resolves the cell to
/// its highest-priority occupant: Player > Box > WinArea > Wall > Floor.

use thiserror::Error;

use super::entity::{Direction, Entity, EntityId};
use super::tile::EntityKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("cell ({x}, {y}) is outside the {width}x{height} board")]
    OutOfBounds { x: usize, y: usize, width: usize, height: usize },
    #[error("board already has a player at ({x}, {y})")]
    DuplicatePlayer { x: usize, y: usize },
    #[error("{0:?} cannot leave the board moving {1:?}")]
    StepOffBoard(EntityId, Direction),
}

#[derive(Clone, Debug)]
pub struct Board {
    width: usize,
    height: usize,
    entities: Vec<Entity>,
    player: Option<EntityId>,
}

// ── Construction ──

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Board { width, height, entities: Vec::new(), player: None }
    }

    /// Stamp a new entity of `kind` at `(x, y)`.
    pub fn place(&mut self, kind: EntityKind, x: usize, y: usize) -> Result<EntityId, BoardError> {
        if !self.in_bounds(x, y) {
            return Err(BoardError::OutOfBounds { x, y, width: self.width, height: self.height });
        }
        if kind == EntityKind::Player {
            if let Some(p) = self.player {
                let (px, py) = self.entity(p).pos();
                return Err(BoardError::DuplicatePlayer { x: px, y: py });
            }
        }
        let id = EntityId(self.entities.len());
        self.entities.push(Entity::new(kind, x, y));
        if kind == EntityKind::Player {
            self.player = Some(id);
        }
        Ok(id)
    }
}

// ── Queries ──

impl Board {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    pub fn player_pos(&self) -> Option<(usize, usize)> {
        self.player.map(|id| self.entity(id).pos())
    }

    /// All entities of one kind, in placement order.
    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn has_kind_at(&self, kind: EntityKind, x: usize, y: usize) -> bool {
        self.of_kind(kind).any(|e| e.x == x && e.y == y)
    }

    #[inline]
    pub fn is_wall(&self, x: usize, y: usize) -> bool {
        self.has_kind_at(EntityKind::Wall, x, y)
    }

    /// Highest-priority entity on `(x, y)`. First placed wins a tie.
    pub fn top_entity_at(&self, x: usize, y: usize) -> Option<EntityId> {
        let mut best: Option<(EntityId, u8)> = None;
        for (i, e) in self.entities.iter().enumerate() {
            if e.x != x || e.y != y { continue; }
            let prio = e.kind.priority();
            if best.map_or(true, |(_, p)| prio > p) {
                best = Some((EntityId(i), prio));
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn top_kind_at(&self, x: usize, y: usize) -> Option<EntityKind> {
        self.top_entity_at(x, y).map(|id| self.entity(id).kind)
    }

    /// Every box sits on some win area. Vacuously true with no boxes.
    pub fn is_solved(&self) -> bool {
        self.of_kind(EntityKind::Box)
            .all(|b| self.has_kind_at(EntityKind::WinArea, b.x, b.y))
    }

    pub fn boxes_on_target(&self) -> usize {
        self.of_kind(EntityKind::Box)
            .filter(|b| self.has_kind_at(EntityKind::WinArea, b.x, b.y))
            .count()
    }
}

// ── Mutation ──

impl Board {
    /// Move every entity of `chain` one cell in `dir`.
    ///
    /// All targets are computed before anything changes, so a chain
    /// that would leave the board is rejected as a whole.
    pub fn commit(&mut self, chain: &[EntityId], dir: Direction, animate_ms: u32) -> Result<(), BoardError> {
        let mut targets = Vec::with_capacity(chain.len());
        for &id in chain {
            let (x, y) = self.entity(id).pos();
            let to = dir.step(x, y, self.width, self.height)
                .ok_or(BoardError::StepOffBoard(id, dir))?;
            targets.push((id, to));
        }
        for (id, to) in targets {
            self.entities[id.0].commit_step(to, dir, animate_ms);
        }
        Ok(())
    }

    /// Advance every in-flight move animation.
    pub fn tick_transits(&mut self, dt_ms: u32) {
        for e in &mut self.entities {
            e.tick_transit(dt_ms);
        }
    }

    /// Drop all animations (the session ended; nothing left to show moving).
    pub fn stop_transits(&mut self) {
        for e in &mut self.entities {
            e.transit = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_rejects_out_of_bounds() {
        let mut b = Board::new(2, 2);
        assert!(b.place(EntityKind::Wall, 1, 1).is_ok());
        assert_eq!(
            b.place(EntityKind::Wall, 2, 0),
            Err(BoardError::OutOfBounds { x: 2, y: 0, width: 2, height: 2 })
        );
    }

    #[test]
    fn single_player_only() {
        let mut b = Board::new(3, 1);
        let p = b.place(EntityKind::Player, 0, 0).unwrap();
        assert_eq!(b.player(), Some(p));
        assert_eq!(
            b.place(EntityKind::Player, 2, 0),
            Err(BoardError::DuplicatePlayer { x: 0, y: 0 })
        );
        assert_eq!(b.count(EntityKind::Player), 1);
    }

    #[test]
    fn top_entity_priority() {
        let mut b = Board::new(1, 1);
        b.place(EntityKind::Floor, 0, 0).unwrap();
        assert_eq!(b.top_kind_at(0, 0), Some(EntityKind::Floor));
        b.place(EntityKind::WinArea, 0, 0).unwrap();
        assert_eq!(b.top_kind_at(0, 0), Some(EntityKind::WinArea));
        b.place(EntityKind::Box, 0, 0).unwrap();
        assert_eq!(b.top_kind_at(0, 0), Some(EntityKind::Box));
        b.place(EntityKind::Player, 0, 0).unwrap();
        assert_eq!(b.top_kind_at(0, 0), Some(EntityKind::Player));
    }

    #[test]
    fn empty_cell_has_no_top() {
        let b = Board::new(2, 2);
        assert_eq!(b.top_entity_at(1, 1), None);
    }

    #[test]
    fn solved_needs_every_box() {
        let mut b = Board::new(3, 1);
        b.place(EntityKind::WinArea, 0, 0).unwrap();
        b.place(EntityKind::WinArea, 1, 0).unwrap();
        b.place(EntityKind::Box, 0, 0).unwrap();
        let stray = b.place(EntityKind::Box, 2, 0).unwrap();
        assert!(!b.is_solved());
        assert_eq!(b.boxes_on_target(), 1);

        b.commit(&[stray], Direction::Left, 0).unwrap();
        assert!(b.is_solved());

        // Pull it back off: no longer solved.
        b.commit(&[stray], Direction::Right, 0).unwrap();
        assert!(!b.is_solved());
    }

    #[test]
    fn commit_is_all_or_nothing() {
        let mut b = Board::new(2, 1);
        let p = b.place(EntityKind::Player, 0, 0).unwrap();
        let bx = b.place(EntityKind::Box, 1, 0).unwrap();
        assert_eq!(
            b.commit(&[p, bx], Direction::Right, 0),
            Err(BoardError::StepOffBoard(bx, Direction::Right))
        );
        assert_eq!(b.entity(p).pos(), (0, 0));
        assert_eq!(b.entity(bx).pos(), (1, 0));
    }
}
