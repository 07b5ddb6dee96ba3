/// Movement rules, truth-table driven.
///
/// Resolution is a pure pass over an immutable board: it decides what
/// WOULD move and returns the push chain. Committing the chain is a
/// separate step (`Board::commit`), so a rejected move never leaves
/// half-applied state behind.
///
/// ## Move Truth Table
///
/// Evaluated top to bottom for the entity being moved; first match wins.
/// ┌──────────────────────────────────┬──────────────┬──────────────────┐
/// │ Condition                        │ Result       │ Notes            │
/// ├──────────────────────────────────┼──────────────┼──────────────────┤
/// │ kind cannot be moved             │ BLOCK        │ wall/floor/target│
/// │ target cell off the board        │ BLOCK        │ map edge         │
/// │ target cell empty                │ ALLOW        │                  │
/// │ top occupant can be moved through│ ALLOW        │ floor/target     │
/// │ initiator, occupant can move     │ ALLOW (push) │ chain of two     │
/// │ otherwise                        │ BLOCK        │ no domino pushes │
/// └──────────────────────────────────┴──────────────┴──────────────────┘
///
/// Only the initiator recurses, and only once, so a chain holds at most
/// the initiator plus one pushed entity. A visited check still guards the
/// recursion in case overlapping solid entities ever share a cell.
///
/// An allowed chain containing any entity that is still animating its
/// previous move is reported as `Busy` and dropped (input debounce).

use super::board::Board;
use super::entity::{Direction, EntityId};

/// Entities displaced by one accepted move, initiator first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushChain {
    pub dir: Direction,
    pub movers: Vec<EntityId>,
}

impl PushChain {
    pub fn initiator(&self) -> EntityId {
        self.movers[0]
    }

    /// Entities pushed by the initiator (empty for a plain step).
    pub fn pushed(&self) -> &[EntityId] {
        &self.movers[1..]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Rules forbid the move; nothing changes.
    Blocked,
    /// Legal, but part of the chain is still in transit; ignored.
    Busy,
    /// Legal; commit the chain.
    Started(PushChain),
}

/// Resolve a move of `id` in `dir` as an initiator.
pub fn attempt_move(board: &Board, id: EntityId, dir: Direction) -> MoveOutcome {
    let mut movers = Vec::with_capacity(2);
    if !can_move(board, id, dir, true, &mut movers) {
        return MoveOutcome::Blocked;
    }
    if movers.iter().any(|&m| board.entity(m).in_transit()) {
        return MoveOutcome::Busy;
    }
    MoveOutcome::Started(PushChain { dir, movers })
}

/// Truth table above. On success `chain` holds `id` followed by whatever
/// it pushes.
fn can_move(
    board: &Board,
    id: EntityId,
    dir: Direction,
    initiator: bool,
    chain: &mut Vec<EntityId>,
) -> bool {
    if chain.contains(&id) { return false; }

    let e = board.entity(id);
    if !e.kind.can_be_moved() { return false; }

    let (tx, ty) = match dir.step(e.x, e.y, board.width(), board.height()) {
        Some(t) => t,
        None => return false,
    };

    let occupant = match board.top_entity_at(tx, ty) {
        Some(o) => o,
        None => {
            chain.push(id);
            return true;
        }
    };

    if board.entity(occupant).kind.can_move_through() {
        chain.push(id);
        return true;
    }

    if !initiator { return false; }

    chain.push(id);
    if can_move(board, occupant, dir, false, chain) {
        true
    } else {
        chain.clear();
        false
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
