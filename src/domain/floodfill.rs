/// Floor derivation.
///
/// Map files only spell out walls, boxes, targets and the player.
/// Floor is whatever the player could walk to if boxes were not in the
/// way: a breadth-first fill from the player's cell that stops at walls
/// and at the board edge. Cells outside the walls stay empty.

use std::collections::{HashSet, VecDeque};

use log::debug;

use super::board::{Board, BoardError};
use super::entity::Direction;
use super::tile::EntityKind;

/// Place Floor on every cell reachable from the player. Returns the number
/// of floor tiles placed. No player, no floor.
pub fn fill_floor(board: &mut Board) -> Result<usize, BoardError> {
    let cells = reachable_cells(board);
    for &(x, y) in &cells {
        board.place(EntityKind::Floor, x, y)?;
    }
    debug!("floodfill placed {} floor tiles", cells.len());
    Ok(cells.len())
}

/// Cells reachable from the player through non-wall cells, in visit order.
pub fn reachable_cells(board: &Board) -> Vec<(usize, usize)> {
    let start = match board.player_pos() {
        Some(p) => p,
        None => return vec![],
    };

    let mut order = vec![];
    let mut visited: HashSet<(usize, usize)> = HashSet::new();
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    queue.push_back(start);

    while let Some((x, y)) = queue.pop_front() {
        if !visited.insert((x, y)) { continue; }
        if !board.in_bounds(x, y) || board.is_wall(x, y) { continue; }
        order.push((x, y));
        for dir in Direction::ALL {
            if let Some(next) = dir.step(x, y, board.width(), board.height()) {
                if !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
        }
    }

    order
}
