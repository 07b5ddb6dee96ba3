/// Entity kinds and their properties.
/// Capabilities are queried via methods, not stored as flags,
/// so tile semantics are centralized here.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EntityKind {
    Wall,     // Solid, fixed
    Floor,    // Walkable, fixed; sits under everything else
    WinArea,  // Walkable target marker
    Box,      // Solid, pushable
    Player,   // Solid, moved by input
}

impl EntityKind {
    /// May another entity share this entity's cell?
    pub fn can_move_through(self) -> bool {
        matches!(self, EntityKind::Floor | EntityKind::WinArea)
    }

    /// Can this entity ever change position?
    pub fn can_be_moved(self) -> bool {
        matches!(self, EntityKind::Box | EntityKind::Player)
    }

    /// Stacking priority when several entities share a cell.
    /// Higher wins: Player > Box > WinArea > Wall > Floor.
    pub fn priority(self) -> u8 {
        match self {
            EntityKind::Floor => 0,
            EntityKind::Wall => 1,
            EntityKind::WinArea => 2,
            EntityKind::Box => 3,
            EntityKind::Player => 4,
        }
    }

    /// Entities stamped onto a cell by one map character.
    ///
    /// ```text
    /// '#' Wall        'p' Player       'b' Box
    /// 'X' WinArea     'B' Box+WinArea  'P' WinArea+Player
    /// ```
    /// Anything else places nothing; floodfill decides later whether it is floor.
    pub fn placements_for(ch: char) -> &'static [EntityKind] {
        match ch {
            '#' => &[EntityKind::Wall],
            'p' => &[EntityKind::Player],
            'b' => &[EntityKind::Box],
            'X' => &[EntityKind::WinArea],
            'B' => &[EntityKind::Box, EntityKind::WinArea],
            'P' => &[EntityKind::WinArea, EntityKind::Player],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EntityKind; 5] = [
        EntityKind::Floor,
        EntityKind::Wall,
        EntityKind::WinArea,
        EntityKind::Box,
        EntityKind::Player,
    ];

    #[test]
    fn capability_table() {
        use EntityKind::*;
        let walk: Vec<_> = ALL.iter().filter(|k| k.can_move_through()).collect();
        let push: Vec<_> = ALL.iter().filter(|k| k.can_be_moved()).collect();
        assert_eq!(walk, [&Floor, &WinArea]);
        assert_eq!(push, [&Box, &Player]);
    }

    #[test]
    fn priority_is_total_order() {
        use EntityKind::*;
        assert!(Player.priority() > Box.priority());
        assert!(Box.priority() > WinArea.priority());
        assert!(WinArea.priority() > Wall.priority());
        assert!(Wall.priority() > Floor.priority());
    }

    #[test]
    fn combined_placements() {
        assert_eq!(EntityKind::placements_for('B'), &[EntityKind::Box, EntityKind::WinArea]);
        assert_eq!(EntityKind::placements_for('P'), &[EntityKind::WinArea, EntityKind::Player]);
        assert!(EntityKind::placements_for(' ').is_empty());
        assert!(EntityKind::placements_for('?').is_empty());
    }
}
