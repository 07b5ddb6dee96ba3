/// Events emitted by the session.
/// The presentation layer consumes these for messages and highscore prompts.

use crate::domain::entity::Direction;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    SessionStarted { time_limit: u32 },
    PlayerMoved { x: usize, y: usize },
    BoxPushed { x: usize, y: usize, on_target: bool },
    MoveBlocked { dir: Direction },
    LevelWon { elapsed: f64 },
    TimeUp,
}
