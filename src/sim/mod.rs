pub mod event;
pub mod highscore;
pub mod level;
pub mod session;
pub mod world;
