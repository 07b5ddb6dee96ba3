pub mod board;
pub mod entity;
pub mod floodfill;
pub mod rules;
pub mod tile;
