//! Serpent game crate: arena state machine plus the terminal front end.

#![forbid(unsafe_code)]

pub mod snake;
pub mod tui;

pub use snake::{Game, ARENA_HEIGHT, ARENA_WIDTH};
