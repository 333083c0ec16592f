//! XFChess game session core
//!
//! Authoritative state for chess games across play, training, puzzle and
//! analysis modes: lifecycle, move history, optimistic multiplayer
//! reconciliation, clocks, and the engine and server seams.

pub mod core;
pub mod game;
pub mod networking;
