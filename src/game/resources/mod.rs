//! Plain game data owned by a session
//!
//! - [`captured`] - Pieces taken by each side and the material balance
//! - [`history`] - Played plies
//! - [`game_over`] - Final result of a game
//! - [`timer`] - Pure chess clock state

pub mod captured;
pub mod game_over;
pub mod history;
pub mod timer;

pub use captured::CapturedPieces;
pub use game_over::{GameOutcome, GameOverReason, Winner};
pub use history::{MoveHistory, MoveRecord};
pub use timer::{GameTimer, TICK_INTERVAL_MS};
