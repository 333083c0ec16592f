//! Runtime drivers for the game
//!
//! Long-running tasks that feed a session from the outside world. They hold
//! no game state of their own beyond what they drive.
//!
//! - [`clock`] - tokio interval ticking the shared [`crate::game::resources::timer::GameTimer`]

pub mod clock;

pub use clock::Timer;
