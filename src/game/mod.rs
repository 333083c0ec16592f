//! Chess game logic - sessions, rules and the collaborators around them
//!
//! The session state machine sits in the middle; everything else either
//! feeds it (rules oracle, engine, clock, transport) or drives it (mode
//! controllers).
//!
//! # Module Organization
//!
//! - `types` - Board vocabulary (squares, colors, pieces, time controls)
//! - `rules` - Move-legality oracle over FEN strings, PGN import/export
//! - `resources` - Plain game records (history, captures, outcome, clock state)
//! - `session` - Lifecycle, commands, reducer, manager and event bus
//! - `ai` - Engine seam, UCI worker, scripted engine, analysis tracking
//! - `systems` - Runtime drivers (the ticking clock)
//! - `modes` - Play, training, puzzle and analysis controllers
//! - `error` - Error enums for all of the above
//!
//! # Dependency Order
//!
//! ```text
//! rules ◄── session ◄── session::manager ◄── modes
//!                                              │
//!                          ai, systems ◄───────┘
//! ```

pub mod ai;
pub mod error;
pub mod modes;
pub mod resources;
pub mod rules;
pub mod session;
pub mod systems;
pub mod types;

pub use error::{CommandError, EngineError, RulesError, TransitionError};
pub use session::{Command, CommandOutcome, SessionConfig, SessionManager, SessionView};
