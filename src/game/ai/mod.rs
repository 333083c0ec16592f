//! Chess AI opponent and analysis engines
//!
//! Engines run outside the session state machine. Controllers ask them for
//! moves or evaluations and feed the answers back as ordinary commands, so a
//! slow or crashed engine can never corrupt a session.
//!
//! # Architecture
//!
//! - [`ChessEngine`]: async seam every engine implements
//! - [`UciEngine`]: external UCI process (Stockfish) driven by a worker task
//! - [`ScriptedEngine`]: deterministic in-process engine for offline play and tests
//! - [`AiOpponent`] / [`AIDifficulty`]: which side the engine plays and how long it thinks
//! - [`AnalysisTracker`]: discards evaluations that arrive for a stale position
//!
//! # Integration Strategy
//!
//! The session's FEN is the source of truth. Before asking the engine:
//! 1. Read the FEN from the session snapshot
//! 2. Await the engine's answer
//! 3. Submit the answer through `SessionManager::apply_command`
//!
//! This ensures AI moves follow the same validation rules as human moves.

pub mod analysis;
pub mod engine;
pub mod resource;
pub mod scripted;
pub mod uci;

// Re-export for convenience
pub use analysis::{AnalysisTicket, AnalysisTracker};
pub use engine::{
    AnalysisLine, AnalysisOptions, ChessEngine, Evaluation, ProgressFn, Score, SearchLimits,
    MATE_SCORE,
};
pub use resource::{AIDifficulty, AiOpponent};
pub use scripted::ScriptedEngine;
pub use uci::UciEngine;
