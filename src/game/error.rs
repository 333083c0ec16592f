//! Error types for game module
//!
//! Provides custom error types for move validation, session commands,
//! lifecycle transitions and the engine worker. All of them are `Clone` so a
//! failed [`crate::game::session::CommandOutcome`] can be handed to any number
//! of observers.

use crate::game::session::lifecycle::Lifecycle;
use crate::game::types::{GameMode, SessionId, Square};

/// Errors raised by the rules oracle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    /// FEN could not be parsed or describes an impossible position
    #[error("Invalid FEN '{fen}': {message}")]
    InvalidFen { fen: String, message: String },

    /// Square text is not algebraic notation
    #[error("Invalid square: {0}")]
    InvalidSquare(String),

    /// Move text is not UCI notation
    #[error("Invalid move notation: {0}")]
    InvalidNotation(String),

    /// Move is not legal in the given position
    #[error("Illegal move: {from}{to}")]
    IllegalMove { from: Square, to: Square },

    /// SAN token in a PGN does not match a legal move
    #[error("Illegal move '{san}' at ply {ply}")]
    IllegalSan { san: String, ply: usize },

    /// PGN text is malformed
    #[error("Invalid PGN: {message}")]
    InvalidPgn { message: String },
}

/// Result type alias for rules operations
pub type RulesResult<T> = Result<T, RulesError>;

/// Invalid lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid lifecycle transition: {event} while {from}")]
    Invalid {
        from: Lifecycle,
        event: &'static str,
    },
}

/// Reasons a session command can fail
///
/// A failed command never leaves a partially mutated session behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Session was destroyed or never existed
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Command requires a game in progress
    #[error("No game in progress (lifecycle is {0})")]
    NotPlaying(Lifecycle),

    /// Rules oracle rejected the move or position
    #[error(transparent)]
    Rules(#[from] RulesError),

    /// Lifecycle event not allowed in the current state
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Move history is empty
    #[error("No move to take back")]
    NothingToTakeBack,

    /// An optimistic move is still awaiting server confirmation
    #[error("A move is already awaiting confirmation")]
    MovePending,

    /// Controller-level turn guard
    #[error("Not your turn")]
    NotYourTurn,

    /// Game already has a recorded result
    #[error("Game is already over")]
    GameAlreadyOver,

    /// Mode data variant does not belong to the session's mode
    #[error("Mode data does not match session mode {0:?}")]
    ModeMismatch(GameMode),

    /// Collaborator (engine, transport) failed while serving the command
    #[error("{0}")]
    External(String),
}

/// Result type alias for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors raised by chess engine workers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Engine process could not be started
    #[error("Engine failed to start: {0}")]
    Spawn(String),

    /// `init` has not completed
    #[error("Engine is not initialized")]
    NotInitialized,

    /// Engine spoke something other than UCI
    #[error("Engine protocol error: {0}")]
    Protocol(String),

    /// Pipe to the engine process broke
    #[error("Engine I/O error: {0}")]
    Io(String),

    /// Engine did not answer in time
    #[error("Engine timed out waiting for '{0}'")]
    Timeout(&'static str),

    /// A newer request replaced this one
    #[error("Analysis superseded by a newer request")]
    Superseded,

    /// Engine has been shut down
    #[error("Engine has been terminated")]
    Terminated,

    /// Position has no legal moves
    #[error("Engine returned no move")]
    NoMove,
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
