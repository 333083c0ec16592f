//! Session commands
//!
//! [`Command`] is the closed set of mutations a session accepts. Controllers
//! never touch [`super::SessionState`] fields; they build a command and hand it
//! to [`super::SessionManager::apply_command`].

use crate::game::error::CommandError;
use crate::game::resources::GameOutcome;
use crate::game::resources::game_over::{GameOverReason, Winner};
use crate::game::rules::MoveRequest;
use crate::game::session::lifecycle::LifecycleEvent;
use crate::game::session::state::{ClockState, ModeState};
use crate::game::types::{OpponentType, PieceColor, PieceType, Square, TimeControl};
use serde::Serialize;

/// A mutation request against one session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate and apply a local move
    ApplyMove {
        from: Square,
        to: Square,
        promotion: Option<PieceType>,
    },
    /// Apply a local move provisionally until the server answers
    OptimisticMove {
        from: Square,
        to: Square,
        promotion: Option<PieceType>,
    },
    /// Server accepted the outstanding move
    ConfirmMove {
        server_fen: String,
        white_time_ms: i64,
        black_time_ms: i64,
    },
    /// Server refused the outstanding move
    RejectMove { server_fen: String, reason: String },
    /// Server-validated opponent move
    OpponentMove {
        from: Square,
        to: Square,
        promotion: Option<PieceType>,
        san: String,
        fen: String,
    },
    EndGame {
        reason: GameOverReason,
        winner: Winner,
        eval_score: Option<i32>,
    },
    Resign { resigning_side: PieceColor },
    TakeBack { player_color: PieceColor },
    NavigateHistory { target_index: i32 },
    SyncState(StatePatch),
    UpdateModeState(ModeState),
}

impl Command {
    pub fn apply_move(request: MoveRequest) -> Self {
        Command::ApplyMove {
            from: request.from,
            to: request.to,
            promotion: request.promotion,
        }
    }

    pub fn optimistic_move(request: MoveRequest) -> Self {
        Command::OptimisticMove {
            from: request.from,
            to: request.to,
            promotion: request.promotion,
        }
    }

    pub fn end_game(outcome: GameOutcome) -> Self {
        Command::EndGame {
            reason: outcome.reason,
            winner: outcome.winner,
            eval_score: None,
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::ApplyMove { .. } => CommandKind::ApplyMove,
            Command::OptimisticMove { .. } => CommandKind::OptimisticMove,
            Command::ConfirmMove { .. } => CommandKind::ConfirmMove,
            Command::RejectMove { .. } => CommandKind::RejectMove,
            Command::OpponentMove { .. } => CommandKind::OpponentMove,
            Command::EndGame { .. } => CommandKind::EndGame,
            Command::Resign { .. } => CommandKind::Resign,
            Command::TakeBack { .. } => CommandKind::TakeBack,
            Command::NavigateHistory { .. } => CommandKind::NavigateHistory,
            Command::SyncState(_) => CommandKind::SyncState,
            Command::UpdateModeState(_) => CommandKind::UpdateModeState,
        }
    }
}

/// Payload-free tag of a [`Command`], carried by change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    ApplyMove,
    OptimisticMove,
    ConfirmMove,
    RejectMove,
    OpponentMove,
    EndGame,
    Resign,
    TakeBack,
    NavigateHistory,
    SyncState,
    UpdateModeState,
}

/// Replace the game with `initial_fen` followed by `moves`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionReset {
    pub initial_fen: String,
    pub moves: Vec<MoveRequest>,
}

impl PositionReset {
    pub fn at(fen: impl Into<String>) -> Self {
        Self {
            initial_fen: fen.into(),
            moves: Vec::new(),
        }
    }
}

/// Bulk patch for [`Command::SyncState`]
///
/// `None` fields are left alone. `move_error: Some(None)` clears the error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub lifecycle: Option<LifecycleEvent>,
    pub position: Option<PositionReset>,
    pub player_color: Option<PieceColor>,
    pub opponent_type: Option<OpponentType>,
    pub time_control: Option<TimeControl>,
    pub clock: Option<ClockState>,
    pub move_error: Option<Option<String>>,
    /// Ends a game in progress; ignored once an outcome is recorded
    pub outcome: Option<GameOutcome>,
}

/// Result of [`super::SessionManager::apply_command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub error: Option<CommandError>,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: CommandError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    /// Display text of the failure, if any
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    pub fn into_result(self) -> Result<(), CommandError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl From<Result<(), CommandError>> for CommandOutcome {
    fn from(result: Result<(), CommandError>) -> Self {
        match result {
            Ok(()) => CommandOutcome::ok(),
            Err(e) => CommandOutcome::failed(e),
        }
    }
}
