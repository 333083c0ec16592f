//! Read model handed to controllers and the CLI
//!
//! Display hints (`last_move`, `checked_king_square`, `side_to_move`,
//! material balance) are derived here on every read and never stored in the
//! session.

use crate::game::resources::game_over::{GameOverReason, Winner};
use crate::game::rules::{fen_side_to_move, RulesOracle};
use crate::game::session::lifecycle::Lifecycle;
use crate::game::session::state::{ClockState, ModeState, SessionState};
use crate::game::types::{
    GameMode, OpponentType, PieceColor, PieceType, SessionId, Square, TimeControl,
};
use serde::Serialize;

/// Squares of the move that produced the displayed position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LastMove {
    pub from: Square,
    pub to: Square,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: SessionId,
    pub mode: GameMode,
    pub player_color: PieceColor,
    pub opponent_type: OpponentType,
    pub time_control: Option<TimeControl>,
    pub lifecycle: Lifecycle,
    pub lifecycle_error: Option<String>,

    pub initial_fen: String,
    pub fen: String,
    pub view_fen: String,
    pub view_move_index: i32,
    pub is_viewing_history: bool,
    pub move_history: Vec<String>,
    pub has_pending_move: bool,

    pub last_move: Option<LastMove>,
    pub checked_king_square: Option<Square>,
    pub side_to_move: Option<PieceColor>,

    pub captured_white: Vec<PieceType>,
    pub captured_black: Vec<PieceType>,
    pub material_advantage: i32,

    pub is_game_over: bool,
    pub game_over_reason: Option<GameOverReason>,
    pub game_winner: Option<Winner>,
    pub final_eval: Option<i32>,

    pub move_error: Option<String>,
    pub clock: Option<ClockState>,
    pub mode_state: ModeState,
}

impl SessionView {
    pub fn derive(state: &SessionState, oracle: &dyn RulesOracle) -> Self {
        let history = state.history();
        let captured = state.captured();
        let is_viewing_history = state.view_move_index != history.len() as i32 - 1;

        let last_move = usize::try_from(state.view_move_index)
            .ok()
            .and_then(|index| history.get(index))
            .map(|record| LastMove {
                from: record.from,
                to: record.to,
            });

        Self {
            session_id: state.session_id,
            mode: state.mode,
            player_color: state.player_color,
            opponent_type: state.opponent_type,
            time_control: state.time_control,
            lifecycle: state.lifecycle,
            lifecycle_error: state.lifecycle_error.clone(),

            initial_fen: state.initial_fen.clone(),
            fen: state.fen().to_string(),
            view_fen: state.view_fen.clone(),
            view_move_index: state.view_move_index,
            is_viewing_history,
            move_history: history.sans(),
            has_pending_move: state.has_pending_move(),

            last_move,
            checked_king_square: oracle.checked_king(&state.view_fen),
            side_to_move: fen_side_to_move(state.fen()),

            captured_white: captured.white_captured.clone(),
            captured_black: captured.black_captured.clone(),
            material_advantage: captured.material_advantage(),

            is_game_over: state.is_game_over(),
            game_over_reason: state.outcome.map(|o| o.reason),
            game_winner: state.outcome.map(|o| o.winner),
            final_eval: state.final_eval,

            move_error: state.move_error.clone(),
            clock: state.clock,
            mode_state: state.mode_state.clone(),
        }
    }

    /// Whether the local player may move right now
    ///
    /// Mirrors the controller turn guard.
    pub fn is_player_turn(&self) -> bool {
        self.lifecycle == Lifecycle::Playing
            && !self.is_game_over
            && !self.has_pending_move
            && self.side_to_move == Some(self.player_color)
    }
}
