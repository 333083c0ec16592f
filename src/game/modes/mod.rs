//! Game mode controllers
//!
//! Each controller wraps one session and translates user intent, engine
//! answers and server messages into [`Command`]s. Controllers own the rules
//! the session deliberately does not check, turn ownership first among them.
//!
//! # Architecture
//!
//! - [`play`] - [`PlayController`]: games against the engine or a remote opponent
//! - [`training`] - [`TrainingController`]: engine games with hints and move feedback
//! - [`puzzle`] - [`PuzzleController`]: solution checking and auto-played replies
//! - [`analyze`] - [`AnalyzeController`]: free position setup, branching and evaluation
//!
//! # Integration
//!
//! ```rust,ignore
//! let manager = Arc::new(SessionManager::with_default_rules());
//! let engine: Arc<dyn ChessEngine> = Arc::new(UciEngine::new("stockfish"));
//! let play = PlayController::vs_ai(manager.clone(), engine, SessionConfig::default(), AIDifficulty::Medium);
//! play.initialize().await;
//! play.make_move(MoveRequest::parse_uci("e2e4")?).await;
//! ```

pub mod analyze;
pub mod play;
pub mod puzzle;
pub mod training;

pub use analyze::AnalyzeController;
pub use play::PlayController;
pub use puzzle::{Puzzle, PuzzleController};
pub use training::TrainingController;

use crate::game::error::{CommandError, CommandResult};
use crate::game::rules::fen_side_to_move;
use crate::game::session::reducer::with_mode_state;
use crate::game::session::{Command, CommandOutcome, ModeState, SessionManager, SessionState};
use crate::game::types::SessionId;

/// Whether the local player may submit a move in `state`
///
/// The session trusts its caller on turn order; every controller runs this
/// guard before issuing a local move.
pub(crate) fn turn_guard(state: &SessionState) -> CommandResult<()> {
    if !state.lifecycle.is_playing() {
        return Err(CommandError::NotPlaying(state.lifecycle));
    }
    if state.is_game_over() {
        return Err(CommandError::GameAlreadyOver);
    }
    if state.has_pending_move() {
        return Err(CommandError::MovePending);
    }
    if fen_side_to_move(state.fen()) != Some(state.player_color) {
        return Err(CommandError::NotYourTurn);
    }
    Ok(())
}

/// Run [`turn_guard`] against a stored session
pub(crate) fn check_turn(manager: &SessionManager, session_id: SessionId) -> CommandResult<()> {
    manager
        .with_session(session_id, turn_guard)
        .unwrap_or(Err(CommandError::SessionNotFound(session_id)))
}

/// Rewrite the session's mode data through `f`; a no-op edit issues nothing
pub(crate) fn edit_mode_state(
    manager: &SessionManager,
    session_id: SessionId,
    f: impl FnOnce(&mut ModeState),
) -> CommandOutcome {
    let Some(state) = manager.snapshot(session_id) else {
        return CommandOutcome::failed(CommandError::SessionNotFound(session_id));
    };
    match with_mode_state(&state, f) {
        Some(mode_state) => manager.apply_command(session_id, Command::UpdateModeState(mode_state)),
        None => CommandOutcome::ok(),
    }
}
