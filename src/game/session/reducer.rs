//! Command reducer
//!
//! [`reduce`] applies one [`Command`] to a [`SessionState`]. It is called on a
//! scratch clone by the manager; an `Err` simply drops the clone, so the
//! reducer may bail out with `?` at any point without leaving a half-applied
//! session behind.
//!
//! # Guards
//!
//! | Command            | Lifecycle          | Extra                          |
//! |--------------------|--------------------|--------------------------------|
//! | `ApplyMove`        | playing            | no pending move                |
//! | `OptimisticMove`   | playing            | no pending move, no result     |
//! | `ConfirmMove`      | playing, ended     | server fen parses              |
//! | `RejectMove`       | playing, ended     | server fen parses              |
//! | `OpponentMove`     | playing            |                                |
//! | `EndGame`/`Resign` | playing            |                                |
//! | `TakeBack`         | playing            | no pending move, own ply       |
//! | `NavigateHistory`  | any                |                                |
//! | `SyncState`        | per lifecycle event| outcome: playing or ended      |
//! | `UpdateModeState`  | any                | variant matches session mode   |

use crate::game::error::{CommandError, CommandResult};
use crate::game::resources::game_over::GameOverReason;
use crate::game::resources::{CapturedPieces, GameOutcome, MoveRecord, Winner};
use crate::game::rules::{
    fen_side_to_move, material, replay, same_position, MoveRequest, RulesOracle,
};
use crate::game::session::command::{Command, StatePatch};
use crate::game::session::lifecycle::{Lifecycle, LifecycleEvent};
use crate::game::session::state::{ClockState, Line, ModeState, PositionState, SessionState};
use crate::game::types::{GameMode, PieceColor, PieceType, Square};
use tracing::{debug, warn};

/// Apply `command` to `state`
pub fn reduce(
    state: &mut SessionState,
    command: Command,
    oracle: &dyn RulesOracle,
) -> CommandResult<()> {
    match command {
        Command::ApplyMove {
            from,
            to,
            promotion,
        } => apply_move(state, request(from, to, promotion), oracle),
        Command::OptimisticMove {
            from,
            to,
            promotion,
        } => optimistic_move(state, request(from, to, promotion), oracle),
        Command::ConfirmMove {
            server_fen,
            white_time_ms,
            black_time_ms,
        } => confirm_move(state, &server_fen, white_time_ms, black_time_ms, oracle),
        Command::RejectMove { server_fen, reason } => {
            reject_move(state, &server_fen, reason, oracle)
        }
        Command::OpponentMove {
            from,
            to,
            promotion,
            san,
            fen,
        } => opponent_move(state, from, to, promotion, san, fen),
        Command::EndGame {
            reason,
            winner,
            eval_score,
        } => {
            require_playing(state)?;
            if state.outcome.is_none() {
                state.outcome = Some(GameOutcome::new(reason, winner));
            }
            state.final_eval = eval_score;
            transition(state, LifecycleEvent::EndGame)
        }
        Command::Resign { resigning_side } => {
            require_playing(state)?;
            state.outcome = Some(GameOutcome::new(
                GameOverReason::Resignation,
                Winner::side(resigning_side.opposite()),
            ));
            transition(state, LifecycleEvent::EndGame)
        }
        Command::TakeBack { player_color } => take_back(state, player_color, oracle),
        Command::NavigateHistory { target_index } => navigate(state, target_index, oracle),
        Command::SyncState(patch) => sync_state(state, patch, oracle),
        Command::UpdateModeState(mode_state) => {
            if mode_state.mode() != state.mode {
                return Err(CommandError::ModeMismatch(state.mode));
            }
            state.mode_state = mode_state;
            Ok(())
        }
    }
}

/// Run a lifecycle event against `state`
///
/// `START_GAME` out of `idle` clears the previous game; a retry out of `error`
/// keeps the position.
pub fn transition(state: &mut SessionState, event: LifecycleEvent) -> CommandResult<()> {
    let from = state.lifecycle;
    let next = from.next(&event)?;

    if from == Lifecycle::Idle && event == LifecycleEvent::StartGame {
        state.reset_for_new_game();
    }
    state.lifecycle_error = match event {
        LifecycleEvent::InitFailure(message) | LifecycleEvent::Fault(message) => Some(message),
        _ => None,
    };
    state.lifecycle = next;

    debug!("[SESSION] {} {} -> {}", state.session_id, from, next);
    Ok(())
}

fn request(from: Square, to: Square, promotion: Option<PieceType>) -> MoveRequest {
    MoveRequest {
        from,
        to,
        promotion,
    }
}

fn require_playing(state: &SessionState) -> CommandResult<()> {
    if state.lifecycle.is_playing() {
        Ok(())
    } else {
        Err(CommandError::NotPlaying(state.lifecycle))
    }
}

/// Server answers are still accepted after the game ended locally
fn require_live_or_ended(state: &SessionState) -> CommandResult<()> {
    match state.lifecycle {
        Lifecycle::Playing | Lifecycle::Ended => Ok(()),
        other => Err(CommandError::NotPlaying(other)),
    }
}

fn apply_move(
    state: &mut SessionState,
    request: MoveRequest,
    oracle: &dyn RulesOracle,
) -> CommandResult<()> {
    require_playing(state)?;
    if state.has_pending_move() {
        return Err(CommandError::MovePending);
    }

    if state.mode == GameMode::Analysis {
        // Moving from an earlier ply starts a new line from there. Mate and
        // draws do not end an analysis session.
        let applied = oracle.apply_move(&state.view_fen, &request)?;
        let keep = (state.view_move_index + 1) as usize;
        let mut history = state.history().clone();
        history.truncate(keep);

        let mut line = Line {
            fen: state.view_fen.clone(),
            captured: CapturedPieces::from_records(&history),
            history,
        };
        line.push(&applied);
        state.position = PositionState::Confirmed(line);
        state.view_tail();
        return Ok(());
    }

    if state.is_game_over() {
        return Err(CommandError::GameAlreadyOver);
    }

    let applied = oracle.apply_move(state.fen(), &request)?;
    let mut line = state.position.current().clone();
    line.push(&applied);
    state.position = PositionState::Confirmed(line);
    state.view_tail();

    if let Some(outcome) = applied.terminal() {
        debug!("[SESSION] {} terminal: {}", state.session_id, outcome.message());
        state.outcome = Some(outcome);
        transition(state, LifecycleEvent::EndGame)?;
    }
    Ok(())
}

fn optimistic_move(
    state: &mut SessionState,
    request: MoveRequest,
    oracle: &dyn RulesOracle,
) -> CommandResult<()> {
    require_playing(state)?;
    if state.has_pending_move() {
        return Err(CommandError::MovePending);
    }
    if state.is_game_over() {
        return Err(CommandError::GameAlreadyOver);
    }

    let confirmed = state.position.confirmed().clone();
    let applied = oracle.apply_move(&confirmed.fen, &request)?;
    let mut provisional = confirmed.clone();
    provisional.push(&applied);

    state.position = PositionState::Optimistic {
        confirmed,
        provisional,
    };
    state.view_tail();
    Ok(())
}

/// Overwrite the line's position with the server's when they disagree
fn reconcile(line: &mut Line, server_fen: String, session: &SessionState, context: &str) {
    if !same_position(&line.fen, &server_fen) {
        warn!(
            "[SESSION] {} desync on {}: local '{}' server '{}'",
            session.session_id, context, line.fen, server_fen
        );
    }
    if let Some(last) = line.history.last_move_mut() {
        last.fen_after = server_fen.clone();
    }
    line.fen = server_fen;
}

fn confirm_move(
    state: &mut SessionState,
    server_fen: &str,
    white_time_ms: i64,
    black_time_ms: i64,
    oracle: &dyn RulesOracle,
) -> CommandResult<()> {
    require_live_or_ended(state)?;
    let server_fen = oracle.load_fen(server_fen)?;

    if !state.has_pending_move() {
        debug!("[SESSION] {} confirm without pending move", state.session_id);
    }
    let mut line = state.position.clone().commit();
    reconcile(&mut line, server_fen, state, "confirm");

    state.position = PositionState::Confirmed(line);
    state.view_tail();
    state.clock = Some(ClockState::new(white_time_ms, black_time_ms));
    state.move_error = None;
    Ok(())
}

fn reject_move(
    state: &mut SessionState,
    server_fen: &str,
    reason: String,
    oracle: &dyn RulesOracle,
) -> CommandResult<()> {
    require_live_or_ended(state)?;
    let server_fen = oracle.load_fen(server_fen)?;

    let mut line = state.position.clone().rollback();
    if !same_position(&line.fen, &server_fen) {
        reconcile(&mut line, server_fen, state, "reject");
    }

    debug!("[SESSION] {} move rejected: {}", state.session_id, reason);
    state.position = PositionState::Confirmed(line);
    state.view_tail();
    state.move_error = Some(reason);
    Ok(())
}

fn opponent_move(
    state: &mut SessionState,
    from: Square,
    to: Square,
    promotion: Option<PieceType>,
    san: String,
    fen: String,
) -> CommandResult<()> {
    require_playing(state)?;
    if state.has_pending_move() {
        warn!(
            "[SESSION] {} opponent move arrived over a pending move; discarding it",
            state.session_id
        );
    }

    let mut line = state.position.clone().rollback();
    let mover = fen_side_to_move(&line.fen).unwrap_or_else(|| state.player_color.opposite());
    let captured = material::captured_piece(&line.fen, &fen, mover.opposite())?;

    line.push_record(MoveRecord {
        san,
        from,
        to,
        promotion,
        color: mover,
        captured,
        fen_after: fen,
    });
    state.position = PositionState::Confirmed(line);
    state.view_tail();
    state.move_error = None;
    Ok(())
}

/// Plies removed by a take-back
///
/// The player's own unanswered move goes alone; otherwise the opponent's reply
/// goes together with the player's move before it.
fn take_back_plies(last_mover: PieceColor, player_color: PieceColor, len: usize) -> usize {
    if last_mover == player_color {
        1
    } else {
        len.min(2)
    }
}

fn take_back(
    state: &mut SessionState,
    player_color: PieceColor,
    oracle: &dyn RulesOracle,
) -> CommandResult<()> {
    require_playing(state)?;
    if state.has_pending_move() {
        return Err(CommandError::MovePending);
    }
    let history = state.history();
    // Only the opponent has moved; popping that ply would leave nobody to move
    if !history.iter().any(|m| m.color == player_color) {
        return Err(CommandError::NothingToTakeBack);
    }
    let last = history.last_move().ok_or(CommandError::NothingToTakeBack)?;

    let keep = history.len() - take_back_plies(last.color, player_color, history.len());
    let requests = history.requests(keep);
    let applied = replay(oracle, &state.initial_fen, &requests)?;

    state.position = PositionState::Confirmed(Line::from_moves(&state.initial_fen, &applied));
    state.view_tail();
    Ok(())
}

fn navigate(
    state: &mut SessionState,
    target_index: i32,
    oracle: &dyn RulesOracle,
) -> CommandResult<()> {
    let len = state.history().len() as i32;
    let index = target_index.clamp(-1, len - 1);

    let fen = if index == -1 {
        state.initial_fen.clone()
    } else if index == len - 1 {
        state.fen().to_string()
    } else {
        let requests = state.history().requests(index as usize + 1);
        replay(oracle, &state.initial_fen, &requests)?
            .pop()
            .map(|m| m.fen)
            .unwrap_or_else(|| state.initial_fen.clone())
    };

    state.view_fen = fen;
    state.view_move_index = index;
    Ok(())
}

fn sync_state(
    state: &mut SessionState,
    patch: StatePatch,
    oracle: &dyn RulesOracle,
) -> CommandResult<()> {
    if let Some(event) = patch.lifecycle {
        transition(state, event)?;
    }

    if let Some(reset) = patch.position {
        let initial_fen = oracle.load_fen(&reset.initial_fen)?;
        let applied = replay(oracle, &initial_fen, &reset.moves)?;
        state.position = PositionState::Confirmed(Line::from_moves(&initial_fen, &applied));
        state.initial_fen = initial_fen;
        state.view_tail();
    }

    if let Some(color) = patch.player_color {
        state.player_color = color;
    }
    if let Some(opponent) = patch.opponent_type {
        state.opponent_type = opponent;
    }
    if let Some(tc) = patch.time_control {
        state.time_control = Some(tc);
    }
    if let Some(clock) = patch.clock {
        state.clock = Some(ClockState::new(clock.white_time_ms, clock.black_time_ms));
    }
    if let Some(move_error) = patch.move_error {
        state.move_error = move_error;
    }
    if let Some(outcome) = patch.outcome {
        match state.lifecycle {
            Lifecycle::Playing => transition(state, LifecycleEvent::EndGame)?,
            Lifecycle::Ended => {}
            other => return Err(CommandError::NotPlaying(other)),
        }
        if state.outcome.is_none() {
            state.outcome = Some(outcome);
        }
    }
    Ok(())
}

/// Replace the mode data if `f` produces a change
pub fn with_mode_state(
    state: &SessionState,
    f: impl FnOnce(&mut ModeState),
) -> Option<ModeState> {
    let mut mode_state = state.mode_state.clone();
    f(&mut mode_state);
    (mode_state != state.mode_state).then_some(mode_state)
}
