//! Session Flow Integration Tests
//!
//! Tests for whole games driven through the public manager API:
//! - Lifecycle and change events
//! - Move application and game end
//! - History consistency under arbitrary legal games

use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use xfchess_session::game::error::{CommandError, RulesError};
use xfchess_session::game::resources::{CapturedPieces, GameOverReason, Winner};
use xfchess_session::game::rules::{replay, ChessRules, MoveRequest, STARTING_FEN};
use xfchess_session::game::session::{
    ChangeKind, Command, CommandKind, Lifecycle, SessionConfig, SessionManager,
};
use xfchess_session::game::types::{GameMode, PieceColor, SessionId, Square};

fn mv(uci: &str) -> MoveRequest {
    MoveRequest::parse_uci(uci).expect("valid uci")
}

fn new_game(manager: &SessionManager, mode: GameMode) -> SessionId {
    let id = manager.start_game(SessionConfig::new(mode));
    assert!(manager.complete_init(id).success);
    id
}

fn play_all(manager: &SessionManager, id: SessionId, moves: &[&str]) {
    for uci in moves {
        let outcome = manager.apply_command(id, Command::apply_move(mv(uci)));
        assert!(outcome.success, "{} failed: {:?}", uci, outcome.error);
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[test]
fn test_full_game_event_sequence() {
    //! Every successful step announces exactly one change, in order
    let manager = SessionManager::with_default_rules();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = manager.subscribe(move |event| sink.lock().push(event.kind));

    let id = new_game(&manager, GameMode::Play);
    play_all(&manager, id, &["e2e4"]);
    let refused = manager.apply_command(id, Command::apply_move(mv("e2e4")));
    assert!(!refused.success);
    manager.apply_command(
        id,
        Command::Resign {
            resigning_side: PieceColor::Black,
        },
    );
    manager.exit_game(id);
    assert!(manager.destroy_session(id));

    assert_eq!(
        *seen.lock(),
        vec![
            ChangeKind::Created,
            ChangeKind::Lifecycle(Lifecycle::Initializing),
            ChangeKind::Lifecycle(Lifecycle::Playing),
            ChangeKind::Command(CommandKind::ApplyMove),
            ChangeKind::Command(CommandKind::Resign),
            ChangeKind::Lifecycle(Lifecycle::Idle),
            ChangeKind::Destroyed,
        ]
    );
}

#[test]
fn test_exit_and_restart_clears_game() {
    let manager = SessionManager::with_default_rules();
    let id = new_game(&manager, GameMode::Play);
    play_all(&manager, id, &["e2e4", "e7e5"]);

    assert!(manager.exit_game(id).success);
    assert!(manager.start(id).success);
    assert!(manager.complete_init(id).success);

    let view = manager.get_session(id).unwrap();
    assert_eq!(view.lifecycle, Lifecycle::Playing);
    assert_eq!(view.fen, STARTING_FEN);
    assert!(view.move_history.is_empty());
    assert_eq!(view.view_move_index, -1);
}

#[test]
fn test_commands_on_missing_session() {
    let manager = SessionManager::with_default_rules();
    let id = new_game(&manager, GameMode::Play);
    assert!(manager.destroy_session(id));
    assert!(!manager.destroy_session(id));

    let outcome = manager.apply_command(id, Command::apply_move(mv("e2e4")));
    assert_eq!(outcome.error, Some(CommandError::SessionNotFound(id)));
    assert!(manager.get_session(id).is_none());
    assert_eq!(manager.active_session(), None);
}

// ============================================================================
// Game Tests
// ============================================================================

#[test]
fn test_fools_mate_view() {
    let manager = SessionManager::with_default_rules();
    let id = new_game(&manager, GameMode::Play);
    play_all(&manager, id, &["f2f3", "e7e5", "g2g4", "d8h4"]);

    let view = manager.get_session(id).unwrap();
    assert!(view.is_game_over);
    assert_eq!(view.lifecycle, Lifecycle::Ended);
    assert_eq!(view.game_over_reason, Some(GameOverReason::Checkmate));
    assert_eq!(view.game_winner, Some(Winner::Black));
    assert_eq!(view.move_history, vec!["f3", "e5", "g4", "Qh4#"]);
    assert_eq!(view.checked_king_square, Some(Square::from_algebraic("e1").unwrap()));
    assert!(!view.is_player_turn());

    let after_mate = manager.apply_command(id, Command::apply_move(mv("a2a3")));
    assert!(!after_mate.success);
}

#[test]
fn test_illegal_move_changes_nothing() {
    let manager = SessionManager::with_default_rules();
    let id = new_game(&manager, GameMode::Play);
    play_all(&manager, id, &["e2e4"]);
    let before = manager.snapshot(id).unwrap();

    let outcome = manager.apply_command(id, Command::apply_move(mv("e4e6")));
    assert!(matches!(
        outcome.error,
        Some(CommandError::Rules(RulesError::IllegalMove { .. }))
    ));
    assert_eq!(manager.snapshot(id).unwrap(), before);
}

#[test]
fn test_capture_bookkeeping() {
    let manager = SessionManager::with_default_rules();
    let id = new_game(&manager, GameMode::Play);
    play_all(&manager, id, &["e2e4", "d7d5", "e4d5", "d8d5", "b1c3", "d5a2"]);

    let view = manager.get_session(id).unwrap();
    assert_eq!(view.captured_white.len(), 1);
    assert_eq!(view.captured_black.len(), 2);
    assert_eq!(view.material_advantage, -1);
}

#[test]
fn test_browse_history_then_resume() {
    let manager = SessionManager::with_default_rules();
    let id = new_game(&manager, GameMode::Play);
    play_all(&manager, id, &["e2e4", "e7e5", "g1f3"]);
    let tip = manager.get_session(id).unwrap().fen;

    manager.apply_command(id, Command::NavigateHistory { target_index: 0 });
    let view = manager.get_session(id).unwrap();
    assert!(view.is_viewing_history);
    assert_eq!(view.fen, tip);
    assert_ne!(view.view_fen, tip);
    assert_eq!(
        view.last_move.map(|m| m.to),
        Some(Square::from_algebraic("e4").unwrap())
    );

    manager.apply_command(id, Command::NavigateHistory { target_index: 99 });
    let view = manager.get_session(id).unwrap();
    assert!(!view.is_viewing_history);
    assert_eq!(view.view_fen, tip);
}

#[test]
fn test_take_back_round_trip() {
    let manager = SessionManager::with_default_rules();
    let id = new_game(&manager, GameMode::Play);
    play_all(&manager, id, &["e2e4", "e7e5", "g1f3"]);

    manager.apply_command(
        id,
        Command::TakeBack {
            player_color: PieceColor::White,
        },
    );
    let view = manager.get_session(id).unwrap();
    assert_eq!(view.move_history, vec!["e4", "e5"]);

    manager.apply_command(
        id,
        Command::TakeBack {
            player_color: PieceColor::White,
        },
    );
    let view = manager.get_session(id).unwrap();
    assert!(view.move_history.is_empty());
    assert_eq!(view.fen, STARTING_FEN);
    assert_eq!(view.view_fen, STARTING_FEN);
}

// ============================================================================
// History Consistency
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_history_replays_to_current_position(
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..40)
    ) {
        let rules = ChessRules::new();
        let manager = SessionManager::with_default_rules();
        let id = new_game(&manager, GameMode::Analysis);

        for pick in &picks {
            let fen = manager.get_session(id).unwrap().fen;
            let moves = rules.all_legal_moves(&fen).unwrap();
            if moves.is_empty() {
                break;
            }
            let outcome = manager.apply_command(id, Command::apply_move(*pick.get(&moves)));
            prop_assert!(outcome.success);
        }

        let state = manager.snapshot(id).unwrap();
        let history = state.history();
        let replayed = replay(&rules, &state.initial_fen, &history.requests(history.len())).unwrap();
        let expected = replayed
            .last()
            .map(|m| m.fen.clone())
            .unwrap_or_else(|| state.initial_fen.clone());

        prop_assert_eq!(state.fen(), expected.as_str());
        prop_assert_eq!(&state.view_fen, &expected);
        prop_assert_eq!(state.view_move_index, history.len() as i32 - 1);
        prop_assert_eq!(state.captured(), &CapturedPieces::from_records(history.iter()));

        for target_index in -1..history.len() as i32 {
            let outcome = manager.apply_command(id, Command::NavigateHistory { target_index });
            prop_assert!(outcome.success);

            let expected = match usize::try_from(target_index) {
                Ok(ply) => replayed[ply].fen.clone(),
                Err(_) => state.initial_fen.clone(),
            };
            let view = manager.get_session(id).unwrap();
            prop_assert_eq!(view.view_move_index, target_index);
            prop_assert_eq!(view.view_fen, expected);
            prop_assert_eq!(view.fen.as_str(), state.fen());
        }
    }
}
