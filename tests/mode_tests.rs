//! Mode Controller Integration Tests
//!
//! Tests for the play, training, puzzle and analysis controllers running
//! against the in-process scripted engine:
//! - Engine start, failure and retry
//! - AI replies, take-backs and clocks
//! - Training hints and move grading
//! - Puzzle solution checking
//! - Analysis branching and stale evaluations

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use xfchess_session::game::ai::{
    AIDifficulty, AnalysisOptions, ChessEngine, Evaluation, ProgressFn, Score, ScriptedEngine,
    SearchLimits,
};
use xfchess_session::game::error::{CommandError, EngineError, EngineResult, RulesError};
use xfchess_session::game::modes::{
    AnalyzeController, PlayController, Puzzle, PuzzleController, TrainingController,
};
use xfchess_session::game::resources::{GameOverReason, Winner};
use xfchess_session::game::rules::{MoveRequest, STARTING_FEN};
use xfchess_session::game::session::{
    ClockState, Lifecycle, ModeState, MoveQuality, PuzzleFeedback, SessionConfig, SessionManager,
    SessionView,
};
use xfchess_session::game::types::{GameMode, PieceColor, SessionId, Square, TimeControl};

fn mv(uci: &str) -> MoveRequest {
    MoveRequest::parse_uci(uci).expect("valid uci")
}

fn manager() -> Arc<SessionManager> {
    Arc::new(SessionManager::with_default_rules())
}

fn view(manager: &SessionManager, id: SessionId) -> SessionView {
    manager.get_session(id).expect("session exists")
}

// ============================================================================
// Play vs AI Tests
// ============================================================================

#[tokio::test]
async fn test_play_vs_ai_reply_and_take_back() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::with_moves(["e7e5"]));
    let play = PlayController::vs_ai(
        manager.clone(),
        engine.clone(),
        SessionConfig::new(GameMode::Play),
        AIDifficulty::Easy,
    );
    let id = play.session_id();

    assert_eq!(view(&manager, id).lifecycle, Lifecycle::Initializing);
    assert!(!play.can_move());

    assert!(play.initialize().await.success);
    assert!(play.can_move());

    assert!(play.make_move(mv("e2e4")).await.success);
    let after = view(&manager, id);
    assert_eq!(after.move_history, vec!["e4", "e5"]);
    assert!(after.is_player_turn());
    assert_eq!(engine.requests().len(), 1);

    assert!(play.take_back().success);
    let after = view(&manager, id);
    assert!(after.move_history.is_empty());
    assert_eq!(after.fen, STARTING_FEN);

    assert!(play.exit().await.success);
    assert!(manager.get_session(id).is_none());
    assert!(!engine.is_ready());
}

#[tokio::test]
async fn test_engine_moves_first_for_black_player() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::with_moves(["d2d4"]));
    let config = SessionConfig::new(GameMode::Play).with_color(PieceColor::Black);
    let play = PlayController::vs_ai(manager.clone(), engine, config, AIDifficulty::Medium);

    assert!(play.initialize().await.success);
    let after = view(&manager, play.session_id());
    assert_eq!(after.move_history, vec!["d4"]);
    assert_eq!(after.side_to_move, Some(PieceColor::Black));
    assert!(play.can_move());
}

#[tokio::test]
async fn test_black_cannot_take_back_engine_opening() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::with_moves(["d2d4", "c2c4"]));
    let config = SessionConfig::new(GameMode::Play).with_color(PieceColor::Black);
    let play = PlayController::vs_ai(manager.clone(), engine, config, AIDifficulty::Easy);
    play.initialize().await;

    assert_eq!(play.take_back().error, Some(CommandError::NothingToTakeBack));
    assert_eq!(view(&manager, play.session_id()).move_history, vec!["d4"]);
    assert!(play.can_move());

    assert!(play.make_move(mv("e7e5")).await.success);
    assert_eq!(
        view(&manager, play.session_id()).move_history,
        vec!["d4", "e5", "c4"]
    );
    assert!(play.take_back().success);
    assert_eq!(view(&manager, play.session_id()).move_history, vec!["d4"]);
    assert!(play.can_move());
}

#[tokio::test]
async fn test_exited_sessions_are_released() {
    let manager = manager();
    for _ in 0..3 {
        let play = PlayController::vs_ai(
            manager.clone(),
            Arc::new(ScriptedEngine::new()),
            SessionConfig::new(GameMode::Play),
            AIDifficulty::Easy,
        );
        play.initialize().await;
        play.exit().await;
    }
    assert_eq!(manager.session_count(), 0);

    let board = AnalyzeController::new(manager.clone(), None);
    let puzzle = PuzzleController::load(manager.clone(), back_rank()).unwrap();
    assert_eq!(manager.session_count(), 2);

    board.exit().await;
    puzzle.exit().unwrap();
    assert_eq!(manager.session_count(), 0);
    assert_eq!(manager.active_session(), None);
}

#[tokio::test]
async fn test_refused_moves_leave_game_untouched() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::new());
    let config = SessionConfig::new(GameMode::Play).with_color(PieceColor::Black);
    let play = PlayController::vs_ai(manager.clone(), engine, config, AIDifficulty::Easy);

    let before_init = play.make_move(mv("e7e5")).await;
    assert_eq!(
        before_init.error,
        Some(CommandError::NotPlaying(Lifecycle::Initializing))
    );

    play.initialize().await;
    let history = view(&manager, play.session_id()).move_history;
    assert_eq!(history.len(), 1);

    let white_pawn = play.make_move(mv("a2a3")).await;
    assert!(!white_pawn.success);
    assert_eq!(view(&manager, play.session_id()).move_history, history);
}

#[tokio::test]
async fn test_engine_init_failure_then_retry() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::new().failing_init(1));
    let play = PlayController::vs_ai(
        manager.clone(),
        engine,
        SessionConfig::new(GameMode::Play),
        AIDifficulty::Hard,
    );
    let id = play.session_id();

    let outcome = play.initialize().await;
    assert!(!outcome.success);
    assert!(play.has_engine_error());
    let failed = view(&manager, id);
    assert_eq!(failed.lifecycle, Lifecycle::Error);
    assert!(failed.lifecycle_error.is_some());

    assert!(play.retry_engine_init().await.success);
    assert!(!play.has_engine_error());
    let ready = view(&manager, id);
    assert_eq!(ready.lifecycle, Lifecycle::Playing);
    assert_eq!(ready.lifecycle_error, None);
}

#[tokio::test]
async fn test_illegal_engine_move_faults_session() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::with_moves(["e2e4"]));
    let play = PlayController::vs_ai(
        manager.clone(),
        engine,
        SessionConfig::new(GameMode::Play),
        AIDifficulty::Easy,
    );
    play.initialize().await;

    assert!(play.make_move(mv("d2d4")).await.success);
    let faulted = view(&manager, play.session_id());
    assert_eq!(faulted.lifecycle, Lifecycle::Error);
    assert_eq!(faulted.move_history, vec!["d4"]);
    assert!(play.has_engine_error());
    assert!(!play.can_move());
}

#[tokio::test]
async fn test_resign_ends_game() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::new());
    let play = PlayController::vs_ai(
        manager.clone(),
        engine,
        SessionConfig::new(GameMode::Play),
        AIDifficulty::Easy,
    );
    play.initialize().await;

    assert!(play.resign().await.success);
    let ended = view(&manager, play.session_id());
    assert_eq!(ended.lifecycle, Lifecycle::Ended);
    assert_eq!(ended.game_over_reason, Some(GameOverReason::Resignation));
    assert_eq!(ended.game_winner, Some(Winner::Black));
    assert!(!play.resign().await.success);
}

#[tokio::test(start_paused = true)]
async fn test_increment_after_each_move() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::with_moves(["e7e5"]));
    let config = SessionConfig::new(GameMode::Play).with_time_control(TimeControl::new(1, 2));
    let play = PlayController::vs_ai(manager.clone(), engine, config, AIDifficulty::Easy);
    play.initialize().await;

    assert!(play.make_move(mv("e2e4")).await.success);
    assert_eq!(
        view(&manager, play.session_id()).clock,
        Some(ClockState::new(62_000, 62_000))
    );
    play.exit().await;
}

#[tokio::test(start_paused = true)]
async fn test_flag_fall_against_engine() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::new());
    let config = SessionConfig::new(GameMode::Play).with_time_control(TimeControl::new(1, 0));
    let play = PlayController::vs_ai(manager.clone(), engine, config, AIDifficulty::Easy);
    play.initialize().await;

    tokio::time::sleep(Duration::from_secs(61)).await;

    let flagged = view(&manager, play.session_id());
    assert_eq!(flagged.lifecycle, Lifecycle::Ended);
    assert_eq!(flagged.game_over_reason, Some(GameOverReason::Time));
    assert_eq!(flagged.game_winner, Some(Winner::Black));
}

// ============================================================================
// Training Tests
// ============================================================================

fn eval(cp: i32, best: &str) -> Evaluation {
    Evaluation::single(Score::Centipawns(cp), 12, Some(best.to_string()))
}

#[tokio::test]
async fn test_training_hint_and_feedback() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::with_moves(["e2e4", "e7e5"]));
    let training = TrainingController::new(
        manager.clone(),
        engine.clone(),
        SessionConfig::new(GameMode::Play),
        AIDifficulty::Medium,
    );
    let id = training.session_id();
    assert!(training.initialize().await.success);
    assert_eq!(view(&manager, id).mode, GameMode::Training);

    assert!(training.request_hint().await.success);
    match view(&manager, id).mode_state {
        ModeState::Training(state) => {
            assert_eq!(state.hint.as_deref(), Some("e2e4"));
            assert_eq!(state.hint_san.as_deref(), Some("e4"));
        }
        other => panic!("Wrong mode state: {:?}", other),
    }

    engine.push_evaluation(eval(30, "e2e4"));
    engine.push_evaluation(eval(-300, "e7e5"));
    assert!(training.make_move(mv("f2f3")).await.success);

    let after = view(&manager, id);
    assert_eq!(after.move_history, vec!["f3", "e5"]);
    match after.mode_state {
        ModeState::Training(state) => {
            let feedback = state.feedback.expect("move was graded");
            assert_eq!(feedback.san, "f3");
            assert_eq!(feedback.quality, MoveQuality::Blunder);
            assert_eq!(feedback.centipawn_loss, 330);
            assert_eq!(feedback.best_move.as_deref(), Some("e2e4"));
            assert_eq!(state.hint, None);
        }
        other => panic!("Wrong mode state: {:?}", other),
    }
}

#[tokio::test]
async fn test_training_engine_choice_grades_best() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::with_moves(["d7d5"]));
    let training = TrainingController::new(
        manager.clone(),
        engine.clone(),
        SessionConfig::new(GameMode::Training),
        AIDifficulty::Easy,
    );
    let id = training.session_id();
    training.initialize().await;

    engine.push_evaluation(eval(20, "d2d4"));
    engine.push_evaluation(eval(-400, "d7d5"));
    assert!(training.make_move(mv("d2d4")).await.success);

    match view(&manager, id).mode_state {
        ModeState::Training(state) => {
            let feedback = state.feedback.expect("move was graded");
            assert_eq!(feedback.quality, MoveQuality::Best);
            assert_eq!(feedback.centipawn_loss, 0);
        }
        other => panic!("Wrong mode state: {:?}", other),
    }

    assert!(training.take_back().success);
    let after = view(&manager, id);
    assert!(after.move_history.is_empty());
    assert_eq!(after.mode_state, ModeState::Training(Default::default()));
}

// ============================================================================
// Puzzle Tests
// ============================================================================

fn back_rank() -> Puzzle {
    Puzzle {
        id: "back-rank".to_string(),
        fen: "6k1/5ppp/8/8/8/8/8/RR4K1 w - - 0 1".to_string(),
        solution: vec!["a1a8".to_string()],
        rating: Some(900),
        themes: vec!["mateIn1".to_string()],
    }
}

#[test]
fn test_puzzle_wrong_then_right() {
    let manager = manager();
    let puzzle = PuzzleController::load(manager.clone(), back_rank()).unwrap();
    let id = puzzle.session_id();

    assert_eq!(puzzle.submit_move(mv("a1a2")), Ok(PuzzleFeedback::Incorrect));
    assert!(view(&manager, id).move_history.is_empty());

    assert_eq!(puzzle.hint(), Ok(Some(Square::from_algebraic("a1").unwrap())));

    assert_eq!(puzzle.submit_move(mv("a1a8")), Ok(PuzzleFeedback::Solved));
    assert!(puzzle.is_solved());

    let solved = view(&manager, id);
    assert_eq!(solved.game_over_reason, Some(GameOverReason::Checkmate));
    match solved.mode_state {
        ModeState::Puzzle(state) => {
            assert_eq!(state.mistakes, 1);
            assert_eq!(state.progress, 1);
            assert_eq!(state.hint_square, None);
        }
        other => panic!("Wrong mode state: {:?}", other),
    }

    assert_eq!(
        puzzle.submit_move(mv("b1b2")),
        Err(CommandError::GameAlreadyOver)
    );
}

#[test]
fn test_puzzle_any_mate_counts() {
    let puzzle = PuzzleController::load(manager(), back_rank()).unwrap();
    assert_eq!(puzzle.submit_move(mv("b1b8")), Ok(PuzzleFeedback::Solved));
}

#[test]
fn test_puzzle_reply_is_auto_played() {
    let manager = manager();
    let puzzle = Puzzle {
        id: "opening".to_string(),
        fen: STARTING_FEN.to_string(),
        solution: vec!["e2e4".into(), "e7e5".into(), "g1f3".into()],
        rating: None,
        themes: Vec::new(),
    };
    let puzzle = PuzzleController::load(manager.clone(), puzzle).unwrap();
    let id = puzzle.session_id();

    assert_eq!(puzzle.submit_move(mv("e2e4")), Ok(PuzzleFeedback::Correct));
    assert_eq!(view(&manager, id).move_history, vec!["e4", "e5"]);
    assert!(!puzzle.is_solved());

    assert_eq!(puzzle.submit_move(mv("g1f3")), Ok(PuzzleFeedback::Solved));
    assert_eq!(view(&manager, id).move_history, vec!["e4", "e5", "Nf3"]);
}

#[test]
fn test_puzzle_illegal_submission_is_error() {
    let puzzle = PuzzleController::load(manager(), back_rank()).unwrap();
    assert!(matches!(
        puzzle.submit_move(mv("a1b2")),
        Err(CommandError::Rules(RulesError::IllegalMove { .. }))
    ));
}

#[test]
fn test_puzzle_validation() {
    let mut empty = back_rank();
    empty.solution.clear();
    assert!(matches!(
        PuzzleController::load(manager(), empty),
        Err(CommandError::External(_))
    ));

    let mut broken = back_rank();
    broken.solution = vec!["a1h8".to_string()];
    assert!(matches!(
        PuzzleController::load(manager(), broken),
        Err(CommandError::Rules(RulesError::IllegalMove { .. }))
    ));

    let mut bad_fen = back_rank();
    bad_fen.fen = "not a position".to_string();
    assert!(PuzzleController::load(manager(), bad_fen).is_err());
}

// ============================================================================
// Analysis Tests
// ============================================================================

#[test]
fn test_analysis_branch_from_history() {
    let manager = manager();
    let board = AnalyzeController::new(manager.clone(), None);
    let id = board.session_id();
    assert_eq!(view(&manager, id).lifecycle, Lifecycle::Playing);

    for uci in ["e2e4", "e7e5", "g1f3"] {
        assert!(board.make_move(mv(uci)).success);
    }
    assert!(board.step_back().success);
    assert!(board.step_back().success);
    assert_eq!(view(&manager, id).view_move_index, 0);

    assert!(board.make_move(mv("d7d5")).success);
    let branched = view(&manager, id);
    assert_eq!(branched.move_history, vec!["e4", "d5"]);
    assert!(!branched.is_viewing_history);

    let pgn = board.export_pgn().unwrap();
    assert!(pgn.contains("1. e4 d5 *"), "{}", pgn);
}

#[test]
fn test_analysis_load_positions() {
    let manager = manager();
    let board = AnalyzeController::new(manager.clone(), None);
    let id = board.session_id();

    assert!(!board.load_fen("8/8/8"));
    assert!(board.load_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1"));
    assert_eq!(view(&manager, id).fen, "4k3/8/8/8/8/8/8/4K2R w K - 0 1");

    assert!(!board.load_pgn("1. e4 e5 2. Ke3 *"));
    assert!(board.load_pgn("[Event \"Casual\"]\n\n1. e4 e5 2. Nf3 Nc6 *"));
    let loaded = view(&manager, id);
    assert_eq!(loaded.initial_fen, STARTING_FEN);
    assert_eq!(loaded.move_history, vec!["e4", "e5", "Nf3", "Nc6"]);

    assert!(board.go_to_start().success);
    assert_eq!(view(&manager, id).view_fen, STARTING_FEN);
    assert!(board.step_forward().success);
    assert_eq!(view(&manager, id).view_move_index, 0);
    assert!(board.go_to_end().success);
    assert_eq!(view(&manager, id).view_move_index, 3);
}

#[tokio::test]
async fn test_analysis_evaluate_displayed_position() {
    let manager = manager();
    let engine = Arc::new(ScriptedEngine::new());
    let board = AnalyzeController::new(manager.clone(), Some(engine.clone()));
    let id = board.session_id();

    assert!(board.initialize_engine().await.success);
    board.make_move(mv("e2e4"));
    engine.push_evaluation(eval(35, "e7e5"));

    let evaluation = board.evaluate().await.unwrap().expect("fresh result");
    assert_eq!(evaluation.centipawns(), 35);

    let shown = view(&manager, id);
    match shown.mode_state {
        ModeState::Analysis(state) => {
            assert_eq!(state.evaluation, Some(evaluation));
            assert_eq!(state.evaluated_fen.as_deref(), Some(shown.view_fen.as_str()));
            assert!(!state.evaluating);
        }
        other => panic!("Wrong mode state: {:?}", other),
    }

    assert!(board.load_fen(STARTING_FEN));
    match view(&manager, id).mode_state {
        ModeState::Analysis(state) => assert_eq!(state.evaluation, None),
        other => panic!("Wrong mode state: {:?}", other),
    }
}

#[tokio::test]
async fn test_analysis_without_engine() {
    let board = AnalyzeController::new(manager(), None);
    assert!(!board.initialize_engine().await.success);
    assert!(matches!(
        board.evaluate().await,
        Err(CommandError::External(_))
    ));
}

/// Engine whose analysis finishes only when the test opens the gate
#[derive(Default)]
struct GatedEngine {
    gate: Notify,
}

#[async_trait]
impl ChessEngine for GatedEngine {
    async fn init(&self) -> EngineResult<()> {
        Ok(())
    }

    async fn best_move(&self, _fen: &str, _limits: SearchLimits) -> EngineResult<String> {
        Err(EngineError::NoMove)
    }

    async fn analyze(
        &self,
        _fen: &str,
        _options: AnalysisOptions,
        _on_progress: Option<ProgressFn>,
    ) -> EngineResult<Evaluation> {
        self.gate.notified().await;
        Ok(eval(15, "e7e5"))
    }

    async fn stop_analysis(&self) -> EngineResult<()> {
        Ok(())
    }

    async fn terminate(&self) -> EngineResult<()> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn test_analysis_stale_result_is_discarded() {
    let manager = manager();
    let engine = Arc::new(GatedEngine::default());
    let board = AnalyzeController::new(manager.clone(), Some(engine.clone()));
    let id = board.session_id();
    board.make_move(mv("e2e4"));

    let (stale, _) = tokio::join!(board.evaluate(), async {
        board.step_back();
        engine.gate.notify_one();
    });
    assert_eq!(stale, Ok(None));
    match view(&manager, id).mode_state {
        ModeState::Analysis(state) => {
            assert_eq!(state.evaluation, None);
            assert!(!state.evaluating);
        }
        other => panic!("Wrong mode state: {:?}", other),
    }

    engine.gate.notify_one();
    let fresh = board.evaluate().await.unwrap();
    assert_eq!(fresh, Some(eval(15, "e7e5")));
}
