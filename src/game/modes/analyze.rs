//! Analysis mode controller
//!
//! Free-form study of a position: set it up from FEN or PGN, try moves from
//! any point of the history (which starts a new line from there), step
//! through the game and ask the engine for an evaluation.
//!
//! Evaluations are requested for the displayed position. Each request is
//! tagged through an [`AnalysisTracker`]; when the answer comes back for a
//! position the user has already left, it is dropped.

use crate::game::ai::{AnalysisOptions, AnalysisTracker, ChessEngine, Evaluation};
use crate::game::error::{CommandError, CommandResult, EngineError};
use crate::game::modes::edit_mode_state;
use crate::game::rules::pgn::{export_pgn, PgnMeta};
use crate::game::rules::MoveRequest;
use crate::game::session::{
    Command, CommandOutcome, ModeState, PositionReset, SessionConfig, SessionManager, StatePatch,
};
use crate::game::types::{GameMode, OpponentType, SessionId};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AnalyzeController {
    manager: Arc<SessionManager>,
    session_id: SessionId,
    engine: Option<Arc<dyn ChessEngine>>,
    tracker: AnalysisTracker,
    options: AnalysisOptions,
}

impl AnalyzeController {
    /// Open an analysis board on the standard position
    ///
    /// The session is playable immediately; the engine is optional and only
    /// needed for [`AnalyzeController::evaluate`].
    pub fn new(manager: Arc<SessionManager>, engine: Option<Arc<dyn ChessEngine>>) -> Self {
        let config = SessionConfig::new(GameMode::Analysis).with_opponent(OpponentType::Human);
        let session_id = manager.start_game(config);
        let outcome = manager.complete_init(session_id);
        if let Some(e) = outcome.error {
            warn!("[ANALYSIS] Session {} not ready: {}", session_id, e);
        }

        Self {
            manager,
            session_id,
            engine,
            tracker: AnalysisTracker::new(),
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Start the engine; analysis without one still works
    pub async fn initialize_engine(&self) -> CommandOutcome {
        let Some(engine) = &self.engine else {
            return CommandOutcome::failed(CommandError::External(
                "No analysis engine configured".to_string(),
            ));
        };
        match engine.init().await {
            Ok(()) => CommandOutcome::ok(),
            Err(e) => {
                warn!("[ANALYSIS] Engine unavailable: {}", e);
                CommandOutcome::failed(CommandError::External(e.to_string()))
            }
        }
    }

    /// Replace the board with `fen`; `false` if it does not parse
    pub fn load_fen(&self, fen: &str) -> bool {
        self.reset(PositionReset::at(fen.trim()))
    }

    /// Replace the board with the game in `pgn`; `false` if it does not parse
    pub fn load_pgn(&self, pgn: &str) -> bool {
        let game = match self.manager.oracle().load_pgn(pgn) {
            Ok(game) => game,
            Err(e) => {
                debug!("[ANALYSIS] PGN rejected: {}", e);
                return false;
            }
        };
        info!("[ANALYSIS] Loaded PGN with {} plies", game.moves.len());
        self.reset(PositionReset {
            initial_fen: game.initial_fen.clone(),
            moves: game.moves.iter().map(|m| m.request()).collect(),
        })
    }

    fn reset(&self, position: PositionReset) -> bool {
        let outcome = self.manager.apply_command(
            self.session_id,
            Command::SyncState(StatePatch {
                position: Some(position),
                move_error: Some(None),
                ..Default::default()
            }),
        );
        if let Some(e) = &outcome.error {
            debug!("[ANALYSIS] Position rejected: {}", e);
            return false;
        }
        self.tracker.invalidate();
        edit_mode_state(&self.manager, self.session_id, |mode| {
            if let ModeState::Analysis(analysis) = mode {
                *analysis = Default::default();
            }
        });
        true
    }

    /// Play `request` from the displayed position
    ///
    /// Moving while browsing history truncates the later moves.
    pub fn make_move(&self, request: MoveRequest) -> CommandOutcome {
        self.manager
            .apply_command(self.session_id, Command::apply_move(request))
    }

    /// Show the position after ply `index`; `-1` is the start
    pub fn navigate(&self, index: i32) -> CommandOutcome {
        self.manager.apply_command(
            self.session_id,
            Command::NavigateHistory {
                target_index: index,
            },
        )
    }

    pub fn go_to_start(&self) -> CommandOutcome {
        self.navigate(-1)
    }

    pub fn go_to_end(&self) -> CommandOutcome {
        self.navigate(i32::MAX)
    }

    pub fn step_back(&self) -> CommandOutcome {
        self.step(-1)
    }

    pub fn step_forward(&self) -> CommandOutcome {
        self.step(1)
    }

    fn step(&self, delta: i32) -> CommandOutcome {
        match self
            .manager
            .with_session(self.session_id, |s| s.view_move_index)
        {
            Some(index) => self.navigate(index.saturating_add(delta)),
            None => CommandOutcome::failed(CommandError::SessionNotFound(self.session_id)),
        }
    }

    /// Evaluate the displayed position
    ///
    /// Returns `Ok(None)` when the result arrived for a position that is no
    /// longer displayed, or when a newer request superseded this one.
    pub async fn evaluate(&self) -> CommandResult<Option<Evaluation>> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| CommandError::External("No analysis engine configured".to_string()))?;
        let fen = self
            .manager
            .with_session(self.session_id, |s| s.view_fen.clone())
            .ok_or(CommandError::SessionNotFound(self.session_id))?;

        let ticket = self.tracker.begin(&fen);
        edit_mode_state(&self.manager, self.session_id, |mode| {
            if let ModeState::Analysis(analysis) = mode {
                analysis.evaluating = true;
            }
        });

        let result = engine.analyze(&fen, self.options, None).await;
        let displayed = self
            .manager
            .with_session(self.session_id, |s| s.view_fen.clone())
            .ok_or(CommandError::SessionNotFound(self.session_id))?;

        let evaluation = match result {
            Ok(evaluation) => evaluation,
            Err(EngineError::Superseded) => {
                debug!("[ANALYSIS] Evaluation of {} superseded", fen);
                return Ok(None);
            }
            Err(e) => {
                self.clear_evaluating(ticket.generation);
                return Err(CommandError::External(e.to_string()));
            }
        };

        if !self.tracker.finish(&ticket, &displayed) {
            debug!("[ANALYSIS] Discarding stale evaluation of {}", fen);
            self.clear_evaluating(ticket.generation);
            return Ok(None);
        }

        let stored = evaluation.clone();
        edit_mode_state(&self.manager, self.session_id, |mode| {
            if let ModeState::Analysis(analysis) = mode {
                analysis.evaluation = Some(stored);
                analysis.evaluated_fen = Some(fen);
                analysis.evaluating = false;
            }
        })
        .into_result()?;
        Ok(Some(evaluation))
    }

    /// Interrupt a running evaluation
    pub async fn stop_evaluation(&self) -> CommandOutcome {
        match &self.engine {
            Some(engine) => engine
                .stop_analysis()
                .await
                .map_err(|e| CommandError::External(e.to_string()))
                .into(),
            None => CommandOutcome::ok(),
        }
    }

    /// Drop the busy flag unless a newer request owns it
    fn clear_evaluating(&self, generation: u64) {
        if self.tracker.generation() != generation {
            return;
        }
        edit_mode_state(&self.manager, self.session_id, |mode| {
            if let ModeState::Analysis(analysis) = mode {
                analysis.evaluating = false;
            }
        });
    }

    /// The current line as PGN
    pub fn export_pgn(&self) -> Option<String> {
        self.manager.with_session(self.session_id, |s| {
            export_pgn(&PgnMeta::default(), &s.initial_fen, &s.history().sans())
        })
    }

    pub async fn exit(&self) -> CommandOutcome {
        self.tracker.invalidate();
        if let Some(engine) = &self.engine {
            if let Err(e) = engine.terminate().await {
                warn!("[ANALYSIS] Engine did not shut down cleanly: {}", e);
            }
        }
        let outcome = self.manager.exit_game(self.session_id);
        self.manager.destroy_session(self.session_id);
        outcome
    }
}
