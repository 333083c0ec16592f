//! Training mode controller
//!
//! A game against the engine where the engine also coaches: it suggests a
//! move on request and grades every move the player makes by how many
//! centipawns it gave away.
//!
//! # Grading
//!
//! The position is evaluated before and after the player's move, both from
//! White's point of view. The drop, seen from the player's side, is the
//! centipawn loss:
//!
//! | Loss      | Quality    |
//! |-----------|------------|
//! | 0-10      | best       |
//! | 11-50     | good       |
//! | 51-100    | inaccuracy |
//! | 101-250   | mistake    |
//! | over 250  | blunder    |
//!
//! Playing the engine's own first choice always grades as best.

use crate::game::ai::{AIDifficulty, AnalysisOptions, ChessEngine, SearchLimits};
use crate::game::error::CommandError;
use crate::game::modes::play::PlayController;
use crate::game::modes::{check_turn, edit_mode_state};
use crate::game::rules::MoveRequest;
use crate::game::session::{
    CommandOutcome, ModeState, MoveFeedback, MoveQuality, SessionConfig, SessionManager,
};
use crate::game::types::{GameMode, PieceColor, SessionId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Search depth for hints and grading
const COACH_DEPTH: u32 = 12;

pub struct TrainingController {
    play: PlayController,
    engine: Arc<dyn ChessEngine>,
}

impl TrainingController {
    pub fn new(
        manager: Arc<SessionManager>,
        engine: Arc<dyn ChessEngine>,
        config: SessionConfig,
        difficulty: AIDifficulty,
    ) -> Self {
        let config = SessionConfig {
            mode: GameMode::Training,
            ..config
        };
        let play = PlayController::vs_ai(manager, Arc::clone(&engine), config, difficulty);
        Self { play, engine }
    }

    pub fn session_id(&self) -> SessionId {
        self.play.session_id()
    }

    /// The underlying game
    pub fn play(&self) -> &PlayController {
        &self.play
    }

    pub async fn initialize(&self) -> CommandOutcome {
        self.play.initialize().await
    }

    fn manager(&self) -> &SessionManager {
        self.play.manager()
    }

    /// Ask the engine for a move and store it as the current hint
    pub async fn request_hint(&self) -> CommandOutcome {
        let id = self.session_id();
        if let Err(e) = check_turn(self.manager(), id) {
            return CommandOutcome::failed(e);
        }
        let Some(fen) = self.manager().with_session(id, |s| s.fen().to_string()) else {
            return CommandOutcome::failed(CommandError::SessionNotFound(id));
        };

        let uci = match self.engine.best_move(&fen, SearchLimits::depth(COACH_DEPTH)).await {
            Ok(uci) => uci,
            Err(e) => {
                warn!("[TRAINING] Hint unavailable: {}", e);
                return CommandOutcome::failed(CommandError::External(e.to_string()));
            }
        };

        if self.manager().with_session(id, |s| s.fen() == fen) != Some(true) {
            debug!("[TRAINING] Position moved on; dropping hint {}", uci);
            return CommandOutcome::ok();
        }

        let hint_san = MoveRequest::parse_uci(&uci)
            .and_then(|request| self.manager().oracle().apply_move(&fen, &request))
            .map(|applied| applied.san)
            .ok();
        info!("[TRAINING] Hint: {}", hint_san.as_deref().unwrap_or(&uci));

        edit_mode_state(self.manager(), id, |mode| {
            if let ModeState::Training(training) = mode {
                training.hint = Some(uci);
                training.hint_san = hint_san;
            }
        })
    }

    /// Play the player's move, grade it, then let the engine reply
    pub async fn make_move(&self, request: MoveRequest) -> CommandOutcome {
        let id = self.session_id();
        if let Err(e) = check_turn(self.manager(), id) {
            return CommandOutcome::failed(e);
        }
        let Some((fen_before, player_color)) = self
            .manager()
            .with_session(id, |s| (s.fen().to_string(), s.player_color))
        else {
            return CommandOutcome::failed(CommandError::SessionNotFound(id));
        };

        let options = AnalysisOptions {
            depth: Some(COACH_DEPTH),
            multipv: 1,
        };
        let before = self.engine.analyze(&fen_before, options, None).await;

        let outcome = self.play.apply_local(request);
        if !outcome.success {
            return outcome;
        }

        let Some((fen_after, san)) = self.manager().with_session(id, |s| {
            let san = s.history().last_move().map(|m| m.san.clone());
            (s.fen().to_string(), san.unwrap_or_default())
        }) else {
            return outcome;
        };

        let feedback = match before {
            Ok(before) => match self.engine.analyze(&fen_after, options, None).await {
                Ok(after) => {
                    let played = request.to_uci();
                    let played_best = before.best_move.as_deref() == Some(played.as_str());
                    let loss = if played_best {
                        0
                    } else {
                        centipawn_loss(before.centipawns(), after.centipawns(), player_color)
                    };
                    Some(MoveFeedback {
                        san,
                        quality: MoveQuality::from_centipawn_loss(loss),
                        centipawn_loss: loss,
                        best_move: before.best_move,
                    })
                }
                Err(e) => {
                    warn!("[TRAINING] Could not grade move: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("[TRAINING] Could not grade move: {}", e);
                None
            }
        };

        if let Some(feedback) = &feedback {
            info!(
                "[TRAINING] {} is {:?} ({} cp lost)",
                feedback.san, feedback.quality, feedback.centipawn_loss
            );
        }
        edit_mode_state(self.manager(), id, |mode| {
            if let ModeState::Training(training) = mode {
                training.hint = None;
                training.hint_san = None;
                training.feedback = feedback;
            }
        });

        self.play.play_ai_reply().await;
        outcome
    }

    /// Take back and forget the feedback for the undone move
    pub fn take_back(&self) -> CommandOutcome {
        let outcome = self.play.take_back();
        if outcome.success {
            edit_mode_state(self.manager(), self.session_id(), |mode| {
                if let ModeState::Training(training) = mode {
                    *training = Default::default();
                }
            });
        }
        outcome
    }

    pub async fn resign(&self) -> CommandOutcome {
        self.play.resign().await
    }

    pub async fn exit(&self) -> CommandOutcome {
        self.play.exit().await
    }
}

/// Centipawns the player gave away, never negative
fn centipawn_loss(before_white: i32, after_white: i32, player: PieceColor) -> i32 {
    let drop = before_white - after_white;
    let loss = match player {
        PieceColor::White => drop,
        PieceColor::Black => -drop,
    };
    loss.max(0)
}
