//! Puzzle mode controller
//!
//! A puzzle is a position plus its solution in UCI. The side to move in the
//! position is the solver; solution moves alternate between the solver and
//! the scripted reply, which the controller plays automatically.
//!
//! A submitted move counts as correct when it matches the expected solution
//! move or delivers checkmate. A wrong move is not applied; it only bumps the
//! mistake counter.

use crate::game::error::{CommandError, CommandResult, RulesError};
use crate::game::modes::{check_turn, edit_mode_state};
use crate::game::rules::{replay, MoveRequest};
use crate::game::session::{
    Command, ModeState, PuzzleFeedback, PuzzleState, SessionConfig, SessionManager,
};
use crate::game::types::{GameMode, OpponentType, SessionId, Square};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: String,
    pub fen: String,
    /// UCI moves, solver first
    pub solution: Vec<String>,
    #[serde(default)]
    pub rating: Option<u32>,
    #[serde(default)]
    pub themes: Vec<String>,
}

pub struct PuzzleController {
    manager: Arc<SessionManager>,
    session_id: SessionId,
    puzzle: Puzzle,
}

impl PuzzleController {
    /// Validate `puzzle` and open a playing session for it
    ///
    /// # Errors
    ///
    /// Fails with a [`RulesError`] when the position or any solution move is
    /// invalid, and with [`CommandError::External`] for an empty solution.
    pub fn load(manager: Arc<SessionManager>, puzzle: Puzzle) -> CommandResult<Self> {
        let oracle = Arc::clone(manager.oracle());
        let fen = oracle.load_fen(&puzzle.fen)?;
        if puzzle.solution.is_empty() {
            return Err(CommandError::External(format!(
                "Puzzle {} has no solution",
                puzzle.id
            )));
        }
        let moves = puzzle
            .solution
            .iter()
            .map(|uci| MoveRequest::parse_uci(uci))
            .collect::<Result<Vec<_>, RulesError>>()?;
        replay(oracle.as_ref(), &fen, &moves)?;

        let solver = oracle.side_to_move(&fen)?;
        let config = SessionConfig::new(GameMode::Puzzle)
            .with_color(solver)
            .with_opponent(OpponentType::Ai)
            .with_fen(fen);
        let session_id = manager.start_game(config);
        manager.complete_init(session_id).into_result()?;

        let solution = puzzle.solution.clone();
        let puzzle_id = puzzle.id.clone();
        edit_mode_state(&manager, session_id, |mode| {
            *mode = ModeState::Puzzle(PuzzleState {
                puzzle_id,
                solution,
                ..Default::default()
            });
        })
        .into_result()?;

        info!(
            "[PUZZLE] Loaded {} ({} moves, rating {:?})",
            puzzle.id,
            puzzle.solution.len(),
            puzzle.rating
        );
        Ok(Self {
            manager,
            session_id,
            puzzle,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    fn puzzle_state(&self) -> CommandResult<PuzzleState> {
        let state = self
            .manager
            .snapshot(self.session_id)
            .ok_or(CommandError::SessionNotFound(self.session_id))?;
        match state.mode_state {
            ModeState::Puzzle(puzzle) => Ok(puzzle),
            _ => Err(CommandError::ModeMismatch(state.mode)),
        }
    }

    /// Check the solver's move and, if right, play the scripted reply
    ///
    /// # Errors
    ///
    /// Illegal moves and turn-guard failures are errors; a legal but wrong
    /// move is `Ok(PuzzleFeedback::Incorrect)`.
    pub fn submit_move(&self, request: MoveRequest) -> CommandResult<PuzzleFeedback> {
        let progress = self.puzzle_state()?;
        if progress.is_solved() {
            return Err(CommandError::GameAlreadyOver);
        }
        check_turn(&self.manager, self.session_id)?;

        let fen = self
            .manager
            .with_session(self.session_id, |s| s.fen().to_string())
            .ok_or(CommandError::SessionNotFound(self.session_id))?;
        let applied = self.manager.oracle().apply_move(&fen, &request)?;
        let expected = &progress.solution[progress.progress];
        let correct = applied.request().to_uci() == *expected || applied.is_checkmate;

        if !correct {
            debug!("[PUZZLE] {} is wrong, expected {}", request.to_uci(), expected);
            edit_mode_state(&self.manager, self.session_id, |mode| {
                if let ModeState::Puzzle(puzzle) = mode {
                    puzzle.mistakes += 1;
                    puzzle.feedback = Some(PuzzleFeedback::Incorrect);
                }
            })
            .into_result()?;
            return Ok(PuzzleFeedback::Incorrect);
        }

        self.manager
            .apply_command(self.session_id, Command::apply_move(request))
            .into_result()?;
        let mut next = progress.progress + 1;
        let mut solved = applied.is_checkmate || next >= progress.solution.len();

        if !solved {
            let reply = MoveRequest::parse_uci(&progress.solution[next])?;
            self.manager
                .apply_command(self.session_id, Command::apply_move(reply))
                .into_result()?;
            next += 1;
            let over = self
                .manager
                .with_session(self.session_id, |s| s.is_game_over())
                .unwrap_or(true);
            solved = over || next >= progress.solution.len();
        }

        let feedback = if solved {
            info!("[PUZZLE] {} solved", self.puzzle.id);
            next = progress.solution.len();
            PuzzleFeedback::Solved
        } else {
            PuzzleFeedback::Correct
        };
        edit_mode_state(&self.manager, self.session_id, |mode| {
            if let ModeState::Puzzle(puzzle) = mode {
                puzzle.progress = next;
                puzzle.feedback = Some(feedback);
                puzzle.hint_square = None;
            }
        })
        .into_result()?;
        Ok(feedback)
    }

    /// Reveal the origin square of the expected move
    pub fn hint(&self) -> CommandResult<Option<Square>> {
        let progress = self.puzzle_state()?;
        if progress.is_solved() {
            return Ok(None);
        }
        let Some(expected) = progress.solution.get(progress.progress) else {
            return Ok(None);
        };
        let square = MoveRequest::parse_uci(expected)?.from;

        edit_mode_state(&self.manager, self.session_id, |mode| {
            if let ModeState::Puzzle(puzzle) = mode {
                puzzle.hint_square = Some(square);
            }
        })
        .into_result()?;
        Ok(Some(square))
    }

    pub fn is_solved(&self) -> bool {
        self.puzzle_state().map(|p| p.is_solved()).unwrap_or(false)
    }

    /// Leave the puzzle and deregister the session
    pub fn exit(&self) -> CommandResult<()> {
        let outcome = self.manager.exit_game(self.session_id);
        self.manager.destroy_session(self.session_id);
        outcome.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_puzzle_json_defaults() {
        let raw = r#"{"id":"abc","fen":"8/8/8/8/8/8/8/K6k w - - 0 1","solution":["a1a2"]}"#;
        let puzzle: Puzzle = serde_json::from_str(raw).unwrap();
        assert_eq!(puzzle.rating, None);
        assert!(puzzle.themes.is_empty());
    }
}
