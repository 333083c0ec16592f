//! Authoritative session state
//!
//! [`SessionState`] is the single record a [`super::SessionManager`] keeps per
//! game. It is plain data: every mutation happens in the reducer, on a clone,
//! and is committed only when the whole command succeeded.
//!
//! # Position storage
//!
//! The position is a sum type rather than a set of flags:
//!
//! ```text
//! PositionState::Confirmed(line)                   local or server-agreed
//! PositionState::Optimistic { confirmed, provisional }
//!                                                  provisional = confirmed + 1 ply
//! ```
//!
//! Rolling back a rejected move is `Optimistic -> Confirmed(confirmed)`; no
//! field is patched by hand.

use crate::game::ai::engine::Evaluation;
use crate::game::resources::{CapturedPieces, GameOutcome, MoveHistory, MoveRecord};
use crate::game::rules::{AppliedMove, STARTING_FEN};
use crate::game::session::lifecycle::Lifecycle;
use crate::game::types::{GameMode, OpponentType, PieceColor, SessionId, Square, TimeControl};
use serde::{Deserialize, Serialize};

/// A position together with the moves and captures that led to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub fen: String,
    pub history: MoveHistory,
    pub captured: CapturedPieces,
}

impl Line {
    /// Empty line at `fen`
    pub fn start(fen: impl Into<String>) -> Self {
        Self {
            fen: fen.into(),
            history: MoveHistory::default(),
            captured: CapturedPieces::default(),
        }
    }

    /// Build a line from moves already applied from `initial_fen`
    pub fn from_moves(initial_fen: &str, moves: &[AppliedMove]) -> Self {
        let mut line = Self::start(initial_fen);
        for applied in moves {
            line.push_record(MoveRecord::from_applied(applied));
        }
        line
    }

    pub fn push(&mut self, applied: &AppliedMove) {
        self.push_record(MoveRecord::from_applied(applied));
    }

    pub fn push_record(&mut self, record: MoveRecord) {
        if let Some(piece) = record.captured {
            self.captured.add_capture(record.color.opposite(), piece);
        }
        self.fen = record.fen_after.clone();
        self.history.add_move(record);
    }
}

/// Confirmed position, or a local move awaiting the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Confirmed(Line),
    Optimistic { confirmed: Line, provisional: Line },
}

impl PositionState {
    /// The line shown to the player
    pub fn current(&self) -> &Line {
        match self {
            PositionState::Confirmed(line) => line,
            PositionState::Optimistic { provisional, .. } => provisional,
        }
    }

    /// Last line the authority agreed to
    pub fn confirmed(&self) -> &Line {
        match self {
            PositionState::Confirmed(line) => line,
            PositionState::Optimistic { confirmed, .. } => confirmed,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, PositionState::Optimistic { .. })
    }

    /// Accept the provisional line
    pub fn commit(self) -> Line {
        match self {
            PositionState::Confirmed(line) => line,
            PositionState::Optimistic { provisional, .. } => provisional,
        }
    }

    /// Discard the provisional line
    pub fn rollback(self) -> Line {
        match self {
            PositionState::Confirmed(line) => line,
            PositionState::Optimistic { confirmed, .. } => confirmed,
        }
    }
}

/// Last server-authoritative clock reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub white_time_ms: i64,
    pub black_time_ms: i64,
}

impl ClockState {
    /// Negative readings clamp to zero
    pub fn new(white_time_ms: i64, black_time_ms: i64) -> Self {
        Self {
            white_time_ms: white_time_ms.max(0),
            black_time_ms: black_time_ms.max(0),
        }
    }

    pub fn from_time_control(tc: &TimeControl) -> Self {
        Self::new(tc.initial_ms(), tc.initial_ms())
    }
}

/// How good a training move was, by centipawn loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveQuality {
    Best,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveQuality {
    pub fn from_centipawn_loss(loss: i32) -> Self {
        match loss {
            i32::MIN..=10 => MoveQuality::Best,
            11..=50 => MoveQuality::Good,
            51..=100 => MoveQuality::Inaccuracy,
            101..=250 => MoveQuality::Mistake,
            _ => MoveQuality::Blunder,
        }
    }
}

/// Feedback on the player's last training move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFeedback {
    pub san: String,
    pub quality: MoveQuality,
    pub centipawn_loss: i32,
    /// Engine's preferred move in the position before, UCI
    pub best_move: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Suggested move, UCI
    pub hint: Option<String>,
    pub hint_san: Option<String>,
    pub feedback: Option<MoveFeedback>,
}

/// Verdict on the last submitted puzzle move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleFeedback {
    Correct,
    Incorrect,
    Solved,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleState {
    pub puzzle_id: String,
    /// Full solution, UCI, alternating player and reply
    pub solution: Vec<String>,
    /// Index of the next expected solution move
    pub progress: usize,
    pub mistakes: u32,
    pub feedback: Option<PuzzleFeedback>,
    /// Origin square of the expected move, once a hint was requested
    pub hint_square: Option<Square>,
}

impl PuzzleState {
    pub fn is_solved(&self) -> bool {
        self.feedback == Some(PuzzleFeedback::Solved)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisState {
    pub evaluation: Option<Evaluation>,
    /// Position the evaluation belongs to
    pub evaluated_fen: Option<String>,
    pub evaluating: bool,
}

/// Mode-specific data, written only by the owning controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ModeState {
    Play,
    Training(TrainingState),
    Puzzle(PuzzleState),
    Analysis(AnalysisState),
}

impl ModeState {
    pub fn for_mode(mode: GameMode) -> Self {
        match mode {
            GameMode::Play => ModeState::Play,
            GameMode::Training => ModeState::Training(TrainingState::default()),
            GameMode::Puzzle => ModeState::Puzzle(PuzzleState::default()),
            GameMode::Analysis => ModeState::Analysis(AnalysisState::default()),
        }
    }

    pub fn mode(&self) -> GameMode {
        match self {
            ModeState::Play => GameMode::Play,
            ModeState::Training(_) => GameMode::Training,
            ModeState::Puzzle(_) => GameMode::Puzzle,
            ModeState::Analysis(_) => GameMode::Analysis,
        }
    }
}

/// Parameters for a new session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub mode: GameMode,
    pub player_color: PieceColor,
    pub opponent_type: OpponentType,
    pub time_control: Option<TimeControl>,
    /// Starting position; the standard one when `None`
    pub initial_fen: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::Play,
            player_color: PieceColor::White,
            opponent_type: OpponentType::Ai,
            time_control: None,
            initial_fen: None,
        }
    }
}

impl SessionConfig {
    pub fn new(mode: GameMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: PieceColor) -> Self {
        self.player_color = color;
        self
    }

    pub fn with_opponent(mut self, opponent: OpponentType) -> Self {
        self.opponent_type = opponent;
        self
    }

    pub fn with_time_control(mut self, tc: TimeControl) -> Self {
        self.time_control = Some(tc);
        self
    }

    pub fn with_fen(mut self, fen: impl Into<String>) -> Self {
        self.initial_fen = Some(fen.into());
        self
    }
}

/// Authoritative record of one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub mode: GameMode,
    pub player_color: PieceColor,
    pub opponent_type: OpponentType,
    pub time_control: Option<TimeControl>,
    /// Position move 0 of the history is played from
    pub initial_fen: String,
    pub position: PositionState,
    pub view_fen: String,
    /// `-1` is the initial position
    pub view_move_index: i32,
    pub outcome: Option<GameOutcome>,
    /// Evaluation recorded when the game ended
    pub final_eval: Option<i32>,
    pub lifecycle: Lifecycle,
    /// Message carried by the last failure transition
    pub lifecycle_error: Option<String>,
    pub mode_state: ModeState,
    /// Last rejection reason from the server
    pub move_error: Option<String>,
    pub clock: Option<ClockState>,
}

impl SessionState {
    /// Fresh idle session; `initial_fen` must already be validated
    pub fn new(session_id: SessionId, config: &SessionConfig, initial_fen: String) -> Self {
        Self {
            session_id,
            mode: config.mode,
            player_color: config.player_color,
            opponent_type: config.opponent_type,
            time_control: config.time_control,
            position: PositionState::Confirmed(Line::start(initial_fen.clone())),
            view_fen: initial_fen.clone(),
            initial_fen,
            view_move_index: -1,
            outcome: None,
            final_eval: None,
            lifecycle: Lifecycle::Idle,
            lifecycle_error: None,
            mode_state: ModeState::for_mode(config.mode),
            move_error: None,
            clock: config.time_control.as_ref().map(ClockState::from_time_control),
        }
    }

    /// Clear everything a previous game left behind
    pub(crate) fn reset_for_new_game(&mut self) {
        self.position = PositionState::Confirmed(Line::start(self.initial_fen.clone()));
        self.view_fen = self.initial_fen.clone();
        self.view_move_index = -1;
        self.outcome = None;
        self.final_eval = None;
        self.lifecycle_error = None;
        self.mode_state = ModeState::for_mode(self.mode);
        self.move_error = None;
        self.clock = self.time_control.as_ref().map(ClockState::from_time_control);
    }

    /// Canonical position
    pub fn fen(&self) -> &str {
        &self.position.current().fen
    }

    pub fn history(&self) -> &MoveHistory {
        &self.position.current().history
    }

    pub fn captured(&self) -> &CapturedPieces {
        &self.position.current().captured
    }

    pub fn is_game_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn has_pending_move(&self) -> bool {
        self.position.is_provisional()
    }

    /// Point the view at the tail of the current line
    pub(crate) fn view_tail(&mut self) {
        let line = self.position.current();
        self.view_fen = line.fen.clone();
        self.view_move_index = line.history.len() as i32 - 1;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(
            SessionId::new(),
            &SessionConfig::default(),
            STARTING_FEN.to_string(),
        )
    }
}
