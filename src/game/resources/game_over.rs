//! Game over state tracking and result management
//!
//! Tracks end-game conditions (checkmate, stalemate, insufficient material,
//! timeout, resignation, abandonment) and provides methods for determining the
//! game outcome and displaying results.
//!
//! # Game Over Conditions
//!
//! ## Decisive
//! - **Checkmate**: side to move is in check with no legal moves; the mover wins
//! - **Time**: a clock reached zero; the other side wins
//! - **Resignation**: one side gave up; the other side wins
//! - **Abandonment**: the opponent left a multiplayer game
//!
//! ## Draw Conditions
//! - **Stalemate**: current player has no legal moves but is NOT in check
//! - **InsufficientMaterial**: neither player can deliver checkmate (e.g., K vs K)
//!
//! # Integration
//!
//! An outcome is recorded at most once per game, by whichever command first
//! detects a terminal condition, and is cleared only when a fresh game starts.
//!
//! # Reference
//!
//! FIDE Laws of Chess: https://www.fide.com/FIDE/handbook/LawsOfChess.pdf
//! - Article 5: Checkmate, stalemate, draws
//! - Article 6: Time control violations

use crate::game::types::PieceColor;
use serde::{Deserialize, Serialize};
use shared::protocol::{EndReason, Side};

/// Why the game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameOverReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    Time,
    Resignation,
    Abandonment,
}

impl GameOverReason {
    /// Draw reasons never carry a winner
    pub fn is_drawn(self) -> bool {
        matches!(
            self,
            GameOverReason::Stalemate | GameOverReason::InsufficientMaterial
        )
    }
}

impl From<EndReason> for GameOverReason {
    fn from(reason: EndReason) -> Self {
        match reason {
            EndReason::Checkmate => GameOverReason::Checkmate,
            EndReason::Stalemate => GameOverReason::Stalemate,
            EndReason::InsufficientMaterial => GameOverReason::InsufficientMaterial,
            EndReason::Time => GameOverReason::Time,
            EndReason::Resignation => GameOverReason::Resignation,
            EndReason::Abandonment => GameOverReason::Abandonment,
        }
    }
}

/// Who won
///
/// Serializes as `"w"`, `"b"` or `"draw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
    #[serde(rename = "draw")]
    Draw,
}

impl Winner {
    pub fn side(color: PieceColor) -> Self {
        match color {
            PieceColor::White => Winner::White,
            PieceColor::Black => Winner::Black,
        }
    }

    /// Map the server's optional winner, `None` meaning a draw
    pub fn from_wire(side: Option<Side>) -> Self {
        match side {
            Some(side) => Winner::side(side.into()),
            None => Winner::Draw,
        }
    }

    pub fn color(self) -> Option<PieceColor> {
        match self {
            Winner::White => Some(PieceColor::White),
            Winner::Black => Some(PieceColor::Black),
            Winner::Draw => None,
        }
    }
}

/// Recorded result of a finished game
///
/// # Examples
///
/// ```rust,ignore
/// let outcome = GameOutcome::new(GameOverReason::Checkmate, Winner::White);
/// assert_eq!(outcome.message(), "White wins by checkmate!");
/// assert_eq!(outcome.winner_color(), Some(PieceColor::White));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub reason: GameOverReason,
    pub winner: Winner,
}

impl GameOutcome {
    pub fn new(reason: GameOverReason, winner: Winner) -> Self {
        Self { reason, winner }
    }

    /// Checkmate delivered by `mover`
    pub fn checkmate(mover: PieceColor) -> Self {
        Self::new(GameOverReason::Checkmate, Winner::side(mover))
    }

    pub fn draw(reason: GameOverReason) -> Self {
        Self::new(reason, Winner::Draw)
    }

    /// Get a human-readable message describing the game result
    pub fn message(&self) -> String {
        match (self.reason, self.winner.color()) {
            (GameOverReason::Checkmate, Some(c)) => format!("{} wins by checkmate!", c),
            (GameOverReason::Time, Some(c)) => format!("{} wins on time!", c),
            (GameOverReason::Resignation, Some(c)) => format!("{} wins by resignation", c),
            (GameOverReason::Abandonment, Some(c)) => format!("{} wins, opponent left", c),
            (GameOverReason::Stalemate, _) => "Draw by stalemate".to_string(),
            (GameOverReason::InsufficientMaterial, _) => {
                "Draw by insufficient material".to_string()
            }
            (_, None) => "Game drawn".to_string(),
        }
    }

    /// Get the winner of the game, `None` for draws
    pub fn winner_color(&self) -> Option<PieceColor> {
        self.winner.color()
    }

    pub fn is_draw(&self) -> bool {
        self.winner == Winner::Draw
    }

    /// PGN result token
    pub fn pgn_result(&self) -> &'static str {
        match self.winner {
            Winner::White => "1-0",
            Winner::Black => "0-1",
            Winner::Draw => "1/2-1/2",
        }
    }
}
