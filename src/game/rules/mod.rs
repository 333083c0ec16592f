//! Chess rules module - the move-legality oracle
//!
//! Sessions never reason about chess rules themselves. Every legality check,
//! SAN generation, FEN parse and terminal-state detection goes through a
//! [`RulesOracle`], a pure function library over FEN strings.
//!
//! # Architecture
//!
//! - [`RulesOracle`] - the seam sessions depend on (`Arc<dyn RulesOracle>`)
//! - [`ChessRules`] - the shipped implementation, backed by `shakmaty`
//! - [`pgn`] - PGN movetext import and export
//! - [`material`] - board-level helpers that do not validate moves (used by
//!   the server-authoritative sync path)
//!
//! # Module Structure
//!
//! ```text
//! fen + MoveRequest ──► RulesOracle::apply_move ──► AppliedMove { fen, san, flags }
//! ```
//!
//! # Reference
//!
//! - shakmaty docs: https://docs.rs/shakmaty
//! - PGN standard: http://www.saremba.de/chessgml/standards/pgn/pgn-complete.htm

pub mod material;
pub mod pgn;
pub mod shakmaty_oracle;


use crate::game::error::{RulesError, RulesResult};
use crate::game::resources::game_over::{GameOutcome, GameOverReason};
use crate::game::types::{PieceColor, PieceType, Square};
use serde::{Deserialize, Serialize};

pub use pgn::{PgnGame, PgnMeta};
pub use shakmaty_oracle::ChessRules;

/// Standard starting position
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A move as entered by a player or engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    /// `None` on a promoting pawn move means queen
    pub promotion: Option<PieceType>,
}

impl MoveRequest {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: PieceType) -> Self {
        self.promotion = Some(piece);
        self
    }

    /// Parse UCI notation (`e2e4`, `e7e8q`)
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidNotation`] for anything that is not
    /// two squares plus an optional promotion letter.
    pub fn parse_uci(uci: &str) -> RulesResult<Self> {
        let uci = uci.trim();
        let invalid = || RulesError::InvalidNotation(uci.to_string());

        if !uci.is_ascii() || !(4..=5).contains(&uci.len()) {
            return Err(invalid());
        }
        let from = Square::from_algebraic(&uci[0..2]).ok_or_else(invalid)?;
        let to = Square::from_algebraic(&uci[2..4]).ok_or_else(invalid)?;
        let promotion = match uci[4..].chars().next() {
            Some(c) => Some(PieceType::from_char(c).ok_or_else(invalid)?),
            None => None,
        };

        Ok(Self {
            from,
            to,
            promotion,
        })
    }

    pub fn to_uci(&self) -> String {
        match self.promotion {
            Some(piece) => format!("{}{}{}", self.from, self.to, piece.to_char()),
            None => format!("{}{}", self.from, self.to),
        }
    }
}

/// Result of a legal move applied by the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMove {
    /// Position after the move
    pub fen: String,
    pub san: String,
    pub from: Square,
    /// King destination for castling, whatever square the request named
    pub to: Square,
    pub promotion: Option<PieceType>,
    pub mover: PieceColor,
    pub captured: Option<PieceType>,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
    pub is_insufficient_material: bool,
}

impl AppliedMove {
    /// Terminal condition reached by this move, if any
    pub fn terminal(&self) -> Option<GameOutcome> {
        if self.is_checkmate {
            Some(GameOutcome::checkmate(self.mover))
        } else if self.is_stalemate {
            Some(GameOutcome::draw(GameOverReason::Stalemate))
        } else if self.is_insufficient_material {
            Some(GameOutcome::draw(GameOverReason::InsufficientMaterial))
        } else {
            None
        }
    }

    pub fn request(&self) -> MoveRequest {
        MoveRequest {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

/// Move-legality oracle
///
/// Implementations must be pure: the same inputs always give the same output
/// and no call mutates shared state.
pub trait RulesOracle: Send + Sync {
    /// Legal destination squares for the piece on `square`
    fn legal_moves(&self, fen: &str, square: Square) -> RulesResult<Vec<Square>>;

    /// Validate and apply `request`
    ///
    /// # Errors
    ///
    /// [`RulesError::IllegalMove`] if the move is not legal, or
    /// [`RulesError::InvalidFen`] if `fen` does not parse.
    fn apply_move(&self, fen: &str, request: &MoveRequest) -> RulesResult<AppliedMove>;

    /// Validate `fen`, returning it in normalised form
    fn load_fen(&self, fen: &str) -> RulesResult<String>;

    /// Parse a PGN into its starting position and validated moves
    fn load_pgn(&self, pgn: &str) -> RulesResult<PgnGame>;

    /// Square of the king in check, if the side to move is in check
    fn checked_king(&self, fen: &str) -> Option<Square>;

    fn side_to_move(&self, fen: &str) -> RulesResult<PieceColor>;
}

/// Replay `moves` from `initial_fen`, stopping at the first illegal one
pub fn replay(
    oracle: &dyn RulesOracle,
    initial_fen: &str,
    moves: &[MoveRequest],
) -> RulesResult<Vec<AppliedMove>> {
    let mut applied = Vec::with_capacity(moves.len());
    let mut fen = initial_fen.to_string();
    for request in moves {
        let next = oracle.apply_move(&fen, request)?;
        fen = next.fen.clone();
        applied.push(next);
    }
    Ok(applied)
}

/// Compare the placement, side, castling and en passant fields of two FENs
///
/// Move counters are ignored; they carry no position information.
pub fn same_position(a: &str, b: &str) -> bool {
    fn fields(fen: &str) -> Vec<&str> {
        fen.split_whitespace().take(4).collect()
    }
    fields(a) == fields(b)
}

/// Side-to-move field of a FEN, without validating the rest
pub fn fen_side_to_move(fen: &str) -> Option<PieceColor> {
    match fen.split_whitespace().nth(1) {
        Some("w") => Some(PieceColor::White),
        Some("b") => Some(PieceColor::Black),
        _ => None,
    }
}
