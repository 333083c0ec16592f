//! Captured pieces tracking
//!
//! Tracks pieces captured by each player and calculates material advantage.
//!
//! # Material Values
//!
//! Standard chess piece values in pawns:
//! - Pawn: 1
//! - Knight/Bishop: 3
//! - Rook: 5
//! - Queen: 9
//! - King: 0 (cannot be captured)
//!
//! # Material Advantage
//!
//! Positive advantage means White is ahead, negative means Black is ahead.
//! Example: If White captured (Rook=5, Pawn=1) and Black captured (Knight=3),
//! White's advantage is (5+1) - 3 = +3 pawns.

use crate::game::resources::history::MoveRecord;
use crate::game::types::{PieceColor, PieceType};
use serde::{Deserialize, Serialize};

/// Captured pieces for both sides
///
/// # Fields
///
/// - `white_captured`: Black pieces that White has captured
/// - `black_captured`: White pieces that Black has captured
///
/// # Usage
///
/// ```rust,ignore
/// captured_pieces.add_capture(PieceColor::Black, PieceType::Queen);
/// let advantage = captured_pieces.material_advantage(); // +9 for White
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPieces {
    /// Pieces captured by white (black pieces taken)
    pub white_captured: Vec<PieceType>,
    /// Pieces captured by black (white pieces taken)
    pub black_captured: Vec<PieceType>,
}

impl CapturedPieces {
    /// Rebuild the capture lists from a sequence of played moves
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a MoveRecord>) -> Self {
        let mut captured = Self::default();
        for record in records {
            if let Some(piece) = record.captured {
                captured.add_capture(record.color.opposite(), piece);
            }
        }
        captured
    }

    /// Record a piece capture
    ///
    /// # Arguments
    ///
    /// * `captured_piece_color` - Color of the piece that was captured
    /// * `piece_type` - Type of piece that was captured
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// // White captures Black's queen
    /// captured.add_capture(PieceColor::Black, PieceType::Queen);
    /// assert_eq!(captured.white_captured.len(), 1);
    /// ```
    pub fn add_capture(&mut self, captured_piece_color: PieceColor, piece_type: PieceType) {
        match captured_piece_color {
            PieceColor::White => self.black_captured.push(piece_type),
            PieceColor::Black => self.white_captured.push(piece_type),
        }
    }

    /// Get material advantage in pawns
    ///
    /// Returns positive if White is ahead, negative if Black is ahead, 0 if equal.
    pub fn material_advantage(&self) -> i32 {
        let white_score: i32 = self.white_captured.iter().map(|p| p.value()).sum();
        let black_score: i32 = self.black_captured.iter().map(|p| p.value()).sum();
        white_score - black_score
    }

    /// Clear all captured pieces (for new game)
    pub fn clear(&mut self) {
        self.white_captured.clear();
        self.black_captured.clear();
    }
}
