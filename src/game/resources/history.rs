//! Move history
//!
//! Ordered record of the plies played in a session. Each [`MoveRecord`]
//! carries enough to replay the move through the rules oracle (`from`, `to`,
//! `promotion`) plus the SAN shown to the player and the position it produced.

use crate::game::rules::{AppliedMove, MoveRequest};
use crate::game::types::{PieceColor, PieceType, Square};
use serde::{Deserialize, Serialize};

/// One played ply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Standard algebraic notation, with check/mate suffix
    pub san: String,
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>,
    /// Side that made the move
    pub color: PieceColor,
    /// Piece removed from the board, if any
    pub captured: Option<PieceType>,
    /// Position after the move
    pub fen_after: String,
}

impl MoveRecord {
    pub fn from_applied(applied: &AppliedMove) -> Self {
        Self {
            san: applied.san.clone(),
            from: applied.from,
            to: applied.to,
            promotion: applied.promotion,
            color: applied.mover,
            captured: applied.captured,
            fen_after: applied.fen.clone(),
        }
    }

    /// The request that replays this move
    pub fn request(&self) -> MoveRequest {
        MoveRequest {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

/// Plies in play order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveHistory {
    moves: Vec<MoveRecord>,
}

impl MoveHistory {
    pub fn add_move(&mut self, record: MoveRecord) {
        self.moves.push(record);
    }

    /// Keep only the first `plies` moves
    pub fn truncate(&mut self, plies: usize) {
        self.moves.truncate(plies);
    }

    /// Get the last move made
    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.moves.last()
    }

    pub fn last_move_mut(&mut self) -> Option<&mut MoveRecord> {
        self.moves.last_mut()
    }

    pub fn get(&self, index: usize) -> Option<&MoveRecord> {
        self.moves.get(index)
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MoveRecord> {
        self.moves.iter()
    }

    /// SAN list in play order
    pub fn sans(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.san.clone()).collect()
    }

    /// Replay requests for the first `plies` moves
    pub fn requests(&self, plies: usize) -> Vec<MoveRequest> {
        self.moves
            .iter()
            .take(plies)
            .map(MoveRecord::request)
            .collect()
    }
}

impl<'a> IntoIterator for &'a MoveHistory {
    type Item = &'a MoveRecord;
    type IntoIter = std::slice::Iter<'a, MoveRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.moves.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(san: &str, from: &str, to: &str) -> MoveRecord {
        MoveRecord {
            san: san.to_string(),
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
            promotion: None,
            color: PieceColor::White,
            captured: None,
            fen_after: String::new(),
        }
    }

    #[test]
    fn test_history_records_in_order() {
        let mut history = MoveHistory::default();
        assert!(history.is_empty());

        history.add_move(record("e4", "e2", "e4"));
        history.add_move(record("e5", "e7", "e5"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.sans(), vec!["e4", "e5"]);
        assert_eq!(history.get(0).map(|m| m.san.as_str()), Some("e4"));
        assert_eq!(history.last_move().map(|m| m.san.as_str()), Some("e5"));
    }

    #[test]
    fn test_history_truncate_and_requests() {
        let mut history = MoveHistory::default();
        history.add_move(record("e4", "e2", "e4"));
        history.add_move(record("e5", "e7", "e5"));
        history.add_move(record("Nf3", "g1", "f3"));

        let requests = history.requests(2);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].to_uci(), "e7e5");

        history.truncate(1);
        assert_eq!(history.sans(), vec!["e4"]);
    }

    #[test]
    fn test_request_keeps_promotion() {
        let mut promo = record("e8=Q", "e7", "e8");
        promo.promotion = Some(PieceType::Queen);
        assert_eq!(promo.request().to_uci(), "e7e8q");
    }
}
