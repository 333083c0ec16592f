//! [`RulesOracle`] implementation backed by `shakmaty`
//!
//! Positions are parsed from FEN on every call; nothing is cached. Castling
//! may be requested either as the king's two-square step (`e1g1`) or as the
//! king moving onto its rook (`e1h1`); both are recorded as `e1g1`.

use super::pgn::{self, PgnGame};
use super::{AppliedMove, MoveRequest, RulesOracle};
use crate::game::error::{RulesError, RulesResult};
use crate::game::types::{PieceColor, PieceType, Square};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position, Role};

/// Standard chess rules
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessRules;

impl ChessRules {
    pub fn new() -> Self {
        Self
    }

    /// Every legal move in the position, in generation order
    pub fn all_legal_moves(&self, fen: &str) -> RulesResult<Vec<MoveRequest>> {
        let pos = parse_position(fen)?;
        Ok(pos.legal_moves().iter().map(|m| request_of(*m)).collect())
    }
}

impl RulesOracle for ChessRules {
    fn legal_moves(&self, fen: &str, square: Square) -> RulesResult<Vec<Square>> {
        let pos = parse_position(fen)?;
        let from = square.to_shakmaty();

        let mut targets = Vec::new();
        for m in pos.legal_moves().iter().filter(|m| m.from() == Some(from)) {
            let to = request_of(*m).to;
            if !targets.contains(&to) {
                targets.push(to);
            }
        }
        Ok(targets)
    }

    fn apply_move(&self, fen: &str, request: &MoveRequest) -> RulesResult<AppliedMove> {
        let pos = parse_position(fen)?;
        let from = request.from.to_shakmaty();
        let to = request.to.to_shakmaty();

        let promotion = request
            .promotion
            .map(PieceType::to_role)
            .or_else(|| default_promotion(&pos, from, to));

        let m = UciMove::Normal {
            from,
            to,
            promotion,
        }
        .to_move(&pos)
        .map_err(|_| RulesError::IllegalMove {
            from: request.from,
            to: request.to,
        })?;

        Ok(play(pos, m))
    }

    fn load_fen(&self, fen: &str) -> RulesResult<String> {
        let pos = parse_position(fen)?;
        Ok(to_fen(&pos))
    }

    fn load_pgn(&self, pgn: &str) -> RulesResult<PgnGame> {
        pgn::parse_pgn(pgn)
    }

    fn checked_king(&self, fen: &str) -> Option<Square> {
        let pos = parse_position(fen).ok()?;
        if !pos.is_check() {
            return None;
        }
        pos.board().king_of(pos.turn()).map(Square::from_shakmaty)
    }

    fn side_to_move(&self, fen: &str) -> RulesResult<PieceColor> {
        let pos = parse_position(fen)?;
        Ok(PieceColor::from_shakmaty(pos.turn()))
    }
}

/// Parse and validate a FEN
pub(crate) fn parse_position(fen: &str) -> RulesResult<Chess> {
    let invalid = |message: String| RulesError::InvalidFen {
        fen: fen.to_string(),
        message,
    };

    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{}", e)))
}

pub(crate) fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Play a move already known to be legal in `pos`
pub(crate) fn play(mut pos: Chess, m: Move) -> AppliedMove {
    let mover = PieceColor::from_shakmaty(pos.turn());
    let captured = m.capture().map(PieceType::from_role);
    let request = request_of(m);

    let san = SanPlus::from_move_and_play_unchecked(&mut pos, m).to_string();

    AppliedMove {
        fen: to_fen(&pos),
        san,
        from: request.from,
        to: request.to,
        promotion: request.promotion,
        mover,
        captured,
        is_check: pos.is_check(),
        is_checkmate: pos.is_checkmate(),
        is_stalemate: pos.is_stalemate(),
        is_insufficient_material: pos.is_insufficient_material(),
    }
}

/// Normalised request for a legal move (castling as the king's step)
fn request_of(m: Move) -> MoveRequest {
    match UciMove::from_standard(m) {
        UciMove::Normal {
            from,
            to,
            promotion,
        } => MoveRequest {
            from: Square::from_shakmaty(from),
            to: Square::from_shakmaty(to),
            promotion: promotion.map(PieceType::from_role),
        },
        // Drops and null moves do not occur in standard chess
        _ => MoveRequest {
            from: Square::from_shakmaty(m.to()),
            to: Square::from_shakmaty(m.to()),
            promotion: None,
        },
    }
}

/// Queen when a pawn reaches the last rank without a promotion piece
fn default_promotion(pos: &Chess, from: shakmaty::Square, to: shakmaty::Square) -> Option<Role> {
    let is_pawn = pos.board().role_at(from) == Some(Role::Pawn);
    let last_rank = matches!(to.rank(), shakmaty::Rank::First | shakmaty::Rank::Eighth);
    (is_pawn && last_rank).then_some(Role::Queen)
}
