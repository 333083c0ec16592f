//! Board-level material helpers
//!
//! These read only the piece placement field of a FEN and never check move
//! legality. They serve the server-authoritative path, where a move arrives
//! already validated together with its resulting position.

use crate::game::error::{RulesError, RulesResult};
use crate::game::types::{PieceColor, PieceType};
use shakmaty::{Board, ByRole, Color, Role};

fn parse_board(fen: &str) -> RulesResult<Board> {
    let placement = fen.split_whitespace().next().unwrap_or_default();
    placement.parse().map_err(|e| RulesError::InvalidFen {
        fen: fen.to_string(),
        message: format!("{}", e),
    })
}

fn count(material: &ByRole<u8>, role: Role) -> u8 {
    match role {
        Role::Pawn => material.pawn,
        Role::Knight => material.knight,
        Role::Bishop => material.bishop,
        Role::Rook => material.rook,
        Role::Queen => material.queen,
        Role::King => material.king,
    }
}

/// Piece of `victim` that disappeared between two positions
///
/// Promotions change only the mover's material, so comparing the victim's
/// side alone identifies the captured piece.
pub fn captured_piece(
    before_fen: &str,
    after_fen: &str,
    victim: PieceColor,
) -> RulesResult<Option<PieceType>> {
    let color: Color = victim.to_shakmaty();
    let before = parse_board(before_fen)?.material_side(color);
    let after = parse_board(after_fen)?.material_side(color);

    Ok(Role::ALL
        .into_iter()
        .find(|role| count(&after, *role) < count(&before, *role))
        .map(PieceType::from_role))
}

/// Material balance in pawns, positive when White is ahead
pub fn material_balance(fen: &str) -> RulesResult<i32> {
    let board = parse_board(fen)?;
    let side_total = |color: Color| -> i32 {
        let material = board.material_side(color);
        Role::ALL
            .into_iter()
            .map(|role| i32::from(count(&material, role)) * PieceType::from_role(role).value())
            .sum()
    };
    Ok(side_total(Color::White) - side_total(Color::Black))
}
