//! Type definitions and utilities for chess game logic
//!
//! Provides newtype patterns and trait implementations for chess-specific types
//! to improve type safety and code clarity. Everything here is plain data that
//! serializes to the compact notations used in FEN, SAN and the wire protocol.

use crate::game::error::RulesError;
use serde::{Deserialize, Serialize};
use shared::protocol::Side;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Side to move / piece owner
///
/// Serializes as `"w"` / `"b"` to match the FEN side-to-move field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PieceColor {
    #[default]
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl PieceColor {
    pub fn opposite(self) -> PieceColor {
        match self {
            PieceColor::White => PieceColor::Black,
            PieceColor::Black => PieceColor::White,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            PieceColor::White => 'w',
            PieceColor::Black => 'b',
        }
    }

    pub fn from_shakmaty(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => PieceColor::White,
            shakmaty::Color::Black => PieceColor::Black,
        }
    }

    pub fn to_shakmaty(self) -> shakmaty::Color {
        match self {
            PieceColor::White => shakmaty::Color::White,
            PieceColor::Black => shakmaty::Color::Black,
        }
    }
}

impl From<Side> for PieceColor {
    fn from(side: Side) -> Self {
        match side {
            Side::White => PieceColor::White,
            Side::Black => PieceColor::Black,
        }
    }
}

impl From<PieceColor> for Side {
    fn from(color: PieceColor) -> Self {
        match color {
            PieceColor::White => Side::White,
            PieceColor::Black => Side::Black,
        }
    }
}

impl fmt::Display for PieceColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PieceColor::White => f.write_str("White"),
            PieceColor::Black => f.write_str("Black"),
        }
    }
}

/// Piece kind, serialized as the lowercase FEN letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceType {
    #[serde(rename = "k")]
    King,
    #[serde(rename = "q")]
    Queen,
    #[serde(rename = "b")]
    Bishop,
    #[serde(rename = "n")]
    Knight,
    #[serde(rename = "r")]
    Rook,
    #[serde(rename = "p")]
    Pawn,
}

impl PieceType {
    /// Lowercase piece code (`'p'`, `'n'`, ...)
    pub fn to_char(self) -> char {
        self.to_role().char()
    }

    /// Parse a piece code, case-insensitive
    pub fn from_char(c: char) -> Option<Self> {
        shakmaty::Role::from_char(c.to_ascii_lowercase()).map(Self::from_role)
    }

    /// Material value in pawns (king counts as 0)
    pub fn value(self) -> i32 {
        match self {
            PieceType::Pawn => 1,
            PieceType::Knight => 3,
            PieceType::Bishop => 3,
            PieceType::Rook => 5,
            PieceType::Queen => 9,
            PieceType::King => 0,
        }
    }

    pub fn from_role(role: shakmaty::Role) -> Self {
        match role {
            shakmaty::Role::Pawn => PieceType::Pawn,
            shakmaty::Role::Knight => PieceType::Knight,
            shakmaty::Role::Bishop => PieceType::Bishop,
            shakmaty::Role::Rook => PieceType::Rook,
            shakmaty::Role::Queen => PieceType::Queen,
            shakmaty::Role::King => PieceType::King,
        }
    }

    pub fn to_role(self) -> shakmaty::Role {
        match self {
            PieceType::Pawn => shakmaty::Role::Pawn,
            PieceType::Knight => shakmaty::Role::Knight,
            PieceType::Bishop => shakmaty::Role::Bishop,
            PieceType::Rook => shakmaty::Role::Rook,
            PieceType::Queen => shakmaty::Role::Queen,
            PieceType::King => shakmaty::Role::King,
        }
    }
}

/// Board coordinate representing a file (column) on the chessboard
///
/// Values range from 0 (file 'a') to 7 (file 'h').
/// This newtype prevents mixing up x and y coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct File(u8);

impl File {
    /// Create a file from a character ('a'..='h')
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let file = File::from_char('e').unwrap(); // File 4
    /// ```
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'a'..='h' => Some(File(c as u8 - b'a')),
            _ => None,
        }
    }

    /// Convert file to character ('a'..='h')
    pub fn to_char(self) -> char {
        (b'a' + self.0) as char
    }

    /// Get the file index (0-7)
    pub fn index(self) -> u8 {
        self.0
    }
}

/// Board coordinate representing a rank (row) on the chessboard
///
/// Values range from 0 (rank 1) to 7 (rank 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rank(u8);

impl Rank {
    /// Create a rank from a number (1-8)
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let rank = Rank::from_number(4).unwrap(); // Rank 3 (0-indexed)
    /// ```
    pub fn from_number(n: u8) -> Option<Self> {
        if (1..=8).contains(&n) {
            Some(Rank(n - 1))
        } else {
            None
        }
    }

    /// Convert rank to number (1-8)
    pub fn to_number(self) -> u8 {
        self.0 + 1
    }

    /// Get the rank index (0-7)
    pub fn index(self) -> u8 {
        self.0
    }
}

/// Board square position (file, rank)
///
/// Combines File and Rank into a single type-safe coordinate. Serializes as
/// algebraic notation (`"e4"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    pub file: File,
    pub rank: Rank,
}

impl Square {
    /// Create a square from file and rank indices, `None` when out of range
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let square = Square::new(4, 3).unwrap(); // e4
    /// ```
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Square {
                file: File(file),
                rank: Rank(rank),
            })
        } else {
            None
        }
    }

    /// Create a square from algebraic notation (e.g., "e4")
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let file_char = chars.next()?;
        let rank_char = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let rank_num = rank_char.to_digit(10)? as u8;

        Some(Square {
            file: File::from_char(file_char)?,
            rank: Rank::from_number(rank_num)?,
        })
    }

    /// Convert square to algebraic notation (e.g., "e4")
    pub fn to_algebraic(self) -> String {
        format!("{}{}", self.file.to_char(), self.rank.to_number())
    }

    pub fn to_shakmaty(self) -> shakmaty::Square {
        shakmaty::Square::from_coords(
            shakmaty::File::new(u32::from(self.file.0)),
            shakmaty::Rank::new(u32::from(self.rank.0)),
        )
    }

    pub fn from_shakmaty(square: shakmaty::Square) -> Self {
        Square {
            file: File(square.file().to_u32() as u8),
            rank: Rank(square.rank().to_u32() as u8),
        }
    }
}

impl FromStr for Square {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Square::from_algebraic(s).ok_or_else(|| RulesError::InvalidSquare(s.to_string()))
    }
}

impl TryFrom<String> for Square {
    type Error = RulesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_algebraic()
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file.to_char(), self.rank.to_number())
    }
}

/// Which flavour of game a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Play,
    Training,
    Puzzle,
    Analysis,
}

/// Who sits on the other side of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpponentType {
    #[default]
    Ai,
    Human,
}

/// Fischer time control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    pub minutes: u32,
    pub increment_seconds: u32,
}

impl TimeControl {
    pub fn new(minutes: u32, increment_seconds: u32) -> Self {
        Self {
            minutes,
            increment_seconds,
        }
    }

    pub fn initial_ms(&self) -> i64 {
        i64::from(self.minutes) * 60_000
    }

    pub fn increment_ms(&self) -> i64 {
        i64::from(self.increment_seconds) * 1_000
    }
}

impl Default for TimeControl {
    /// 10+0 rapid
    fn default() -> Self {
        Self::new(10, 0)
    }
}

/// Opaque session identifier, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_to_char() {
        assert_eq!(File(0).to_char(), 'a');
        assert_eq!(File(4).to_char(), 'e');
        assert_eq!(File(7).to_char(), 'h');
    }

    #[test]
    fn test_rank_from_number() {
        assert_eq!(Rank::from_number(1), Some(Rank(0)));
        assert_eq!(Rank::from_number(8), Some(Rank(7)));
        assert_eq!(Rank::from_number(0), None);
        assert_eq!(Rank::from_number(9), None);
    }

    #[test]
    fn test_square_algebraic() {
        let square = Square::from_algebraic("e4").unwrap();
        assert_eq!(square.file.index(), 4);
        assert_eq!(square.rank.index(), 3);
        assert_eq!(square.to_algebraic(), "e4");

        assert!(Square::from_algebraic("i1").is_none());
        assert!(Square::from_algebraic("e44").is_none());
        assert!("z9".parse::<Square>().is_err());
    }

    #[test]
    fn test_square_shakmaty_conversion() {
        //! Our square and shakmaty's must agree on every coordinate
        for file in 0..8 {
            for rank in 0..8 {
                let square = Square::new(file, rank).unwrap();
                let sk = square.to_shakmaty();
                assert_eq!(sk.to_string(), square.to_string());
                assert_eq!(Square::from_shakmaty(sk), square);
            }
        }
        assert!(Square::new(8, 0).is_none());
    }

    #[test]
    fn test_square_serializes_as_string() {
        let square: Square = "g7".parse().unwrap();
        assert_eq!(serde_json::to_string(&square).unwrap(), "\"g7\"");
        let back: Square = serde_json::from_str("\"g7\"").unwrap();
        assert_eq!(back, square);
        assert!(serde_json::from_str::<Square>("\"k9\"").is_err());
    }

    #[test]
    fn test_piece_codes() {
        assert_eq!(PieceType::Knight.to_char(), 'n');
        assert_eq!(PieceType::from_char('Q'), Some(PieceType::Queen));
        assert_eq!(PieceType::from_char('x'), None);
        assert_eq!(serde_json::to_string(&PieceType::Pawn).unwrap(), "\"p\"");
        assert_eq!(serde_json::to_string(&PieceColor::White).unwrap(), "\"w\"");
    }

    #[test]
    fn test_color_side_mapping() {
        assert_eq!(PieceColor::from(Side::Black), PieceColor::Black);
        assert_eq!(Side::from(PieceColor::White), Side::White);
        assert_eq!(PieceColor::White.opposite(), PieceColor::Black);
    }

    #[test]
    fn test_time_control_millis() {
        let tc = TimeControl::new(5, 3);
        assert_eq!(tc.initial_ms(), 300_000);
        assert_eq!(tc.increment_ms(), 3_000);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
