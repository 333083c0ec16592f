//! AI opponent configuration
//!
//! Configures which side the engine plays and how long it thinks.
//!
//! # Difficulty Levels
//!
//! AI difficulty is controlled by search time, which directly affects search depth:
//!
//! | Difficulty | Time/Move | Typical Depth | Strength       |
//! |------------|-----------|---------------|----------------|
//! | Easy       | 0.5s      | 3-4 ply       | Beginner (800) |
//! | Medium     | 1.5s      | 5-6 ply       | Club (1400)    |
//! | Hard       | 3.0s      | 7-8 ply       | Strong (1800+) |
//!
//! The time is passed to the engine as `go movetime`.
//!
//! # Integration
//!
//! Play and training controllers build an [`AiOpponent`] from the session's
//! player color and the persisted settings:
//!
//! ```rust,ignore
//! let ai = AiOpponent::against(PieceColor::White, settings.difficulty);
//! let limits = ai.search_limits();
//! let reply = engine.best_move(&fen, limits).await?;
//! ```

use crate::game::ai::engine::SearchLimits;
use crate::game::types::PieceColor;
use serde::{Deserialize, Serialize};

/// The engine side of a game against the computer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiOpponent {
    /// The color the AI will play
    pub ai_color: PieceColor,
    pub difficulty: AIDifficulty,
}

impl AiOpponent {
    /// AI taking the other side from `player_color`
    pub fn against(player_color: PieceColor, difficulty: AIDifficulty) -> Self {
        Self {
            ai_color: player_color.opposite(),
            difficulty,
        }
    }

    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits::movetime(self.difficulty.movetime_ms())
    }
}

impl Default for AiOpponent {
    /// AI plays Black at medium strength
    fn default() -> Self {
        Self::against(PieceColor::White, AIDifficulty::Medium)
    }
}

/// AI difficulty levels corresponding to search time
///
/// # Examples
///
/// ```rust,ignore
/// let difficulty = AIDifficulty::Medium;
/// println!("AI will think for {} seconds", difficulty.seconds_per_move());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIDifficulty {
    /// Easy - 0.5 seconds per move
    Easy,
    /// Medium - 1.5 seconds per move
    #[default]
    Medium,
    /// Hard - 3.0 seconds per move
    Hard,
}

impl AIDifficulty {
    /// Get the time allocation for this difficulty level
    ///
    /// # Returns
    ///
    /// Time in seconds as f32:
    /// - Easy: 0.5s
    /// - Medium: 1.5s
    /// - Hard: 3.0s
    pub fn seconds_per_move(self) -> f32 {
        match self {
            AIDifficulty::Easy => 0.5,
            AIDifficulty::Medium => 1.5,
            AIDifficulty::Hard => 3.0,
        }
    }

    /// Search time handed to the engine
    pub fn movetime_ms(self) -> u64 {
        match self {
            AIDifficulty::Easy => 500,
            AIDifficulty::Medium => 1_500,
            AIDifficulty::Hard => 3_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_opponent_default() {
        //! Verifies the AI defaults to Black at medium difficulty
        let ai = AiOpponent::default();
        assert_eq!(ai.ai_color, PieceColor::Black);
        assert_eq!(ai.difficulty, AIDifficulty::Medium);
        assert_eq!(ai.search_limits().movetime_ms, Some(1_500));
    }

    #[test]
    fn test_ai_difficulty_time_allocation() {
        //! Verifies difficulty time allocations are correct
        assert_eq!(AIDifficulty::Easy.seconds_per_move(), 0.5);
        assert_eq!(AIDifficulty::Medium.seconds_per_move(), 1.5);
        assert_eq!(AIDifficulty::Hard.seconds_per_move(), 3.0);
    }

    #[test]
    fn test_time_increases_with_difficulty() {
        //! Verifies harder difficulties get more thinking time
        assert!(AIDifficulty::Easy.movetime_ms() < AIDifficulty::Medium.movetime_ms());
        assert!(AIDifficulty::Medium.movetime_ms() < AIDifficulty::Hard.movetime_ms());
    }

    #[test]
    fn test_ai_difficulty_serde() {
        let json = serde_json::to_string(&AIDifficulty::Hard).unwrap();
        assert_eq!(json, "\"hard\"");
        let back: AIDifficulty = serde_json::from_str("\"easy\"").unwrap();
        assert_eq!(back, AIDifficulty::Easy);
    }
}
