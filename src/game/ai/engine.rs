//! Chess engine seam
//!
//! Sessions treat the engine as a black box behind [`ChessEngine`]: it is
//! initialised once, answers best-move and analysis requests for a FEN, and is
//! terminated when the controller that owns it goes away.
//!
//! # Score convention
//!
//! Every [`Score`] crossing this trait is from White's point of view,
//! whatever side the engine was asked to move for. Implementations flip the
//! engine's side-to-move scores before returning them.

use crate::game::error::EngineResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Centipawn value used for a mate in zero
pub const MATE_SCORE: i32 = 10_000;

/// Engine evaluation, White's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Score {
    Centipawns(i32),
    /// Mate in n moves; negative when Black mates, never zero
    Mate(i32),
}

impl Score {
    /// Collapse to centipawns, mates mapped just below [`MATE_SCORE`]
    pub fn as_centipawns(self) -> i32 {
        match self {
            Score::Centipawns(cp) => cp,
            Score::Mate(n) if n > 0 => MATE_SCORE - n,
            Score::Mate(n) => -MATE_SCORE - n,
        }
    }

    /// Same score seen from the other side
    pub fn flipped(self) -> Self {
        match self {
            Score::Centipawns(cp) => Score::Centipawns(-cp),
            Score::Mate(n) => Score::Mate(-n),
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Score::Mate(_))
    }
}

/// One principal variation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisLine {
    /// 1-based line rank
    pub multipv: u32,
    pub score: Score,
    pub depth: u32,
    /// Moves in UCI notation
    pub pv: Vec<String>,
}

/// Result of analysing one position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Score of the best line
    pub score: Score,
    pub depth: u32,
    /// First move of the best line, UCI
    pub best_move: Option<String>,
    /// Lines ordered by rank
    pub lines: Vec<AnalysisLine>,
}

impl Evaluation {
    /// Evaluation with a single line
    pub fn single(score: Score, depth: u32, best_move: Option<String>) -> Self {
        let pv = best_move.iter().cloned().collect();
        Self {
            score,
            depth,
            best_move,
            lines: vec![AnalysisLine {
                multipv: 1,
                score,
                depth,
                pv,
            }],
        }
    }

    pub fn centipawns(&self) -> i32 {
        self.score.as_centipawns()
    }
}

/// Limits for a best-move search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    pub movetime_ms: Option<u64>,
    pub depth: Option<u32>,
}

impl SearchLimits {
    pub fn movetime(ms: u64) -> Self {
        Self {
            movetime_ms: Some(ms),
            depth: None,
        }
    }

    pub fn depth(depth: u32) -> Self {
        Self {
            movetime_ms: None,
            depth: Some(depth),
        }
    }
}

/// Options for an analysis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Stop after this depth; `None` analyses until stopped
    pub depth: Option<u32>,
    /// Number of lines
    pub multipv: u32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            depth: Some(18),
            multipv: 1,
        }
    }
}

/// Called with every intermediate evaluation of an analysis
pub type ProgressFn = Box<dyn Fn(&Evaluation) + Send + Sync>;

/// Engine worker lifecycle: `init` once, then requests, then `terminate`
#[async_trait]
pub trait ChessEngine: Send + Sync {
    /// Start the engine and wait until it accepts requests
    async fn init(&self) -> EngineResult<()>;

    /// Best move for the side to move, in UCI notation
    async fn best_move(&self, fen: &str, limits: SearchLimits) -> EngineResult<String>;

    /// Analyse `fen`, reporting progress, and return the final evaluation
    ///
    /// A newer `analyze` call supersedes this one, which then fails with
    /// [`crate::game::error::EngineError::Superseded`].
    async fn analyze(
        &self,
        fen: &str,
        options: AnalysisOptions,
        on_progress: Option<ProgressFn>,
    ) -> EngineResult<Evaluation>;

    /// Stop the running analysis; its caller receives the latest evaluation
    async fn stop_analysis(&self) -> EngineResult<()>;

    /// Shut the engine down; later calls fail with `Terminated`
    async fn terminate(&self) -> EngineResult<()>;

    fn is_ready(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_as_centipawns() {
        assert_eq!(Score::Centipawns(35).as_centipawns(), 35);
        assert_eq!(Score::Mate(3).as_centipawns(), 9_997);
        assert_eq!(Score::Mate(-2).as_centipawns(), -9_998);
        assert!(Score::Mate(1).as_centipawns() > Score::Mate(5).as_centipawns());
    }

    #[test]
    fn test_score_flipped() {
        assert_eq!(Score::Centipawns(-120).flipped(), Score::Centipawns(120));
        assert_eq!(Score::Mate(4).flipped(), Score::Mate(-4));
    }

    #[test]
    fn test_evaluation_single_line() {
        let eval = Evaluation::single(Score::Centipawns(20), 12, Some("e2e4".to_string()));
        assert_eq!(eval.lines.len(), 1);
        assert_eq!(eval.lines[0].pv, vec!["e2e4"]);
        assert_eq!(eval.centipawns(), 20);
    }
}
