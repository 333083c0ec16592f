//! Deterministic in-process engine
//!
//! [`ScriptedEngine`] answers from queues filled by the caller and falls back
//! to simple rules-based answers when they run dry: the first legal move in
//! generation order, and a material-count evaluation. Used for offline play
//! and by the controller tests.

use crate::game::ai::engine::{
    AnalysisOptions, ChessEngine, Evaluation, ProgressFn, Score, SearchLimits,
};
use crate::game::error::{EngineError, EngineResult};
use crate::game::rules::{material, ChessRules};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    rules: ChessRules,
    moves: Mutex<VecDeque<String>>,
    evaluations: Mutex<VecDeque<Evaluation>>,
    init_failures: AtomicUsize,
    ready: AtomicBool,
    terminated: AtomicBool,
    /// Positions passed to `best_move` and `analyze`, in call order
    requests: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `best_move` with these UCI moves first
    pub fn with_moves<I, S>(moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let engine = Self::new();
        engine
            .moves
            .lock()
            .extend(moves.into_iter().map(Into::into));
        engine
    }

    /// Make the next `count` calls to `init` fail
    pub fn failing_init(self, count: usize) -> Self {
        self.init_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn push_move(&self, uci: impl Into<String>) {
        self.moves.lock().push_back(uci.into());
    }

    pub fn push_evaluation(&self, evaluation: Evaluation) {
        self.evaluations.lock().push_back(evaluation);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn check_ready(&self) -> EngineResult<()> {
        if self.terminated.load(Ordering::SeqCst) {
            Err(EngineError::Terminated)
        } else if !self.ready.load(Ordering::SeqCst) {
            Err(EngineError::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn first_legal(&self, fen: &str) -> EngineResult<Option<String>> {
        let moves = self
            .rules
            .all_legal_moves(fen)
            .map_err(|e| EngineError::Protocol(e.to_string()))?;
        Ok(moves.first().map(|m| m.to_uci()))
    }
}

#[async_trait]
impl ChessEngine for ScriptedEngine {
    async fn init(&self) -> EngineResult<()> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(EngineError::Terminated);
        }
        let failures = self.init_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.init_failures.store(failures - 1, Ordering::SeqCst);
            return Err(EngineError::Spawn("scripted engine refused to start".to_string()));
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn best_move(&self, fen: &str, _limits: SearchLimits) -> EngineResult<String> {
        self.check_ready()?;
        self.requests.lock().push(fen.to_string());

        if let Some(scripted) = self.moves.lock().pop_front() {
            return Ok(scripted);
        }
        self.first_legal(fen)?.ok_or(EngineError::NoMove)
    }

    async fn analyze(
        &self,
        fen: &str,
        _options: AnalysisOptions,
        on_progress: Option<ProgressFn>,
    ) -> EngineResult<Evaluation> {
        self.check_ready()?;
        self.requests.lock().push(fen.to_string());

        let scripted = self.evaluations.lock().pop_front();
        let evaluation = match scripted {
            Some(evaluation) => evaluation,
            None => {
                let pawns = material::material_balance(fen)
                    .map_err(|e| EngineError::Protocol(e.to_string()))?;
                Evaluation::single(Score::Centipawns(pawns * 100), 1, self.first_legal(fen)?)
            }
        };

        if let Some(callback) = on_progress {
            callback(&evaluation);
        }
        Ok(evaluation)
    }

    async fn stop_analysis(&self) -> EngineResult<()> {
        self.check_ready()
    }

    async fn terminate(&self) -> EngineResult<()> {
        self.ready.store(false, Ordering::SeqCst);
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
