//! UCI engine worker
//!
//! Runs an external UCI engine (Stockfish or compatible) as a child process
//! and serialises every request through a single tokio task that owns the
//! process pipes.
//!
//! # Architecture
//!
//! ```text
//! UciEngine ──mpsc<Request>──► Worker task ──stdin──► engine process
//!     ▲                           │   ◄──stdout lines──┘
//!     └──────oneshot reply────────┘
//! ```
//!
//! While an analysis runs the worker listens to both the engine output and
//! the request channel. A new request stops the analysis (`stop`, then drain
//! to `bestmove`), answers the old caller with
//! [`EngineError::Superseded`] and is served next. A stop request answers the
//! analysis caller with the latest evaluation instead.
//!
//! # Reference
//!
//! UCI protocol: https://backscattering.de/chess/uci/

use crate::game::ai::engine::{
    AnalysisLine, AnalysisOptions, ChessEngine, Evaluation, ProgressFn, Score, SearchLimits,
    MATE_SCORE,
};
use crate::game::error::{EngineError, EngineResult};
use crate::game::rules::fen_side_to_move;
use crate::game::types::PieceColor;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
/// Added to `movetime` before a best-move search counts as hung
const BESTMOVE_GRACE: Duration = Duration::from_secs(5);
const REQUEST_QUEUE: usize = 8;

enum Request {
    BestMove {
        fen: String,
        limits: SearchLimits,
        reply: oneshot::Sender<EngineResult<String>>,
    },
    Analyze {
        fen: String,
        options: AnalysisOptions,
        on_progress: Option<ProgressFn>,
        reply: oneshot::Sender<EngineResult<Evaluation>>,
    },
    Stop,
    Quit {
        reply: oneshot::Sender<()>,
    },
}

/// Engine process behind the [`ChessEngine`] trait
pub struct UciEngine {
    path: PathBuf,
    requests: Mutex<Option<mpsc::Sender<Request>>>,
}

impl UciEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            requests: Mutex::new(None),
        }
    }

    fn sender(&self) -> EngineResult<mpsc::Sender<Request>> {
        self.requests
            .lock()
            .clone()
            .ok_or(EngineError::NotInitialized)
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<EngineResult<T>>) -> Request,
    ) -> EngineResult<T> {
        let sender = self.sender()?;
        let (reply, response) = oneshot::channel();
        sender
            .send(build(reply))
            .await
            .map_err(|_| EngineError::Terminated)?;
        response.await.map_err(|_| EngineError::Terminated)?
    }
}

#[async_trait]
impl ChessEngine for UciEngine {
    async fn init(&self) -> EngineResult<()> {
        if self.requests.lock().is_some() {
            return Ok(());
        }

        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {}", self.path.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdout unavailable".to_string()))?;

        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let mut worker = Worker {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            rx,
        };
        if let Err(e) = worker.handshake().await {
            worker.shutdown().await;
            return Err(e);
        }

        info!("[ENGINE] {} ready", self.path.display());
        tokio::spawn(worker.run());
        *self.requests.lock() = Some(tx);
        Ok(())
    }

    async fn best_move(&self, fen: &str, limits: SearchLimits) -> EngineResult<String> {
        let fen = fen.to_string();
        self.call(|reply| Request::BestMove { fen, limits, reply })
            .await
    }

    async fn analyze(
        &self,
        fen: &str,
        options: AnalysisOptions,
        on_progress: Option<ProgressFn>,
    ) -> EngineResult<Evaluation> {
        let fen = fen.to_string();
        self.call(|reply| Request::Analyze {
            fen,
            options,
            on_progress,
            reply,
        })
        .await
    }

    async fn stop_analysis(&self) -> EngineResult<()> {
        self.sender()?
            .send(Request::Stop)
            .await
            .map_err(|_| EngineError::Terminated)
    }

    async fn terminate(&self) -> EngineResult<()> {
        let Some(sender) = self.requests.lock().take() else {
            return Ok(());
        };
        let (reply, done) = oneshot::channel();
        if sender.send(Request::Quit { reply }).await.is_ok() {
            let _ = done.await;
        }
        info!("[ENGINE] {} terminated", self.path.display());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.requests.lock().is_some()
    }
}

/// Owner of the engine process
struct Worker {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    rx: mpsc::Receiver<Request>,
}

/// How an analysis ended, and the request that interrupted it
type AnalysisEnd = (EngineResult<Evaluation>, Option<Request>);

impl Worker {
    async fn send(&mut self, command: &str) -> EngineResult<()> {
        debug!("[ENGINE] >> {}", command);
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self) -> EngineResult<String> {
        match self.lines.next_line().await? {
            Some(line) => Ok(line),
            None => Err(EngineError::Io("engine closed its output".to_string())),
        }
    }

    /// Read until a line starting with `prefix`
    async fn read_until(
        &mut self,
        prefix: &'static str,
        limit: Option<Duration>,
    ) -> EngineResult<String> {
        let read = async {
            loop {
                let line = self.next_line().await?;
                if line.starts_with(prefix) {
                    break Ok::<_, EngineError>(line);
                }
            }
        };
        match limit {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| EngineError::Timeout(prefix))?,
            None => read.await,
        }
    }

    async fn handshake(&mut self) -> EngineResult<()> {
        self.send("uci").await?;
        self.read_until("uciok", Some(HANDSHAKE_TIMEOUT)).await?;
        self.send("isready").await?;
        self.read_until("readyok", Some(HANDSHAKE_TIMEOUT)).await?;
        Ok(())
    }

    async fn run(mut self) {
        let mut next: Option<Request> = None;
        loop {
            let request = match next.take() {
                Some(request) => request,
                None => match self.rx.recv().await {
                    Some(request) => request,
                    None => break,
                },
            };

            match request {
                Request::BestMove { fen, limits, reply } => {
                    let result = self.best_move(&fen, limits).await;
                    let _ = reply.send(result);
                }
                Request::Analyze {
                    fen,
                    options,
                    on_progress,
                    reply,
                } => {
                    let (result, interrupted_by) =
                        self.analyze(&fen, options, on_progress).await;
                    let _ = reply.send(result);
                    next = interrupted_by;
                }
                Request::Stop => {}
                Request::Quit { reply } => {
                    self.shutdown().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }
        self.shutdown().await;
    }

    async fn best_move(&mut self, fen: &str, limits: SearchLimits) -> EngineResult<String> {
        self.send(&format!("position fen {}", fen)).await?;
        self.send(&go_command(limits.movetime_ms, limits.depth)).await?;

        let limit = limits
            .movetime_ms
            .map(|ms| Duration::from_millis(ms) + BESTMOVE_GRACE);
        let line = self.read_until("bestmove", limit).await?;
        parse_bestmove(&line).ok_or(EngineError::NoMove)
    }

    async fn analyze(
        &mut self,
        fen: &str,
        options: AnalysisOptions,
        on_progress: Option<ProgressFn>,
    ) -> AnalysisEnd {
        let white_to_move = fen_side_to_move(fen) != Some(PieceColor::Black);
        let mut lines: BTreeMap<u32, AnalysisLine> = BTreeMap::new();

        let start = async {
            self.send(&format!(
                "setoption name MultiPV value {}",
                options.multipv.max(1)
            ))
            .await?;
            self.send(&format!("position fen {}", fen)).await?;
            self.send(&go_command(None, options.depth)).await
        };
        if let Err(e) = start.await {
            return (Err(e), None);
        }

        loop {
            tokio::select! {
                line = self.lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            return (Err(EngineError::Io("engine closed its output".to_string())), None)
                        }
                        Err(e) => return (Err(e.into()), None),
                    };
                    if line.starts_with("bestmove") {
                        return (finish(&lines, parse_bestmove(&line)), None);
                    }
                    if let Some(info) = parse_info_line(&line, white_to_move) {
                        lines.insert(info.multipv, info);
                        if let (Some(callback), Ok(eval)) = (&on_progress, finish(&lines, None)) {
                            callback(&eval);
                        }
                    }
                }
                request = self.rx.recv() => {
                    let drained = self.stop_search().await;
                    return match request {
                        Some(Request::Stop) => match drained {
                            Ok(best) => (finish(&lines, best), None),
                            Err(e) => (Err(e), None),
                        },
                        Some(other) => {
                            debug!("[ENGINE] analysis superseded");
                            (Err(EngineError::Superseded), Some(other))
                        }
                        None => (Err(EngineError::Terminated), None),
                    };
                }
            }
        }
    }

    /// `stop` and wait for the search to report its move
    async fn stop_search(&mut self) -> EngineResult<Option<String>> {
        self.send("stop").await?;
        let line = self.read_until("bestmove", Some(STOP_TIMEOUT)).await?;
        Ok(parse_bestmove(&line))
    }

    async fn shutdown(&mut self) {
        if self.send("quit").await.is_err() {
            debug!("[ENGINE] engine already gone");
        }
        if tokio::time::timeout(STOP_TIMEOUT, self.child.wait())
            .await
            .is_err()
        {
            warn!("[ENGINE] engine ignored quit, killing it");
            if let Err(e) = self.child.kill().await {
                warn!("[ENGINE] kill failed: {}", e);
            }
        }
    }
}

fn go_command(movetime_ms: Option<u64>, depth: Option<u32>) -> String {
    match (movetime_ms, depth) {
        (Some(ms), Some(depth)) => format!("go movetime {} depth {}", ms, depth),
        (Some(ms), None) => format!("go movetime {}", ms),
        (None, Some(depth)) => format!("go depth {}", depth),
        (None, None) => "go infinite".to_string(),
    }
}

/// Current evaluation from the collected lines, best move overridden by
/// the engine's final answer when there is one
fn finish(
    lines: &BTreeMap<u32, AnalysisLine>,
    best_move: Option<String>,
) -> EngineResult<Evaluation> {
    match lines.values().next() {
        Some(top) => Ok(Evaluation {
            score: top.score,
            depth: top.depth,
            best_move: best_move.or_else(|| top.pv.first().cloned()),
            lines: lines.values().cloned().collect(),
        }),
        None => best_move
            .map(|m| Evaluation::single(Score::Centipawns(0), 0, Some(m)))
            .ok_or(EngineError::NoMove),
    }
}

/// Parse an `info` line carrying a score, turning it to White's view
pub(crate) fn parse_info_line(line: &str, white_to_move: bool) -> Option<AnalysisLine> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return None;
    }

    let mut depth = None;
    let mut multipv = 1;
    let mut score = None;
    let mut pv = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            "depth" => depth = tokens.next().and_then(|t| t.parse().ok()),
            "multipv" => multipv = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(1),
            "score" => {
                let kind = tokens.next();
                let value = tokens.next().and_then(|t| t.parse::<i32>().ok());
                score = match (kind, value) {
                    (Some("cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                    // Side to move is already mated
                    (Some("mate"), Some(0)) => Some(Score::Centipawns(-MATE_SCORE)),
                    (Some("mate"), Some(n)) => Some(Score::Mate(n)),
                    _ => None,
                };
            }
            "pv" => pv = tokens.by_ref().map(str::to_string).collect(),
            "string" => return None,
            _ => {}
        }
    }

    let score = if white_to_move {
        score?
    } else {
        score?.flipped()
    };
    Some(AnalysisLine {
        multipv,
        score,
        depth: depth?,
        pv,
    })
}

/// Move from a `bestmove` line; `None` for `(none)`
pub(crate) fn parse_bestmove(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("bestmove") {
        return None;
    }
    tokens
        .next()
        .filter(|m| *m != "(none)" && *m != "0000")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_line_white() {
        let line = "info depth 12 seldepth 18 multipv 1 score cp 35 nodes 120000 nps 900000 pv e2e4 e7e5 g1f3";
        let parsed = parse_info_line(line, true).unwrap();
        assert_eq!(parsed.depth, 12);
        assert_eq!(parsed.multipv, 1);
        assert_eq!(parsed.score, Score::Centipawns(35));
        assert_eq!(parsed.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_parse_info_line_black_to_move_flips() {
        let parsed = parse_info_line("info depth 20 multipv 2 score mate 3 pv d8h4", false).unwrap();
        assert_eq!(parsed.score, Score::Mate(-3));
        assert_eq!(parsed.multipv, 2);

        let mated = parse_info_line("info depth 0 score mate 0", true).unwrap();
        assert_eq!(mated.score, Score::Centipawns(-MATE_SCORE));
    }

    #[test]
    fn test_parse_info_line_ignores_noise() {
        assert!(parse_info_line("info string NNUE evaluation enabled", true).is_none());
        assert!(parse_info_line("info depth 3 currmove e2e4 currmovenumber 1", true).is_none());
        assert!(parse_info_line("readyok", true).is_none());
    }

    #[test]
    fn test_parse_bestmove() {
        assert_eq!(parse_bestmove("bestmove e2e4 ponder e7e5").as_deref(), Some("e2e4"));
        assert_eq!(parse_bestmove("bestmove a7a8q").as_deref(), Some("a7a8q"));
        assert_eq!(parse_bestmove("bestmove (none)"), None);
        assert_eq!(parse_bestmove("info depth 1"), None);
    }

    #[test]
    fn test_go_command() {
        assert_eq!(go_command(Some(1500), None), "go movetime 1500");
        assert_eq!(go_command(None, Some(18)), "go depth 18");
        assert_eq!(go_command(None, None), "go infinite");
    }

    #[test]
    fn test_finish_prefers_engine_bestmove() {
        let mut lines = BTreeMap::new();
        lines.insert(
            1,
            AnalysisLine {
                multipv: 1,
                score: Score::Centipawns(10),
                depth: 8,
                pv: vec!["d2d4".to_string()],
            },
        );
        let eval = finish(&lines, Some("e2e4".to_string())).unwrap();
        assert_eq!(eval.best_move.as_deref(), Some("e2e4"));
        assert_eq!(finish(&BTreeMap::new(), None), Err(EngineError::NoMove));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let engine = UciEngine::new("/nonexistent/xfchess-test-engine");
        assert!(matches!(engine.init().await, Err(EngineError::Spawn(_))));
        assert!(!engine.is_ready());
        assert_eq!(
            engine.best_move("8/8/8/8/8/8/8/K6k w - - 0 1", SearchLimits::depth(1)).await,
            Err(EngineError::NotInitialized)
        );
    }
}
