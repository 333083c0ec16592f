//! `xfchess-session` command line
//!
//! Small tools over the session core:
//!
//! - `replay` - play UCI moves from a position and print the session as JSON
//! - `pgn` - load a PGN, list the position after every ply, re-export it
//! - `analyze` - evaluate a position with a UCI engine

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use xfchess_session::core::{logging, settings_persistence};
use xfchess_session::game::ai::{AnalysisOptions, ChessEngine, ScriptedEngine, UciEngine};
use xfchess_session::game::modes::AnalyzeController;
use xfchess_session::game::rules::MoveRequest;
use xfchess_session::game::session::{Command, SessionConfig, SessionManager};
use xfchess_session::game::types::{GameMode, OpponentType};

#[derive(Parser)]
#[command(name = "xfchess-session", version, about = "XFChess game session tools")]
struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = logging::DEFAULT_FILTER)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply UCI moves and print the resulting session
    Replay {
        /// Starting position; the standard one when omitted
        #[arg(long)]
        fen: Option<String>,
        /// Moves in UCI notation (e2e4 e7e5 ...)
        moves: Vec<String>,
    },
    /// Load a PGN file
    Pgn { path: PathBuf },
    /// Evaluate a position
    Analyze {
        #[arg(long)]
        fen: Option<String>,
        /// UCI engine executable; falls back to the saved settings
        #[arg(long)]
        engine: Option<PathBuf>,
        #[arg(long, default_value_t = 18)]
        depth: u32,
        #[arg(long, default_value_t = 1)]
        multipv: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log);

    match cli.command {
        Commands::Replay { fen, moves } => replay(fen, &moves),
        Commands::Pgn { path } => pgn(&path),
        Commands::Analyze {
            fen,
            engine,
            depth,
            multipv,
        } => {
            analyze(
                fen,
                engine,
                AnalysisOptions {
                    depth: Some(depth),
                    multipv,
                },
            )
            .await
        }
    }
}

fn replay(fen: Option<String>, moves: &[String]) -> Result<()> {
    let manager = SessionManager::with_default_rules();
    let mut config = SessionConfig::new(GameMode::Play).with_opponent(OpponentType::Human);
    if let Some(fen) = fen {
        manager
            .oracle()
            .load_fen(&fen)
            .with_context(|| format!("invalid starting position '{}'", fen))?;
        config = config.with_fen(fen);
    }

    let id = manager.start_game(config);
    manager.complete_init(id).into_result()?;

    for (ply, uci) in moves.iter().enumerate() {
        let request = MoveRequest::parse_uci(uci)?;
        manager
            .apply_command(id, Command::apply_move(request))
            .into_result()
            .with_context(|| format!("move {} ({}) was not applied", ply + 1, uci))?;
    }

    let view = manager.get_session(id).context("session vanished")?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn pgn(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;

    let manager = Arc::new(SessionManager::with_default_rules());
    let game = manager
        .oracle()
        .load_pgn(&text)
        .with_context(|| format!("{} is not a valid PGN", path.display()))?;

    println!("start  {}", game.initial_fen);
    for (ply, applied) in game.moves.iter().enumerate() {
        println!("{:>5}  {:<8} {}", ply + 1, applied.san, applied.fen);
    }

    let board = AnalyzeController::new(manager, None);
    if !board.load_pgn(&text) {
        bail!("{} could not be loaded", path.display());
    }
    if let Some(exported) = board.export_pgn() {
        println!();
        println!("{}", exported);
    }
    Ok(())
}

async fn analyze(
    fen: Option<String>,
    engine_path: Option<PathBuf>,
    options: AnalysisOptions,
) -> Result<()> {
    let settings = settings_persistence::load_settings();
    let engine: Arc<dyn ChessEngine> = match engine_path.or(settings.engine_path) {
        Some(path) => {
            info!("[ENGINE] Using {}", path.display());
            Arc::new(UciEngine::new(path))
        }
        None => {
            info!("[ENGINE] No engine configured, using material count");
            Arc::new(ScriptedEngine::new())
        }
    };

    let manager = Arc::new(SessionManager::with_default_rules());
    let board = AnalyzeController::new(manager, Some(engine)).with_options(options);
    board.initialize_engine().await.into_result()?;

    if let Some(fen) = fen {
        if !board.load_fen(&fen) {
            bail!("invalid position '{}'", fen);
        }
    }

    let evaluation = board.evaluate().await?;
    board.exit().await;

    match evaluation {
        Some(evaluation) => println!("{}", serde_json::to_string_pretty(&evaluation)?),
        None => bail!("evaluation was interrupted"),
    }
    Ok(())
}
