//! Play mode controller
//!
//! Drives one game against either the engine or a remote opponent.
//!
//! # Against the engine
//!
//! 1. `initialize` starts the engine while the session is `initializing`;
//!    a failure moves the session to `error` and [`PlayController::retry_engine_init`]
//!    tries again.
//! 2. Local moves are applied directly, then the engine's reply is requested
//!    and applied through the same command path.
//! 3. The clock ends the game on time when a flag falls.
//!
//! # Against a remote opponent
//!
//! Local moves are applied optimistically and sent to the server. The
//! server's answers are fed back through [`PlayController::handle_server_message`]:
//!
//! | Server message   | Session command                         |
//! |------------------|-----------------------------------------|
//! | `game:created`   | `SyncState` (player color)              |
//! | `game:joined`    | `SyncState` (color, position)           |
//! | `game:started`   | `SyncState` (`INIT_SUCCESS`, position)  |
//! | `move:accepted`  | `ConfirmMove`                           |
//! | `move:rejected`  | `RejectMove`                            |
//! | `move:opponent`  | `OpponentMove`                          |
//! | `time:update`    | `SyncState` (clock)                     |
//! | `game:over`      | `EndGame`                               |
//! | `opponent:left`  | `EndGame` (abandonment)                 |
//! | `error`          | `SyncState` (move error)                |
//!
//! A dropped connection faults the session.

use crate::game::ai::{AIDifficulty, AiOpponent, ChessEngine};
use crate::game::error::{CommandError, RulesError};
use crate::game::modes::check_turn;
use crate::game::resources::{GameOverReason, Winner};
use crate::game::rules::{fen_side_to_move, MoveRequest};
use crate::game::session::{
    ClockState, Command, CommandOutcome, LifecycleEvent, PositionReset, SessionConfig,
    SessionManager, StatePatch,
};
use crate::game::systems::clock::Timer;
use crate::game::types::{OpponentType, PieceColor, PieceType, SessionId, Square};
use crate::networking::{Transport, TransportEvent};
use parking_lot::Mutex;
use shared::protocol::{ClientMessage, ServerMessage, WireTimeControl};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

enum Opponent {
    Engine {
        engine: Arc<dyn ChessEngine>,
        ai: AiOpponent,
    },
    Remote(Remote),
}

struct Remote {
    transport: Arc<dyn Transport>,
    game_id: Mutex<Option<Uuid>>,
    events: Mutex<Option<broadcast::Receiver<TransportEvent>>>,
}

pub struct PlayController {
    manager: Arc<SessionManager>,
    session_id: SessionId,
    opponent: Opponent,
    timer: Option<Timer>,
    engine_error: Mutex<Option<String>>,
}

impl PlayController {
    /// New game against the engine; the session starts `initializing`
    pub fn vs_ai(
        manager: Arc<SessionManager>,
        engine: Arc<dyn ChessEngine>,
        config: SessionConfig,
        difficulty: AIDifficulty,
    ) -> Self {
        let config = config.with_opponent(OpponentType::Ai);
        let ai = AiOpponent::against(config.player_color, difficulty);
        let timer = config.time_control.map(Timer::new);
        let session_id = manager.start_game(config);
        info!(
            "[PLAY] Session {} vs AI ({:?}, AI plays {})",
            session_id, difficulty, ai.ai_color
        );

        Self {
            manager,
            session_id,
            opponent: Opponent::Engine { engine, ai },
            timer,
            engine_error: Mutex::new(None),
        }
    }

    /// New online game; the session starts `initializing`
    ///
    /// Transport events are buffered from this point on and consumed by
    /// [`PlayController::run_transport_events`].
    pub fn multiplayer(
        manager: Arc<SessionManager>,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> Self {
        let config = config.with_opponent(OpponentType::Human);
        let timer = config.time_control.map(Timer::new);
        let events = transport.subscribe();
        let session_id = manager.start_game(config);
        info!("[PLAY] Session {} online", session_id);

        Self {
            manager,
            session_id,
            opponent: Opponent::Remote(Remote {
                transport,
                game_id: Mutex::new(None),
                events: Mutex::new(Some(events)),
            }),
            timer,
            engine_error: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Server-assigned game id, once known
    pub fn game_id(&self) -> Option<Uuid> {
        match &self.opponent {
            Opponent::Remote(remote) => *remote.game_id.lock(),
            Opponent::Engine { .. } => None,
        }
    }

    /// Bring up the engine or the connection
    ///
    /// Against the engine a successful start moves the session to `playing`
    /// and, when the engine has the first move, plays it. Online, the session
    /// waits for `game:started`. On failure the session is left in `error`
    /// and the outcome carries the cause.
    ///
    /// Must be called from inside a tokio runtime.
    pub async fn initialize(&self) -> CommandOutcome {
        match &self.opponent {
            Opponent::Engine { engine, .. } => match engine.init().await {
                Ok(()) => {
                    *self.engine_error.lock() = None;
                    let outcome = self.manager.complete_init(self.session_id);
                    if outcome.success {
                        info!("[PLAY] Engine ready");
                        self.start_clock();
                        self.play_ai_reply().await;
                    }
                    outcome
                }
                Err(e) => {
                    error!("[PLAY] Engine failed to start: {}", e);
                    *self.engine_error.lock() = Some(e.to_string());
                    self.init_failed(e.to_string())
                }
            },
            Opponent::Remote(remote) => match remote.transport.connect().await {
                Ok(()) => CommandOutcome::ok(),
                Err(e) => {
                    error!("[PLAY] Could not reach the server: {}", e);
                    self.init_failed(e.to_string())
                }
            },
        }
    }

    /// `INIT_FAILURE`, reported to the caller as a failed outcome
    fn init_failed(&self, message: String) -> CommandOutcome {
        let moved = self.manager.fail_init(self.session_id, message.clone());
        if !moved.success {
            return moved;
        }
        CommandOutcome::failed(CommandError::External(message))
    }

    pub fn has_engine_error(&self) -> bool {
        self.engine_error.lock().is_some()
    }

    /// `START_GAME` out of `error`, then initialize again
    pub async fn retry_engine_init(&self) -> CommandOutcome {
        let outcome = self.manager.retry_init(self.session_id);
        if !outcome.success {
            return outcome;
        }
        info!("[PLAY] Retrying engine start");
        self.initialize().await
    }

    /// Ask the server for a new game
    pub async fn create_game(&self) -> CommandOutcome {
        let Some(state) = self.manager.snapshot(self.session_id) else {
            return CommandOutcome::failed(CommandError::SessionNotFound(self.session_id));
        };
        let time_control = state.time_control.unwrap_or_default();
        self.send(ClientMessage::CreateGame {
            time_control: WireTimeControl {
                minutes: time_control.minutes,
                increment_seconds: time_control.increment_seconds,
            },
            color: Some(state.player_color.into()),
        })
        .await
    }

    pub async fn join_game(&self, game_id: Uuid) -> CommandOutcome {
        self.send(ClientMessage::JoinGame { game_id }).await
    }

    /// Whether the local player may move right now
    pub fn can_move(&self) -> bool {
        check_turn(&self.manager, self.session_id).is_ok()
    }

    /// Submit the local player's move
    ///
    /// Against the engine the reply is played before this returns.
    ///
    /// # Errors
    ///
    /// The outcome fails with [`CommandError::NotYourTurn`],
    /// [`CommandError::MovePending`] or another guard error without touching
    /// the session when [`PlayController::can_move`] is false.
    pub async fn make_move(&self, request: MoveRequest) -> CommandOutcome {
        if let Err(e) = check_turn(&self.manager, self.session_id) {
            debug!("[PLAY] Move {} refused: {}", request.to_uci(), e);
            return CommandOutcome::failed(e);
        }

        match &self.opponent {
            Opponent::Engine { .. } => {
                let outcome = self.apply_local(request);
                if outcome.success {
                    self.play_ai_reply().await;
                }
                outcome
            }
            Opponent::Remote(remote) => self.submit_remote(remote, request).await,
        }
    }

    /// Apply a local move against the engine, without the reply
    pub(crate) fn apply_local(&self, request: MoveRequest) -> CommandOutcome {
        let mover = self.manager.side_to_move(self.session_id);
        let outcome = self
            .manager
            .apply_command(self.session_id, Command::apply_move(request));
        if outcome.success {
            if let Some(mover) = mover {
                self.after_move(mover);
            }
        }
        outcome
    }

    async fn submit_remote(&self, remote: &Remote, request: MoveRequest) -> CommandOutcome {
        let Some(game_id) = *remote.game_id.lock() else {
            return CommandOutcome::failed(CommandError::External("No online game".to_string()));
        };

        let outcome = self
            .manager
            .apply_command(self.session_id, Command::optimistic_move(request));
        if !outcome.success {
            return outcome;
        }

        let message = ClientMessage::MakeMove {
            game_id,
            from: request.from.to_algebraic(),
            to: request.to.to_algebraic(),
            promotion: request.promotion.map(PieceType::to_char),
        };
        if let Err(e) = remote.transport.send(message).await {
            warn!("[PLAY] Move could not be sent: {}", e);
            let confirmed = self
                .manager
                .with_session(self.session_id, |s| s.position.confirmed().fen.clone());
            if let Some(server_fen) = confirmed {
                self.manager.apply_command(
                    self.session_id,
                    Command::RejectMove {
                        server_fen,
                        reason: e.to_string(),
                    },
                );
            }
            return CommandOutcome::failed(CommandError::External(e.to_string()));
        }
        outcome
    }

    /// Request and apply the engine's move if it is the engine's turn
    ///
    /// A reply computed for a position the session has since left is
    /// discarded. Engine failures fault the session.
    pub async fn play_ai_reply(&self) -> CommandOutcome {
        let Opponent::Engine { engine, ai } = &self.opponent else {
            return CommandOutcome::ok();
        };

        let fen = self
            .manager
            .with_session(self.session_id, |s| {
                let engine_to_move = s.lifecycle.is_playing()
                    && !s.is_game_over()
                    && fen_side_to_move(s.fen()) == Some(ai.ai_color);
                engine_to_move.then(|| s.fen().to_string())
            })
            .flatten();
        let Some(fen) = fen else {
            return CommandOutcome::ok();
        };

        debug!("[PLAY] AI thinking ({:?})", ai.difficulty);
        let uci = match engine.best_move(&fen, ai.search_limits()).await {
            Ok(uci) => uci,
            Err(e) => {
                error!("[PLAY] Engine failed during play: {}", e);
                return self.engine_fault(e.to_string());
            }
        };

        let unchanged = self
            .manager
            .with_session(self.session_id, |s| s.fen() == fen)
            .unwrap_or(false);
        if !unchanged {
            debug!("[PLAY] Discarding AI move {} for a stale position", uci);
            return CommandOutcome::ok();
        }

        let request = match MoveRequest::parse_uci(&uci) {
            Ok(request) => request,
            Err(e) => return self.engine_fault(e.to_string()),
        };
        let outcome = self
            .manager
            .apply_command(self.session_id, Command::apply_move(request));
        match &outcome.error {
            None => {
                info!("[PLAY] AI played {}", uci);
                self.after_move(ai.ai_color);
                outcome
            }
            Some(e) => {
                error!("[PLAY] Engine move {} was refused: {}", uci, e);
                self.engine_fault(e.to_string())
            }
        }
    }

    fn engine_fault(&self, message: String) -> CommandOutcome {
        *self.engine_error.lock() = Some(message.clone());
        self.manager.fault(self.session_id, message)
    }

    /// Undo the player's last move, and the reply to it
    pub fn take_back(&self) -> CommandOutcome {
        if matches!(self.opponent, Opponent::Remote(_)) {
            return CommandOutcome::failed(CommandError::External(
                "Take-back is not available in online games".to_string(),
            ));
        }
        let Some(player_color) = self
            .manager
            .with_session(self.session_id, |s| s.player_color)
        else {
            return CommandOutcome::failed(CommandError::SessionNotFound(self.session_id));
        };
        self.manager
            .apply_command(self.session_id, Command::TakeBack { player_color })
    }

    pub async fn resign(&self) -> CommandOutcome {
        let Some(player_color) = self
            .manager
            .with_session(self.session_id, |s| s.player_color)
        else {
            return CommandOutcome::failed(CommandError::SessionNotFound(self.session_id));
        };

        if let Some(game_id) = self.game_id() {
            let sent = self.send(ClientMessage::Resign { game_id }).await;
            if let Some(e) = sent.error {
                warn!("[PLAY] Resignation not delivered: {}", e);
            }
        }

        let outcome = self.manager.apply_command(
            self.session_id,
            Command::Resign {
                resigning_side: player_color,
            },
        );
        if outcome.success {
            info!("[PLAY] {} resigned", player_color);
            self.stop_clock();
        }
        outcome
    }

    /// A clock reached zero
    pub fn on_flag(&self, side: PieceColor) -> CommandOutcome {
        self.stop_clock();
        flag_fall(&self.manager, self.session_id, side)
    }

    /// Leave the game, release the engine or connection, and deregister the
    /// session
    pub async fn exit(&self) -> CommandOutcome {
        self.stop_clock();
        match &self.opponent {
            Opponent::Engine { engine, .. } => {
                if let Err(e) = engine.terminate().await {
                    warn!("[PLAY] Engine did not shut down cleanly: {}", e);
                }
            }
            Opponent::Remote(remote) => {
                let game_id = *remote.game_id.lock();
                if let Some(game_id) = game_id {
                    let sent = remote
                        .transport
                        .send(ClientMessage::LeaveGame { game_id })
                        .await;
                    if let Err(e) = sent {
                        warn!("[PLAY] Leave message not delivered: {}", e);
                    }
                }
                remote.transport.disconnect().await;
            }
        }
        let outcome = self.manager.exit_game(self.session_id);
        self.manager.destroy_session(self.session_id);
        outcome
    }

    /// Map one server message onto the session
    pub fn handle_server_message(&self, message: ServerMessage) -> CommandOutcome {
        let id = self.session_id;
        match message {
            ServerMessage::GameCreated { game_id, color } => {
                self.set_game_id(game_id);
                info!("[PLAY] Game {} created, playing {:?}", game_id, color);
                self.sync(StatePatch {
                    player_color: Some(color.into()),
                    ..Default::default()
                })
            }
            ServerMessage::GameJoined {
                game_id,
                color,
                fen,
            } => {
                self.set_game_id(game_id);
                info!("[PLAY] Joined game {}, playing {:?}", game_id, color);
                self.sync(StatePatch {
                    player_color: Some(color.into()),
                    position: Some(PositionReset::at(fen)),
                    ..Default::default()
                })
            }
            ServerMessage::GameStarted {
                game_id,
                fen,
                white_time_ms,
                black_time_ms,
            } => {
                self.set_game_id(game_id);
                let outcome = self.sync(StatePatch {
                    lifecycle: Some(LifecycleEvent::InitSuccess),
                    position: Some(PositionReset::at(fen)),
                    clock: Some(ClockState::new(white_time_ms, black_time_ms)),
                    ..Default::default()
                });
                if outcome.success {
                    info!("[PLAY] Game {} started", game_id);
                    if let Some(timer) = &self.timer {
                        timer.sync(white_time_ms, black_time_ms);
                    }
                    self.start_clock();
                }
                outcome
            }
            ServerMessage::MoveAccepted {
                fen,
                san,
                white_time_ms,
                black_time_ms,
            } => {
                debug!("[PLAY] Server accepted {}", san);
                self.sync_timer(white_time_ms, black_time_ms);
                self.manager.apply_command(
                    id,
                    Command::ConfirmMove {
                        server_fen: fen,
                        white_time_ms,
                        black_time_ms,
                    },
                )
            }
            ServerMessage::MoveRejected { fen, reason } => {
                warn!("[PLAY] Server rejected move: {}", reason);
                self.manager.apply_command(
                    id,
                    Command::RejectMove {
                        server_fen: fen,
                        reason,
                    },
                )
            }
            ServerMessage::OpponentMove {
                from,
                to,
                promotion,
                san,
                fen,
                white_time_ms,
                black_time_ms,
            } => {
                let command = match opponent_move(&from, &to, promotion, san, fen) {
                    Ok(command) => command,
                    Err(e) => return CommandOutcome::failed(e.into()),
                };
                let outcome = self.manager.apply_command(id, command);
                if outcome.success {
                    self.sync_timer(white_time_ms, black_time_ms);
                    self.sync(StatePatch {
                        clock: Some(ClockState::new(white_time_ms, black_time_ms)),
                        ..Default::default()
                    });
                }
                outcome
            }
            ServerMessage::TimeUpdate {
                white_time_ms,
                black_time_ms,
            } => {
                self.sync_timer(white_time_ms, black_time_ms);
                self.sync(StatePatch {
                    clock: Some(ClockState::new(white_time_ms, black_time_ms)),
                    ..Default::default()
                })
            }
            ServerMessage::GameOver { reason, winner } => {
                self.stop_clock();
                if self.manager.with_session(id, |s| s.is_game_over()) == Some(true) {
                    return CommandOutcome::ok();
                }
                info!("[PLAY] Server ended the game: {:?}", reason);
                self.manager.apply_command(
                    id,
                    Command::EndGame {
                        reason: GameOverReason::from(reason),
                        winner: Winner::from_wire(winner),
                        eval_score: None,
                    },
                )
            }
            ServerMessage::OpponentLeft => {
                self.stop_clock();
                let Some(player_color) = self.manager.with_session(id, |s| s.player_color) else {
                    return CommandOutcome::failed(CommandError::SessionNotFound(id));
                };
                info!("[PLAY] Opponent left the game");
                self.manager.apply_command(
                    id,
                    Command::EndGame {
                        reason: GameOverReason::Abandonment,
                        winner: Winner::side(player_color),
                        eval_score: None,
                    },
                )
            }
            ServerMessage::Error { message } => {
                warn!("[PLAY] Server error: {}", message);
                self.sync(StatePatch {
                    move_error: Some(Some(message)),
                    ..Default::default()
                })
            }
        }
    }

    /// Handle one transport event; `false` once the connection is gone
    pub fn handle_transport_event(&self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Connected => {
                debug!("[PLAY] Connected");
                true
            }
            TransportEvent::Message(message) => {
                let outcome = self.handle_server_message(message);
                if let Some(e) = outcome.error {
                    debug!("[PLAY] Server message not applied: {}", e);
                }
                true
            }
            TransportEvent::Error(message) => {
                warn!("[PLAY] Transport error: {}", message);
                true
            }
            TransportEvent::Disconnected { reason } => {
                self.stop_clock();
                let playing = self
                    .manager
                    .with_session(self.session_id, |s| s.lifecycle.is_playing())
                    .unwrap_or(false);
                if playing {
                    let reason = reason.unwrap_or_else(|| "connection closed".to_string());
                    warn!("[PLAY] Lost connection: {}", reason);
                    self.manager.fault(self.session_id, reason);
                }
                false
            }
        }
    }

    /// Consume transport events until the connection closes
    ///
    /// Returns immediately for engine games or when already running.
    pub async fn run_transport_events(&self) {
        let Opponent::Remote(remote) = &self.opponent else {
            return;
        };
        let Some(mut events) = remote.events.lock().take() else {
            return;
        };

        loop {
            match events.recv().await {
                Ok(event) => {
                    if !self.handle_transport_event(event) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("[PLAY] Dropped {} transport events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("[PLAY] Transport event loop ended");
    }

    fn set_game_id(&self, game_id: Uuid) {
        if let Opponent::Remote(remote) = &self.opponent {
            *remote.game_id.lock() = Some(game_id);
        }
    }

    async fn send(&self, message: ClientMessage) -> CommandOutcome {
        let Opponent::Remote(remote) = &self.opponent else {
            return CommandOutcome::failed(CommandError::External(
                "Not an online game".to_string(),
            ));
        };
        match remote.transport.send(message).await {
            Ok(()) => CommandOutcome::ok(),
            Err(e) => CommandOutcome::failed(CommandError::External(e.to_string())),
        }
    }

    fn sync(&self, patch: StatePatch) -> CommandOutcome {
        self.manager
            .apply_command(self.session_id, Command::SyncState(patch))
    }

    fn sync_timer(&self, white_ms: i64, black_ms: i64) {
        if let Some(timer) = &self.timer {
            timer.sync(white_ms, black_ms);
        }
    }

    /// Clock bookkeeping after `mover` completed a move against the engine
    fn after_move(&self, mover: PieceColor) {
        let Some(timer) = &self.timer else {
            return;
        };
        let over = self
            .manager
            .with_session(self.session_id, |s| s.is_game_over())
            .unwrap_or(true);
        if over {
            timer.stop();
            return;
        }
        timer.add_increment(mover);
        let snapshot = timer.snapshot();
        self.sync(StatePatch {
            clock: Some(ClockState::new(
                snapshot.white_time_ms,
                snapshot.black_time_ms,
            )),
            ..Default::default()
        });
    }

    fn start_clock(&self) {
        let Some(timer) = &self.timer else {
            return;
        };
        let id = self.session_id;
        let reader = Arc::clone(&self.manager);
        let manager = Arc::clone(&self.manager);
        let enforce = matches!(self.opponent, Opponent::Engine { .. });

        timer.start(
            move || {
                reader
                    .with_session(id, |s| {
                        (s.lifecycle.is_playing() && !s.is_game_over())
                            .then(|| fen_side_to_move(s.fen()))
                            .flatten()
                    })
                    .flatten()
            },
            move |side| {
                if enforce {
                    flag_fall(&manager, id, side);
                } else {
                    info!("[PLAY] {} flagged; waiting for the server", side);
                }
            },
        );
    }

    fn stop_clock(&self) {
        if let Some(timer) = &self.timer {
            timer.stop();
        }
    }
}

fn flag_fall(manager: &SessionManager, session_id: SessionId, side: PieceColor) -> CommandOutcome {
    info!("[PLAY] {} lost on time", side);
    manager.apply_command(
        session_id,
        Command::EndGame {
            reason: GameOverReason::Time,
            winner: Winner::side(side.opposite()),
            eval_score: None,
        },
    )
}

fn opponent_move(
    from: &str,
    to: &str,
    promotion: Option<char>,
    san: String,
    fen: String,
) -> Result<Command, RulesError> {
    let square = |text: &str| {
        Square::from_algebraic(text).ok_or_else(|| RulesError::InvalidSquare(text.to_string()))
    };
    let promotion = match promotion {
        Some(c) => Some(
            PieceType::from_char(c).ok_or_else(|| RulesError::InvalidNotation(c.to_string()))?,
        ),
        None => None,
    };
    Ok(Command::OpponentMove {
        from: square(from)?,
        to: square(to)?,
        promotion,
        san,
        fen,
    })
}
