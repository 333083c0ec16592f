//! Multiplayer Integration Tests
//!
//! Drives an online game through [`PlayController`] over the in-memory
//! transport, playing the server's part by hand:
//! - Game creation and start
//! - Optimistic moves, confirmation and rejection
//! - Opponent moves, server-side game end
//! - Connection loss

use async_trait::async_trait;
use shared::protocol::{ClientMessage, EndReason, ServerMessage, Side, WireTimeControl};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;
use xfchess_session::game::error::CommandError;
use xfchess_session::game::modes::PlayController;
use xfchess_session::game::resources::{GameOverReason, Winner};
use xfchess_session::game::rules::{ChessRules, MoveRequest, RulesOracle, STARTING_FEN};
use xfchess_session::game::session::{
    ClockState, Lifecycle, SessionConfig, SessionManager, SessionView,
};
use xfchess_session::game::types::{GameMode, PieceColor, TimeControl};
use xfchess_session::networking::{
    ChannelTransport, ServerEnd, Transport, TransportError, TransportEvent, TransportResult,
};

const FIVE_MINUTES: i64 = 300_000;

fn mv(uci: &str) -> MoveRequest {
    MoveRequest::parse_uci(uci).expect("valid uci")
}

fn after(fen: &str, uci: &str) -> String {
    ChessRules.apply_move(fen, &mv(uci)).expect("legal").fen
}

struct Online {
    manager: Arc<SessionManager>,
    play: PlayController,
    server: ServerEnd,
    game_id: Uuid,
}

/// Connected game that the server has already started, local player White
async fn started_game() -> Online {
    let manager = Arc::new(SessionManager::with_default_rules());
    let (client, server) = ChannelTransport::pair();
    let config = SessionConfig::new(GameMode::Play).with_time_control(TimeControl::new(5, 0));
    let play = PlayController::multiplayer(manager.clone(), Arc::new(client), config);
    assert!(play.initialize().await.success);

    let game_id = Uuid::new_v4();
    play.handle_server_message(ServerMessage::GameCreated {
        game_id,
        color: Side::White,
    });
    let started = play.handle_server_message(ServerMessage::GameStarted {
        game_id,
        fen: STARTING_FEN.to_string(),
        white_time_ms: FIVE_MINUTES,
        black_time_ms: FIVE_MINUTES,
    });
    assert!(started.success);

    Online {
        manager,
        play,
        server,
        game_id,
    }
}

impl Online {
    fn view(&self) -> SessionView {
        self.manager
            .get_session(self.play.session_id())
            .expect("session exists")
    }
}

// ============================================================================
// Setup Tests
// ============================================================================

#[tokio::test]
async fn test_create_game_request() {
    let manager = Arc::new(SessionManager::with_default_rules());
    let (client, mut server) = ChannelTransport::pair();
    let config = SessionConfig::new(GameMode::Play).with_time_control(TimeControl::new(3, 2));
    let play = PlayController::multiplayer(manager.clone(), Arc::new(client), config);

    assert!(play.initialize().await.success);
    assert_eq!(
        manager.get_session(play.session_id()).unwrap().lifecycle,
        Lifecycle::Initializing
    );
    assert!(play.create_game().await.success);

    assert_eq!(
        server.drain(),
        vec![ClientMessage::CreateGame {
            time_control: WireTimeControl {
                minutes: 3,
                increment_seconds: 2,
            },
            color: Some(Side::White),
        }]
    );
}

#[tokio::test]
async fn test_join_game_takes_server_color_and_position() {
    let manager = Arc::new(SessionManager::with_default_rules());
    let (client, mut server) = ChannelTransport::pair();
    let play =
        PlayController::multiplayer(manager.clone(), Arc::new(client), SessionConfig::default());
    play.initialize().await;

    let game_id = Uuid::new_v4();
    assert!(play.join_game(game_id).await.success);
    assert_eq!(server.drain(), vec![ClientMessage::JoinGame { game_id }]);

    let fen = after(STARTING_FEN, "e2e4");
    play.handle_server_message(ServerMessage::GameJoined {
        game_id,
        color: Side::Black,
        fen: fen.clone(),
    });
    play.handle_server_message(ServerMessage::GameStarted {
        game_id,
        fen: fen.clone(),
        white_time_ms: 1_000,
        black_time_ms: 2_000,
    });

    let view = manager.get_session(play.session_id()).unwrap();
    assert_eq!(play.game_id(), Some(game_id));
    assert_eq!(view.lifecycle, Lifecycle::Playing);
    assert_eq!(view.player_color, PieceColor::Black);
    assert_eq!(view.fen, fen);
    assert_eq!(view.clock, Some(ClockState::new(1_000, 2_000)));
    assert!(play.can_move());
    play.exit().await;
}

/// Transport whose server never answers
struct Unreachable;

#[async_trait]
impl Transport for Unreachable {
    async fn connect(&self) -> TransportResult<()> {
        Err(TransportError::Connect("connection refused".to_string()))
    }

    async fn disconnect(&self) {}

    async fn send(&self, _message: ClientMessage) -> TransportResult<()> {
        Err(TransportError::NotConnected)
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        broadcast::channel(1).1
    }

    fn is_connected(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn test_unreachable_server_fails_init() {
    let manager = Arc::new(SessionManager::with_default_rules());
    let play =
        PlayController::multiplayer(manager.clone(), Arc::new(Unreachable), SessionConfig::default());

    assert!(!play.initialize().await.success);
    let view = manager.get_session(play.session_id()).unwrap();
    assert_eq!(view.lifecycle, Lifecycle::Error);
    assert!(view.lifecycle_error.unwrap().contains("connection refused"));
}

// ============================================================================
// Move Reconciliation Tests
// ============================================================================

#[tokio::test]
async fn test_optimistic_move_then_accept() {
    let mut game = started_game().await;

    assert!(game.play.make_move(mv("e2e4")).await.success);
    let pending = game.view();
    assert!(pending.has_pending_move);
    assert_eq!(pending.move_history, vec!["e4"]);
    assert!(!game.play.can_move());
    assert_eq!(
        game.play.make_move(mv("d2d4")).await.error,
        Some(CommandError::MovePending)
    );

    assert_eq!(
        game.server.drain(),
        vec![ClientMessage::MakeMove {
            game_id: game.game_id,
            from: "e2".to_string(),
            to: "e4".to_string(),
            promotion: None,
        }]
    );

    let accepted = game.play.handle_server_message(ServerMessage::MoveAccepted {
        fen: after(STARTING_FEN, "e2e4"),
        san: "e4".to_string(),
        white_time_ms: 299_000,
        black_time_ms: FIVE_MINUTES,
    });
    assert!(accepted.success);

    let confirmed = game.view();
    assert!(!confirmed.has_pending_move);
    assert_eq!(confirmed.move_history, vec!["e4"]);
    assert_eq!(confirmed.clock, Some(ClockState::new(299_000, FIVE_MINUTES)));
    game.play.exit().await;
}

#[tokio::test]
async fn test_rejected_move_rolls_back() {
    let game = started_game().await;

    game.play.make_move(mv("e2e4")).await;
    let rejected = game.play.handle_server_message(ServerMessage::MoveRejected {
        fen: STARTING_FEN.to_string(),
        reason: "not your turn".to_string(),
    });
    assert!(rejected.success);

    let view = game.view();
    assert!(!view.has_pending_move);
    assert!(view.move_history.is_empty());
    assert_eq!(view.fen, STARTING_FEN);
    assert_eq!(view.move_error.as_deref(), Some("not your turn"));
    assert!(game.play.can_move());
    game.play.exit().await;
}

#[tokio::test]
async fn test_opponent_move_and_take_back_refused() {
    let mut game = started_game().await;

    game.play.make_move(mv("e2e4")).await;
    let e4 = after(STARTING_FEN, "e2e4");
    game.play.handle_server_message(ServerMessage::MoveAccepted {
        fen: e4.clone(),
        san: "e4".to_string(),
        white_time_ms: FIVE_MINUTES,
        black_time_ms: FIVE_MINUTES,
    });
    let moved = game.play.handle_server_message(ServerMessage::OpponentMove {
        from: "e7".to_string(),
        to: "e5".to_string(),
        promotion: None,
        san: "e5".to_string(),
        fen: after(&e4, "e7e5"),
        white_time_ms: 295_000,
        black_time_ms: 290_000,
    });
    assert!(moved.success);

    let view = game.view();
    assert_eq!(view.move_history, vec!["e4", "e5"]);
    assert_eq!(view.clock, Some(ClockState::new(295_000, 290_000)));
    assert!(game.play.can_move());

    assert!(!game.play.take_back().success);
    assert_eq!(game.view().move_history.len(), 2);
    game.server.drain();
    game.play.exit().await;
}

#[tokio::test]
async fn test_send_failure_restores_confirmed_position() {
    let game = started_game().await;
    game.server.drop_connection("server restarted");

    let outcome = game.play.make_move(mv("e2e4")).await;
    assert!(!outcome.success);
    let view = game.view();
    assert!(!view.has_pending_move);
    assert_eq!(view.fen, STARTING_FEN);
}

// ============================================================================
// Game End Tests
// ============================================================================

#[tokio::test]
async fn test_server_game_over() {
    let game = started_game().await;

    let over = game.play.handle_server_message(ServerMessage::GameOver {
        reason: EndReason::Time,
        winner: Some(Side::Black),
    });
    assert!(over.success);
    let view = game.view();
    assert_eq!(view.lifecycle, Lifecycle::Ended);
    assert_eq!(view.game_over_reason, Some(GameOverReason::Time));
    assert_eq!(view.game_winner, Some(Winner::Black));

    let repeated = game.play.handle_server_message(ServerMessage::GameOver {
        reason: EndReason::Resignation,
        winner: Some(Side::White),
    });
    assert!(repeated.success);
    assert_eq!(game.view().game_over_reason, Some(GameOverReason::Time));
}

#[tokio::test]
async fn test_opponent_left_wins_by_abandonment() {
    let game = started_game().await;

    game.play.handle_server_message(ServerMessage::OpponentLeft);
    let view = game.view();
    assert_eq!(view.game_over_reason, Some(GameOverReason::Abandonment));
    assert_eq!(view.game_winner, Some(Winner::White));
}

#[tokio::test]
async fn test_exit_leaves_game_and_releases_session() {
    let mut game = started_game().await;

    assert!(game.play.exit().await.success);
    assert_eq!(
        game.server.drain(),
        vec![ClientMessage::LeaveGame {
            game_id: game.game_id
        }]
    );
    assert!(game.manager.get_session(game.play.session_id()).is_none());
    assert_eq!(game.manager.session_count(), 0);
}

#[tokio::test]
async fn test_event_loop_applies_messages_until_disconnect() {
    let game = started_game().await;
    let e4 = after(STARTING_FEN, "e2e4");
    assert!(game.play.make_move(mv("e2e4")).await.success);

    game.server.push(ServerMessage::Error {
        message: "rate limited".to_string(),
    });
    game.server.push_error("garbled frame");
    game.server.push(ServerMessage::TimeUpdate {
        white_time_ms: 250_000,
        black_time_ms: 260_000,
    });
    game.server.push(ServerMessage::MoveAccepted {
        fen: e4,
        san: "e4".to_string(),
        white_time_ms: 250_000,
        black_time_ms: 260_000,
    });
    game.server.drop_connection("socket closed");

    game.play.run_transport_events().await;

    let view = game.view();
    assert_eq!(view.lifecycle, Lifecycle::Error);
    assert_eq!(view.lifecycle_error.as_deref(), Some("socket closed"));
    assert_eq!(view.move_history, vec!["e4"]);
    assert!(!view.has_pending_move);
    assert_eq!(view.clock, Some(ClockState::new(250_000, 260_000)));
}
