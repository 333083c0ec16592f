use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Side as it appears on the wire
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

/// Why the server ended a game
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    Time,
    Resignation,
    Abandonment,
}

/// Time control requested when creating a game
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireTimeControl {
    pub minutes: u32,
    pub increment_seconds: u32,
}

/// Client → Server messages
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    #[serde(rename = "game:create")]
    CreateGame {
        time_control: WireTimeControl,
        /// `None` lets the server pick a side
        color: Option<Side>,
    },
    #[serde(rename = "game:join")]
    JoinGame { game_id: Uuid },
    #[serde(rename = "move:make")]
    MakeMove {
        game_id: Uuid,
        from: String,
        to: String,
        promotion: Option<char>,
    },
    #[serde(rename = "game:resign")]
    Resign { game_id: Uuid },
    #[serde(rename = "game:leave")]
    LeaveGame { game_id: Uuid },
}

/// Server → Client messages
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "game:created")]
    GameCreated { game_id: Uuid, color: Side },
    #[serde(rename = "game:joined")]
    GameJoined {
        game_id: Uuid,
        color: Side,
        fen: String,
    },
    #[serde(rename = "game:started")]
    GameStarted {
        game_id: Uuid,
        fen: String,
        white_time_ms: i64,
        black_time_ms: i64,
    },
    #[serde(rename = "move:accepted")]
    MoveAccepted {
        fen: String,
        san: String,
        white_time_ms: i64,
        black_time_ms: i64,
    },
    #[serde(rename = "move:rejected")]
    MoveRejected { fen: String, reason: String },
    #[serde(rename = "move:opponent")]
    OpponentMove {
        from: String,
        to: String,
        promotion: Option<char>,
        san: String,
        fen: String,
        white_time_ms: i64,
        black_time_ms: i64,
    },
    #[serde(rename = "time:update")]
    TimeUpdate {
        white_time_ms: i64,
        black_time_ms: i64,
    },
    #[serde(rename = "game:over")]
    GameOver {
        reason: EndReason,
        /// `None` for a draw
        winner: Option<Side>,
    },
    #[serde(rename = "opponent:left")]
    OpponentLeft,
    #[serde(rename = "error")]
    Error { message: String },
}
