//! User settings shared by every game mode
//!
//! [`GameSettings`] is the small preference blob persisted between runs by
//! [`crate::core::settings_persistence`]. Unknown or missing fields fall back
//! to their defaults so older settings files keep loading.

use crate::core::error::{CoreError, CoreResult};
use crate::game::ai::resource::AIDifficulty;
use crate::game::types::{PieceColor, TimeControl};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Default multiplayer endpoint
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws";

/// Preferences that can be changed from the settings menu or the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Clock for new games; `None` plays without a clock
    pub time_control: Option<TimeControl>,

    /// Colour the player takes in new games
    pub preferred_color: PieceColor,

    /// Last selected AI strength
    pub difficulty: AIDifficulty,

    /// UCI engine executable; `None` uses the built-in scripted opponent
    pub engine_path: Option<PathBuf>,

    /// Multiplayer WebSocket endpoint
    pub server_url: String,

    /// Whether training mode shows hints automatically
    pub show_hints: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            time_control: Some(TimeControl::default()),
            preferred_color: PieceColor::White,
            difficulty: AIDifficulty::Medium,
            engine_path: None,
            server_url: DEFAULT_SERVER_URL.to_string(),
            show_hints: true,
        }
    }
}

impl GameSettings {
    /// Parse [`GameSettings::server_url`]
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUrl`] when the stored string is not a URL.
    pub fn server_url(&self) -> CoreResult<Url> {
        Url::parse(&self.server_url).map_err(|source| CoreError::InvalidUrl {
            url: self.server_url.clone(),
            source,
        })
    }
}
