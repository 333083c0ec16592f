//! Core module - Application infrastructure shared by every game mode
//!
//! Holds the pieces of the crate that are not chess-specific: user settings and
//! their persistence, logging setup, and the error type for both.
//!
//! # Architecture Overview
//!
//! - [`GameSettings`] - User preferences (time control, colour, difficulty, engine, server)
//! - [`settings_persistence`] - JSON load/save in the platform config directory
//! - [`logging`] - `tracing` subscriber initialisation
//! - [`CoreError`] - Errors raised by the above
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use xfchess_session::core::{logging, settings_persistence};
//!
//! logging::init_tracing("info");
//! let settings = settings_persistence::load_settings();
//! ```

pub mod error;
pub mod logging;
pub mod resources;
pub mod settings_persistence;

pub use error::{CoreError, CoreResult};
pub use resources::*;
