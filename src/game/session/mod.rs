//! Game sessions - authoritative state for one game each
//!
//! A session owns the canonical position, the displayed position, move
//! history, captures, the result and the lifecycle of a single game. Nothing
//! outside this module writes those fields: mode controllers issue
//! [`Command`]s and lifecycle events through the [`SessionManager`], which
//! reduces them transactionally and announces each success on its event bus.
//!
//! # Architecture
//!
//! - [`lifecycle`] - `idle -> initializing -> playing -> ended` state machine
//! - [`state`] - [`SessionState`] and its position sum type
//! - [`command`] - the closed [`Command`] enum and [`CommandOutcome`]
//! - [`reducer`] - pure application of commands to a state
//! - [`manager`] - registry, transactions and event fan-out
//! - [`events`] - subscriptions and change events
//! - [`view`] - read model with derived display fields
//!
//! # Integration
//!
//! ```rust,ignore
//! let manager = Arc::new(SessionManager::with_default_rules());
//! let _sub = manager.subscribe(|event| println!("{:?}", event));
//!
//! let id = manager.start_game(SessionConfig::new(GameMode::Play));
//! manager.complete_init(id);
//! manager.apply_command(id, Command::apply_move(MoveRequest::parse_uci("e2e4")?));
//! ```

pub mod command;
pub mod events;
pub mod lifecycle;
pub mod manager;
pub mod reducer;
pub mod state;
pub mod view;


pub use command::{Command, CommandKind, CommandOutcome, PositionReset, StatePatch};
pub use events::{ChangeKind, EventBus, SessionEvent, Subscription};
pub use lifecycle::{Lifecycle, LifecycleEvent};
pub use manager::SessionManager;
pub use state::{
    AnalysisState, ClockState, Line, ModeState, MoveFeedback, MoveQuality, PositionState,
    PuzzleFeedback, PuzzleState, SessionConfig, SessionState, TrainingState,
};
pub use view::{LastMove, SessionView};
