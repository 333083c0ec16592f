//! Session registry
//!
//! [`SessionManager`] owns every live [`SessionState`] and is the only thing
//! that mutates one. Controllers hold an `Arc<SessionManager>` and talk to it
//! through [`SessionManager::apply_command`] and the lifecycle helpers.
//!
//! # Transactions
//!
//! A command is reduced on a clone of the session while the registry lock is
//! held; the clone replaces the stored state only if the reducer returned
//! `Ok`. The registry lock is released before subscribers run, so handlers
//! are free to read the manager or issue further commands.
//!
//! # Event ordering
//!
//! Mutation and publication of one change happen under a re-entrant dispatch
//! lock. A destroy from another thread therefore waits for in-flight events
//! to finish, and [`ChangeKind::Destroyed`] is always the last event a
//! subscriber sees for a session id.

use crate::game::error::CommandError;
use crate::game::rules::{fen_side_to_move, ChessRules, RulesOracle, STARTING_FEN};
use crate::game::session::command::{Command, CommandOutcome};
use crate::game::session::events::{ChangeKind, EventBus, SessionEvent, Subscription};
use crate::game::session::lifecycle::LifecycleEvent;
use crate::game::session::reducer;
use crate::game::session::state::{SessionConfig, SessionState};
use crate::game::session::view::SessionView;
use crate::game::types::{PieceColor, SessionId};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionManager {
    oracle: Arc<dyn RulesOracle>,
    sessions: Mutex<HashMap<SessionId, SessionState>>,
    active: Mutex<Option<SessionId>>,
    bus: EventBus,
    dispatch: ReentrantMutex<()>,
}

impl SessionManager {
    pub fn new(oracle: Arc<dyn RulesOracle>) -> Self {
        Self {
            oracle,
            sessions: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            bus: EventBus::new(),
            dispatch: ReentrantMutex::new(()),
        }
    }

    /// Manager backed by the bundled [`ChessRules`]
    pub fn with_default_rules() -> Self {
        Self::new(Arc::new(ChessRules::new()))
    }

    pub fn oracle(&self) -> &Arc<dyn RulesOracle> {
        &self.oracle
    }

    /// Register a new idle session and make it active
    ///
    /// An unparsable `initial_fen` falls back to the standard start.
    pub fn create_session(&self, config: SessionConfig) -> SessionId {
        let initial_fen = match config.initial_fen.as_deref() {
            Some(fen) => self.oracle.load_fen(fen).unwrap_or_else(|e| {
                warn!("[MANAGER] {}; starting from the standard position", e);
                STARTING_FEN.to_string()
            }),
            None => STARTING_FEN.to_string(),
        };

        let session_id = SessionId::new();
        let state = SessionState::new(session_id, &config, initial_fen);

        let _dispatch = self.dispatch.lock();
        self.sessions.lock().insert(session_id, state);
        *self.active.lock() = Some(session_id);
        info!(
            "[MANAGER] Created session {} ({:?} vs {:?}, playing {})",
            session_id, config.mode, config.opponent_type, config.player_color
        );
        self.emit(session_id, ChangeKind::Created);
        session_id
    }

    /// Create a session and move it to `initializing`
    pub fn start_game(&self, config: SessionConfig) -> SessionId {
        let session_id = self.create_session(config);
        let outcome = self.start(session_id);
        if let Some(e) = outcome.error {
            warn!("[MANAGER] Could not start {}: {}", session_id, e);
        }
        session_id
    }

    /// `START_GAME`: fresh game from `idle`, retry from `error`
    pub fn start(&self, session_id: SessionId) -> CommandOutcome {
        self.lifecycle(session_id, LifecycleEvent::StartGame)
    }

    /// `INIT_SUCCESS`
    pub fn complete_init(&self, session_id: SessionId) -> CommandOutcome {
        self.lifecycle(session_id, LifecycleEvent::InitSuccess)
    }

    /// `INIT_FAILURE`
    pub fn fail_init(&self, session_id: SessionId, message: impl Into<String>) -> CommandOutcome {
        self.lifecycle(session_id, LifecycleEvent::InitFailure(message.into()))
    }

    /// `START_GAME` out of `error`
    pub fn retry_init(&self, session_id: SessionId) -> CommandOutcome {
        self.start(session_id)
    }

    /// `FAULT` during play
    pub fn fault(&self, session_id: SessionId, message: impl Into<String>) -> CommandOutcome {
        self.lifecycle(session_id, LifecycleEvent::Fault(message.into()))
    }

    /// `EXIT_GAME`
    pub fn exit_game(&self, session_id: SessionId) -> CommandOutcome {
        self.lifecycle(session_id, LifecycleEvent::ExitGame)
    }

    /// The single mutation entry point
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let outcome = manager.apply_command(id, Command::apply_move(MoveRequest::parse_uci("e2e4")?));
    /// assert!(outcome.success);
    /// ```
    pub fn apply_command(&self, session_id: SessionId, command: Command) -> CommandOutcome {
        let kind = command.kind();
        self.transact(session_id, ChangeKind::Command(kind), |state, oracle| {
            reducer::reduce(state, command, oracle)
        })
    }

    fn lifecycle(&self, session_id: SessionId, event: LifecycleEvent) -> CommandOutcome {
        let name = event.name();
        let _dispatch = self.dispatch.lock();
        let result = self.mutate(session_id, |state, _| reducer::transition(state, event));

        match result {
            Ok(next) => {
                debug!("[MANAGER] {} {} -> {}", session_id, name, next.lifecycle);
                self.emit(session_id, ChangeKind::Lifecycle(next.lifecycle));
                CommandOutcome::ok()
            }
            Err(e) => {
                debug!("[MANAGER] {} {} refused: {}", session_id, name, e);
                CommandOutcome::failed(e)
            }
        }
    }

    fn transact<F>(&self, session_id: SessionId, kind: ChangeKind, f: F) -> CommandOutcome
    where
        F: FnOnce(&mut SessionState, &dyn RulesOracle) -> Result<(), CommandError>,
    {
        let _dispatch = self.dispatch.lock();
        match self.mutate(session_id, f) {
            Ok(_) => {
                self.emit(session_id, kind);
                CommandOutcome::ok()
            }
            Err(e) => {
                debug!("[MANAGER] {} {:?} failed: {}", session_id, kind, e);
                CommandOutcome::failed(e)
            }
        }
    }

    /// Reduce on a clone and commit on success; returns the committed state
    fn mutate<F>(&self, session_id: SessionId, f: F) -> Result<SessionState, CommandError>
    where
        F: FnOnce(&mut SessionState, &dyn RulesOracle) -> Result<(), CommandError>,
    {
        let mut sessions = self.sessions.lock();
        let stored = sessions
            .get_mut(&session_id)
            .ok_or(CommandError::SessionNotFound(session_id))?;

        let mut next = stored.clone();
        f(&mut next, self.oracle.as_ref())?;
        *stored = next.clone();
        Ok(next)
    }

    fn emit(&self, session_id: SessionId, kind: ChangeKind) {
        let event = SessionEvent { session_id, kind };
        self.bus
            .publish_while(&event, || self.sessions.lock().contains_key(&session_id));
    }

    /// Read-only view with derived display fields
    pub fn get_session(&self, session_id: SessionId) -> Option<SessionView> {
        self.snapshot(session_id)
            .map(|state| SessionView::derive(&state, self.oracle.as_ref()))
    }

    /// Clone of the raw state
    pub fn snapshot(&self, session_id: SessionId) -> Option<SessionState> {
        self.sessions.lock().get(&session_id).cloned()
    }

    /// Read the state in place
    ///
    /// `f` runs under the registry lock; it must not call back into the
    /// manager.
    pub fn with_session<R>(
        &self,
        session_id: SessionId,
        f: impl FnOnce(&SessionState) -> R,
    ) -> Option<R> {
        self.sessions.lock().get(&session_id).map(f)
    }

    /// Remove a session; `false` if it was already gone
    pub fn destroy_session(&self, session_id: SessionId) -> bool {
        let _dispatch = self.dispatch.lock();
        let removed = self.sessions.lock().remove(&session_id).is_some();
        if !removed {
            return false;
        }

        {
            let mut active = self.active.lock();
            if *active == Some(session_id) {
                *active = None;
            }
        }
        info!("[MANAGER] Destroyed session {}", session_id);
        self.bus.publish(&SessionEvent {
            session_id,
            kind: ChangeKind::Destroyed,
        });
        true
    }

    pub fn destroy_all_sessions(&self) {
        let ids: Vec<SessionId> = self.sessions.lock().keys().copied().collect();
        for session_id in ids {
            self.destroy_session(session_id);
        }
    }

    /// Listen to every session change
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Mark `session_id` active; `false` if it does not exist
    pub fn set_active(&self, session_id: SessionId) -> bool {
        if !self.sessions.lock().contains_key(&session_id) {
            return false;
        }
        *self.active.lock() = Some(session_id);
        true
    }

    pub fn active_session(&self) -> Option<SessionId> {
        *self.active.lock()
    }

    /// Side to move in the session's canonical position
    pub fn side_to_move(&self, session_id: SessionId) -> Option<PieceColor> {
        self.with_session(session_id, |state| fen_side_to_move(state.fen()))
            .flatten()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.session_count())
            .field("active", &self.active_session())
            .finish()
    }
}
