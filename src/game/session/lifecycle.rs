//! Session lifecycle state machine
//!
//! ```text
//!            START_GAME              INIT_SUCCESS             END_GAME
//!   idle ───────────────► initializing ───────────► playing ───────────► ended
//!    ▲                        │    ▲                  │                    │
//!    │           INIT_FAILURE │    │ START_GAME       │ FAULT              │
//!    │                        ▼    │ (retry)          ▼                    │
//!    │                        error ◄─────────────────┘                    │
//!    │                                                                     │
//!    └──────────── EXIT_GAME (from initializing, playing, ended, error) ───┘
//! ```
//!
//! Every pair not drawn above is rejected with [`TransitionError`] and leaves
//! the lifecycle unchanged.

use crate::game::error::TransitionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse state of a game session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Created, no game started yet
    #[default]
    Idle,
    /// Waiting for the opening position and external resources (engine, server)
    Initializing,
    /// Accepting moves
    Playing,
    /// Game has a result
    Ended,
    /// Resource setup or a running game failed; see the session's error message
    Error,
}

impl Lifecycle {
    /// Next state for `event`, or the reason the event is not allowed
    pub fn next(self, event: &LifecycleEvent) -> Result<Lifecycle, TransitionError> {
        use LifecycleEvent as E;

        let next = match (self, event) {
            (Lifecycle::Idle | Lifecycle::Error, E::StartGame) => Lifecycle::Initializing,
            (Lifecycle::Initializing, E::InitSuccess) => Lifecycle::Playing,
            (Lifecycle::Initializing, E::InitFailure(_)) => Lifecycle::Error,
            (Lifecycle::Playing, E::Fault(_)) => Lifecycle::Error,
            (Lifecycle::Playing, E::EndGame) => Lifecycle::Ended,
            (
                Lifecycle::Initializing | Lifecycle::Playing | Lifecycle::Ended | Lifecycle::Error,
                E::ExitGame,
            ) => Lifecycle::Idle,
            _ => {
                return Err(TransitionError::Invalid {
                    from: self,
                    event: event.name(),
                })
            }
        };
        Ok(next)
    }

    pub fn is_playing(self) -> bool {
        self == Lifecycle::Playing
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Initializing => "initializing",
            Lifecycle::Playing => "playing",
            Lifecycle::Ended => "ended",
            Lifecycle::Error => "error",
        })
    }
}

/// Input to the lifecycle machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    StartGame,
    InitSuccess,
    InitFailure(String),
    /// Engine crash or lost connection during play
    Fault(String),
    EndGame,
    ExitGame,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::StartGame => "START_GAME",
            LifecycleEvent::InitSuccess => "INIT_SUCCESS",
            LifecycleEvent::InitFailure(_) => "INIT_FAILURE",
            LifecycleEvent::Fault(_) => "FAULT",
            LifecycleEvent::EndGame => "END_GAME",
            LifecycleEvent::ExitGame => "EXIT_GAME",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [Lifecycle; 5] = [
        Lifecycle::Idle,
        Lifecycle::Initializing,
        Lifecycle::Playing,
        Lifecycle::Ended,
        Lifecycle::Error,
    ];

    fn all_events() -> Vec<LifecycleEvent> {
        vec![
            LifecycleEvent::StartGame,
            LifecycleEvent::InitSuccess,
            LifecycleEvent::InitFailure("engine".into()),
            LifecycleEvent::Fault("socket".into()),
            LifecycleEvent::EndGame,
            LifecycleEvent::ExitGame,
        ]
    }

    #[test]
    fn test_happy_path() {
        let s = Lifecycle::Idle;
        let s = s.next(&LifecycleEvent::StartGame).unwrap();
        assert_eq!(s, Lifecycle::Initializing);
        let s = s.next(&LifecycleEvent::InitSuccess).unwrap();
        assert_eq!(s, Lifecycle::Playing);
        let s = s.next(&LifecycleEvent::EndGame).unwrap();
        assert_eq!(s, Lifecycle::Ended);
        let s = s.next(&LifecycleEvent::ExitGame).unwrap();
        assert_eq!(s, Lifecycle::Idle);
    }

    #[test]
    fn test_error_and_retry() {
        let s = Lifecycle::Initializing
            .next(&LifecycleEvent::InitFailure("no engine".into()))
            .unwrap();
        assert_eq!(s, Lifecycle::Error);
        assert_eq!(
            s.next(&LifecycleEvent::StartGame).unwrap(),
            Lifecycle::Initializing
        );
        assert_eq!(
            Lifecycle::Playing
                .next(&LifecycleEvent::Fault("disconnected".into()))
                .unwrap(),
            Lifecycle::Error
        );
    }

    #[test]
    fn test_transition_table_is_exact() {
        //! Exactly ten (state, event) pairs are allowed
        let allowed = ALL_STATES
            .iter()
            .flat_map(|s| all_events().into_iter().map(move |e| s.next(&e)))
            .filter(Result::is_ok)
            .count();
        assert_eq!(allowed, 10);
    }

    #[test]
    fn test_rejected_transition_reports_pair() {
        let err = Lifecycle::Ended.next(&LifecycleEvent::StartGame).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Invalid {
                from: Lifecycle::Ended,
                event: "START_GAME"
            }
        );
        assert!(Lifecycle::Idle.next(&LifecycleEvent::ExitGame).is_err());
        assert!(Lifecycle::Idle.next(&LifecycleEvent::EndGame).is_err());
    }
}
