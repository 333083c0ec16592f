//! Game clock state
//!
//! [`GameTimer`] is the pure clock: two remaining-time counters, a Fischer
//! increment and the timeout bookkeeping. It never looks at the wall clock;
//! [`crate::game::systems::clock::Timer`] drives it from a tokio interval.
//!
//! A side's timeout is reported exactly once per game. Reporting it stops the
//! clock, and later ticks are ignored until [`GameTimer::reset`].

use crate::game::types::{PieceColor, TimeControl};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Interval at which the driver ticks the clock
pub const TICK_INTERVAL_MS: i64 = 100;

/// Clock state for both sides, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTimer {
    pub white_time_ms: i64,
    pub black_time_ms: i64,
    /// Fischer increment added after each completed move
    pub increment_ms: i64,
    pub is_running: bool,
    white_flagged: bool,
    black_flagged: bool,
}

impl Default for GameTimer {
    fn default() -> Self {
        Self::new(TimeControl::default())
    }
}

impl GameTimer {
    pub fn new(time_control: TimeControl) -> Self {
        Self {
            white_time_ms: time_control.initial_ms(),
            black_time_ms: time_control.initial_ms(),
            increment_ms: time_control.increment_ms(),
            is_running: false,
            white_flagged: false,
            black_flagged: false,
        }
    }

    pub fn start(&mut self) {
        self.is_running = true;
    }

    /// Idempotent
    pub fn stop(&mut self) {
        self.is_running = false;
    }

    /// Decrement `turn`'s clock by `elapsed_ms`
    ///
    /// Returns the side whose time just ran out, once per side per game.
    pub fn tick(&mut self, elapsed_ms: i64, turn: PieceColor) -> Option<PieceColor> {
        if !self.is_running || self.has_flagged(turn) {
            return None;
        }

        let remaining = self.time_mut(turn);
        *remaining = (*remaining - elapsed_ms.max(0)).max(0);

        if *remaining == 0 {
            self.set_flagged(turn);
            self.is_running = false;
            debug!("[TIMER] {} flagged", turn);
            return Some(turn);
        }
        None
    }

    /// Authoritative overwrite; negative values clamp to zero
    pub fn sync(&mut self, white_ms: i64, black_ms: i64) {
        self.white_time_ms = white_ms.max(0);
        self.black_time_ms = black_ms.max(0);
    }

    /// Stop and reinitialise both clocks
    pub fn reset(&mut self, minutes: u32, increment_seconds: u32) {
        *self = Self::new(TimeControl::new(minutes, increment_seconds));
    }

    /// Fischer increment after `side` completed a move
    pub fn add_increment(&mut self, side: PieceColor) {
        if self.has_flagged(side) {
            return;
        }
        let increment = self.increment_ms;
        *self.time_mut(side) += increment;
    }

    pub fn remaining(&self, side: PieceColor) -> i64 {
        match side {
            PieceColor::White => self.white_time_ms,
            PieceColor::Black => self.black_time_ms,
        }
    }

    pub fn has_flagged(&self, side: PieceColor) -> bool {
        match side {
            PieceColor::White => self.white_flagged,
            PieceColor::Black => self.black_flagged,
        }
    }

    fn set_flagged(&mut self, side: PieceColor) {
        match side {
            PieceColor::White => self.white_flagged = true,
            PieceColor::Black => self.black_flagged = true,
        }
    }

    fn time_mut(&mut self, side: PieceColor) -> &mut i64 {
        match side {
            PieceColor::White => &mut self.white_time_ms,
            PieceColor::Black => &mut self.black_time_ms,
        }
    }
}
