//! Clock driver
//!
//! [`Timer`] ticks a shared [`GameTimer`] from a tokio interval. The side to
//! move is read through a callback on every tick, so the driver never holds a
//! reference to the session it times.
//!
//! # Integration
//!
//! ```rust,ignore
//! let timer = Timer::new(time_control);
//! let manager = manager.clone();
//! timer.start(
//!     move || manager.side_to_move(id),
//!     move |side| info!("[TIMER] {} flagged", side),
//! );
//! ```

use crate::game::resources::timer::{GameTimer, TICK_INTERVAL_MS};
use crate::game::types::{PieceColor, TimeControl};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const LOW_TIME_WARNING_MS: i64 = 10_000;
const LOW_TIME_NOTICE_MS: i64 = 30_000;

/// Tokio-driven game clock
#[derive(Debug)]
pub struct Timer {
    clock: Arc<Mutex<GameTimer>>,
    task: Mutex<Option<JoinHandle<()>>>,
    period: Duration,
}

impl Timer {
    pub fn new(time_control: TimeControl) -> Self {
        Self {
            clock: Arc::new(Mutex::new(GameTimer::new(time_control))),
            task: Mutex::new(None),
            period: Duration::from_millis(TICK_INTERVAL_MS as u64),
        }
    }

    /// Start ticking, replacing any running ticker
    ///
    /// # Arguments
    ///
    /// * `current_turn` - side whose clock runs; `None` pauses the tick
    /// * `on_timeout` - called once with the side whose time ran out
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start<T, F>(&self, current_turn: T, on_timeout: F)
    where
        T: Fn() -> Option<PieceColor> + Send + 'static,
        F: FnOnce(PieceColor) + Send + 'static,
    {
        self.abort_task();
        self.clock.lock().start();

        let clock = Arc::clone(&self.clock);
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            let mut last = Instant::now();

            loop {
                interval.tick().await;
                let now = Instant::now();
                let elapsed = now.duration_since(last).as_millis() as i64;
                last = now;

                let Some(turn) = current_turn() else {
                    continue;
                };

                let flagged = {
                    let mut clock = clock.lock();
                    if !clock.is_running {
                        break;
                    }
                    let before = clock.remaining(turn);
                    let flagged = clock.tick(elapsed, turn);
                    log_low_time(turn, before, clock.remaining(turn));
                    flagged
                };

                if let Some(side) = flagged {
                    info!("[TIMER] ========== TIME OUT! ==========");
                    info!("[TIMER] {} ran out of time", side);
                    on_timeout(side);
                    break;
                }
            }
        });

        *self.task.lock() = Some(handle);
        debug!("[TIMER] Started ({} ms tick)", TICK_INTERVAL_MS);
    }

    /// Stop ticking; safe to call repeatedly
    pub fn stop(&self) {
        self.abort_task();
        self.clock.lock().stop();
    }

    /// Overwrite both clocks with authoritative values
    pub fn sync(&self, white_ms: i64, black_ms: i64) {
        self.clock.lock().sync(white_ms, black_ms);
    }

    /// Stop and reinitialise for a new game
    pub fn reset(&self, minutes: u32, increment_seconds: u32) {
        self.abort_task();
        self.clock.lock().reset(minutes, increment_seconds);
    }

    pub fn add_increment(&self, side: PieceColor) {
        self.clock.lock().add_increment(side);
    }

    pub fn remaining(&self, side: PieceColor) -> i64 {
        self.clock.lock().remaining(side)
    }

    pub fn snapshot(&self) -> GameTimer {
        self.clock.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.clock.lock().is_running
    }

    fn abort_task(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.abort_task();
    }
}

fn log_low_time(side: PieceColor, before: i64, after: i64) {
    if before > LOW_TIME_WARNING_MS && after <= LOW_TIME_WARNING_MS {
        warn!("[TIMER] {} has 10 seconds remaining!", side);
    } else if before > LOW_TIME_NOTICE_MS && after <= LOW_TIME_NOTICE_MS {
        info!("[TIMER] {} has 30 seconds remaining", side);
    }
}
