//! Stale-result guard for engine analysis
//!
//! Every analysis request is tagged with the position it was issued for and
//! a generation number. When the result arrives it is kept only if no newer
//! request was issued and the position is still the one on display.

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Current {
    generation: u64,
    fen: Option<String>,
}

/// Handed out by [`AnalysisTracker::begin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTicket {
    pub generation: u64,
    pub fen: String,
}

#[derive(Debug, Default)]
pub struct AnalysisTracker {
    current: Mutex<Current>,
}

impl AnalysisTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request for `fen`, invalidating older ones
    pub fn begin(&self, fen: &str) -> AnalysisTicket {
        let mut current = self.current.lock();
        current.generation += 1;
        current.fen = Some(fen.to_string());
        AnalysisTicket {
            generation: current.generation,
            fen: fen.to_string(),
        }
    }

    /// Whether `ticket` is the latest request and still matches `displayed_fen`
    pub fn is_current(&self, ticket: &AnalysisTicket, displayed_fen: &str) -> bool {
        let current = self.current.lock();
        current.generation == ticket.generation
            && current.fen.as_deref() == Some(ticket.fen.as_str())
            && ticket.fen == displayed_fen
    }

    /// Close `ticket`; returns whether its result should be used
    pub fn finish(&self, ticket: &AnalysisTicket, displayed_fen: &str) -> bool {
        let fresh = self.is_current(ticket, displayed_fen);
        if fresh {
            self.current.lock().fen = None;
        }
        fresh
    }

    /// Drop every outstanding request
    pub fn invalidate(&self) {
        let mut current = self.current.lock();
        current.generation += 1;
        current.fen = None;
    }

    pub fn generation(&self) -> u64 {
        self.current.lock().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "8/8/8/8/8/8/8/K6k w - - 0 1";
    const B: &str = "8/8/8/8/8/8/8/K6k b - - 0 1";

    #[test]
    fn test_newer_request_wins() {
        let tracker = AnalysisTracker::new();
        let first = tracker.begin(A);
        let second = tracker.begin(B);

        assert!(!tracker.finish(&first, A));
        assert!(tracker.finish(&second, B));
    }

    #[test]
    fn test_position_change_discards() {
        let tracker = AnalysisTracker::new();
        let ticket = tracker.begin(A);
        assert!(!tracker.is_current(&ticket, B));
        assert!(tracker.is_current(&ticket, A));
    }

    #[test]
    fn test_invalidate_and_finish_once() {
        let tracker = AnalysisTracker::new();
        let ticket = tracker.begin(A);
        assert!(tracker.finish(&ticket, A));
        assert!(!tracker.finish(&ticket, A));

        let ticket = tracker.begin(A);
        tracker.invalidate();
        assert!(!tracker.is_current(&ticket, A));
        assert_eq!(tracker.generation(), 3);
    }
}
