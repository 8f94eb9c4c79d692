//! Run progress reporting.

use std::sync::{Arc, Mutex};
use tracing::debug;

/// What the engine is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Launching,
    Navigating,
    Scraping,
    Branching,
    Grafting,
    Closing,
    Paused,
    RequestAborted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Launching => "launching",
            Phase::Navigating => "navigating",
            Phase::Scraping => "scraping",
            Phase::Branching => "branching",
            Phase::Grafting => "grafting",
            Phase::Closing => "closing",
            Phase::Paused => "paused",
            Phase::RequestAborted => "request aborted",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the run's phase and counters. Cloneable so sleeps
/// and background reports can share it with the loop.
#[derive(Clone)]
pub struct ProgressReporter {
    state: Arc<Mutex<ProgressState>>,
}

struct ProgressState {
    phase: Phase,
    scraped: usize,
    jumps: u32,
    id: String,
}

impl ProgressReporter {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProgressState {
                phase: Phase::Launching,
                scraped: 0,
                jumps: 0,
                id: id.into(),
            })),
        }
    }

    pub fn set_phase(&self, phase: Phase) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.phase != phase {
            state.phase = phase;
            debug!(id = %state.id, phase = %phase, scraped = state.scraped, "phase change");
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).phase
    }

    pub fn record_scraped(&self, scraped: usize) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).scraped = scraped;
    }

    pub fn record_jump(&self, jumps: u32) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).jumps = jumps;
    }

    /// One periodic status line, emitted during sleeps.
    pub fn report(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!(
            id = %state.id,
            phase = %state.phase,
            scraped = state.scraped,
            jumps = state.jumps,
            "progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        let progress = ProgressReporter::new("sunset");
        assert_eq!(progress.phase(), Phase::Launching);
        progress.set_phase(Phase::Scraping);
        assert_eq!(progress.phase(), Phase::Scraping);
    }
}
