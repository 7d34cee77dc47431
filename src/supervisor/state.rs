//! Wrapper lifecycle state machine.

/// Current state of the wrapper.
///
/// `Idle` and `Terminal` are the only states with no active child process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WrapperState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Exited,
    Terminal,
}

/// State machine tracking the wrapper lifecycle and run counters.
#[derive(Debug, Clone, Default)]
pub struct WrapperStateMachine {
    state: WrapperState,
    runs: usize,
    restarts: usize,
}

impl WrapperStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> WrapperState {
        self.state
    }

    pub fn transition(&mut self, new_state: WrapperState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        if new_state == WrapperState::Starting {
            self.runs = self.runs.saturating_add(1);
            if self.runs > 1 {
                self.restarts = self.restarts.saturating_add(1);
            }
        }
        self.state = new_state;
    }

    /// Number of server runs started, including the first.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Number of restarts (runs after the first).
    #[must_use]
    pub fn restarts(&self) -> usize {
        self.restarts
    }
}
