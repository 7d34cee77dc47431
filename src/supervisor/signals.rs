//! Per-run synchronization signals.
//!
//! Each server run gets a fresh [`RunSignals`]: a one-shot, re-armable
//! readiness gate plus a cancellable sleep tied to the process's running
//! state. The exit-handling path force-disarms the gate and cancels the
//! run token, so no task parked on either primitive can block past the
//! process's lifetime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Returned when a gate wait or cancellable sleep is requested while no
/// server process is active.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no server process is active")]
pub struct NotRunningError;

/// Outcome of a cancellable sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full duration elapsed while the process kept running.
    Completed,
    /// The wait was cut short because the process stopped.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    /// No arm outstanding; the run has not started.
    Idle,
    /// Armed at process start, waiting for the ready line.
    Armed,
    /// Disarmed, either by readiness or by process exit.
    Open,
}

/// Readiness gate and run-scoped cancellation for one server run.
///
/// Clones share state; hand one to every task that participates in a run.
#[derive(Debug, Clone)]
pub struct RunSignals {
    gate: Arc<watch::Sender<GateState>>,
    stopped: CancellationToken,
}

impl Default for RunSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSignals {
    /// Fresh signals with the gate idle and the run token live.
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(GateState::Idle);
        Self {
            gate: Arc::new(gate),
            stopped: CancellationToken::new(),
        }
    }

    /// Arm the readiness gate. Called exactly once per process start; the
    /// previous arm must have been disarmed first.
    pub fn arm(&self) {
        let previous = self.gate.send_replace(GateState::Armed);
        debug_assert_ne!(previous, GateState::Armed, "gate armed twice");
        tracing::debug!("readiness gate armed");
    }

    /// Disarm the gate, waking every waiter. Idempotent.
    pub fn disarm(&self) {
        self.gate.send_if_modified(|state| {
            if *state == GateState::Armed {
                *state = GateState::Open;
                true
            } else {
                false
            }
        });
    }

    /// Exit-handling path: force-disarm the gate and interrupt any
    /// in-progress cancellable sleep.
    pub fn mark_stopped(&self) {
        self.disarm();
        self.stopped.cancel();
    }

    /// Whether the run has been marked stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Block until the gate is disarmed.
    ///
    /// Returns promptly if the gate is already open, and never hangs when
    /// the process exits before becoming ready.
    ///
    /// # Errors
    ///
    /// Returns [`NotRunningError`] if called while no process is active.
    pub async fn wait_ready(&self) -> Result<(), NotRunningError> {
        let mut rx = self.gate.subscribe();
        loop {
            match *rx.borrow_and_update() {
                GateState::Open => return Ok(()),
                GateState::Idle => return Err(NotRunningError),
                GateState::Armed => {}
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Sender dropped with the gate still armed; the
                        // run is gone, so stop waiting.
                        return Ok(());
                    }
                }
                () = self.stopped.cancelled() => return Ok(()),
            }
        }
    }

    /// Sleep for `duration` unless the process stops first.
    ///
    /// The polarity is load-bearing for the restart scheduler: the timer
    /// running to completion means the process stayed up the whole time
    /// (`Completed`), while an early wake means it stopped (`Interrupted`).
    ///
    /// # Errors
    ///
    /// Returns [`NotRunningError`] if called while no process is active.
    pub async fn sleep(&self, duration: Duration) -> Result<SleepOutcome, NotRunningError> {
        if *self.gate.borrow() == GateState::Idle || self.stopped.is_cancelled() {
            return Err(NotRunningError);
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(SleepOutcome::Completed),
            () = self.stopped.cancelled() => Ok(SleepOutcome::Interrupted),
        }
    }
}
