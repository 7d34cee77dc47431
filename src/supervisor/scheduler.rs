//! Scheduled-restart countdown.
//!
//! Background task that waits for the server to become ready, then counts
//! down a configured interval, warning players at fixed marks before
//! issuing the `stop` command. Every wait goes through the run's
//! cancellable sleep, so the task always terminates when the server stops
//! for any other reason.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::handle::WrapperHandle;
use super::signals::{RunSignals, SleepOutcome};

/// Warning marks in seconds before the restart deadline, descending.
pub const RESTART_WARNINGS: [u64; 5] = [300, 60, 30, 20, 10];

/// Countdown task for one server run.
#[derive(Debug)]
pub struct RestartScheduler {
    handle: WrapperHandle,
    signals: RunSignals,
    total_secs: u64,
}

impl RestartScheduler {
    /// Spawn the countdown for a run, or `None` when the interval is zero
    /// (scheduled restarts disabled).
    #[must_use]
    pub fn spawn(
        handle: WrapperHandle,
        signals: RunSignals,
        interval_hours: f64,
    ) -> Option<JoinHandle<()>> {
        if interval_hours <= 0.0 {
            return None;
        }
        let scheduler = Self {
            handle,
            signals,
            total_secs: (interval_hours * 3600.0).round() as u64,
        };
        Some(tokio::spawn(scheduler.run()))
    }

    async fn run(self) {
        let mut remaining = self.total_secs;

        // Don't start the clock until the server finished booting.
        if self.signals.wait_ready().await.is_err() {
            return;
        }

        tracing::info!(secs = remaining, "Scheduled restart countdown started");
        self.announce(remaining);

        while remaining > 0 {
            // Largest warning mark strictly below the time left; past the
            // last mark we sleep straight through to the deadline.
            let next_mark = RESTART_WARNINGS.iter().copied().find(|&t| t < remaining);
            let sleep_secs = next_mark.map_or(remaining, |mark| remaining - mark);

            match self.signals.sleep(Duration::from_secs(sleep_secs)).await {
                Ok(SleepOutcome::Completed) => {}
                Ok(SleepOutcome::Interrupted) | Err(_) => {
                    tracing::debug!("Server stopped, restart countdown abandoned");
                    return;
                }
            }

            remaining -= sleep_secs;
            if remaining <= 1 {
                tracing::info!("Scheduled restart deadline reached, stopping server");
                self.handle.send_command("say Server is restarting now!");
                self.handle.send_command("stop");
                return;
            }
            self.announce(remaining);
        }
    }

    fn announce(&self, remaining_secs: u64) {
        self.handle.send_command(&format!(
            "say Server will restart in {}",
            format_remaining(remaining_secs)
        ));
    }
}

/// Human-friendly single-unit rendering of a countdown value.
fn format_remaining(secs: u64) -> String {
    if secs % 3600 == 0 && secs >= 3600 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 && secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
