//! The wrapper run loop.
//!
//! Owns the server process, the per-run reader and writer tasks, the
//! restart policy, and the listener registry. One control task drives the
//! whole lifecycle; the stdout of the active run is read and dispatched
//! inline, so a new run can never race a previous run's reader on the
//! shared history and id state.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{self, ConfigError, WrapperConfig};
use crate::display;
use crate::listeners::ListenerRegistry;
use crate::server::{EventKind, LineDecoder, ServerCommand, ServerProcess, SpawnError};
use crate::updater::{self, UpdateError};

use super::handle::WrapperHandle;
use super::scheduler::RestartScheduler;
use super::signals::RunSignals;
use super::state::{WrapperState, WrapperStateMachine};

/// Grace period for the process to exit after its stdout closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Timeout for SIGTERM before escalating to SIGKILL.
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for wrapper operations.
#[derive(thiserror::Error, Debug)]
pub enum WrapperError {
    /// The server process could not be spawned.
    #[error("failed to start server process: {0}")]
    Spawn(#[from] SpawnError),
    /// The spawned process had no stdin pipe.
    #[error("server stdin not available")]
    NoStdin,
    /// The spawned process had no stdout pipe.
    #[error("server stdout not available")]
    NoStdout,
    /// Consecutive restarts without a healthy run exceeded the budget.
    #[error("giving up after {0} restart attempts")]
    RestartsExhausted(u32),
    /// Preparing the server artifact failed.
    #[error(transparent)]
    Update(#[from] UpdateError),
    /// Persisting the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a single server run amounted to.
#[derive(Debug, Clone, Copy)]
struct RunOutcome {
    /// Whether the run emitted the ready line at some point.
    became_ready: bool,
}

/// Supervisor for one server directory.
pub struct Wrapper {
    config: WrapperConfig,
    directory: PathBuf,
    command: ServerCommand,
    handle: WrapperHandle,
    registry: ListenerRegistry,
    decoder: LineDecoder,
    state: WrapperStateMachine,
    shutdown_grace: Duration,
}

impl Wrapper {
    /// Create a wrapper for a server directory with the given config.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, config: WrapperConfig) -> Self {
        let directory = directory.into();
        Self {
            command: ServerCommand::java(&directory),
            handle: WrapperHandle::new(&directory),
            registry: ListenerRegistry::new(),
            decoder: LineDecoder::new(),
            state: WrapperStateMachine::new(),
            shutdown_grace: SHUTDOWN_GRACE,
            config,
            directory,
        }
    }

    /// Replace the spawn command, used by tests to stand in a fake server.
    #[must_use]
    pub fn with_command(mut self, command: ServerCommand) -> Self {
        self.command = command;
        self
    }

    /// Shorten the shutdown grace period, used by tests.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// A handle onto this wrapper for listeners and external callers.
    #[must_use]
    pub fn handle(&self) -> WrapperHandle {
        self.handle.clone()
    }

    /// The listener registry. Only call between runs; `run` holds the
    /// wrapper exclusively, so mutation can never overlap a dispatch.
    pub fn registry_mut(&mut self) -> &mut ListenerRegistry {
        &mut self.registry
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WrapperState {
        self.state.state()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    /// Supervise the server until it stays down.
    ///
    /// Prepares the server artifact, starts the operator-console
    /// forwarder, then spawns and respawns the server per the restart
    /// policy until a user-requested stop, a disabled auto-restart, or an
    /// exhausted restart budget.
    ///
    /// # Errors
    ///
    /// Returns `WrapperError` on spawn failure or an exhausted restart
    /// budget. Artifact update failures are logged and do not abort the
    /// run when a usable `server.jar` is already present.
    pub async fn run(&mut self) -> Result<(), WrapperError> {
        if let Err(e) = self.prepare_artifact().await {
            if updater::server_jar_exists(&self.directory) {
                tracing::warn!(error = %e, "Server update failed, running existing server.jar");
            } else {
                return Err(e);
            }
        }

        let console = tokio::spawn(forward_operator_input(self.handle.clone()));
        let result = self.supervise_loop().await;
        console.abort();

        self.state.transition(WrapperState::Terminal);
        display::print_status("Wrapper shut down");
        result
    }

    /// Download or update `server.jar` if the policy calls for it, and
    /// write the EULA acceptance file.
    async fn prepare_artifact(&mut self) -> Result<(), WrapperError> {
        let changed = updater::ensure_server_jar(&mut self.config, &self.directory).await?;
        if changed {
            config::save_wrapper_config(&self.directory, &self.config)?;
        }
        updater::accept_eula(&self.directory).await?;
        Ok(())
    }

    async fn supervise_loop(&mut self) -> Result<(), WrapperError> {
        let mut attempts: u32 = 0;
        loop {
            let outcome = self.run_once().await?;
            if outcome.became_ready {
                attempts = 0;
            }

            if self.handle.is_user_stop() {
                tracing::info!("Stop was user-requested, not restarting");
                return Ok(());
            }
            if !self.config.auto_restart {
                return Ok(());
            }

            attempts += 1;
            if attempts > self.config.restart_attempts {
                return Err(WrapperError::RestartsExhausted(self.config.restart_attempts));
            }

            tracing::info!(
                attempt = attempts,
                delay_secs = self.config.restart_delay,
                "Restarting server"
            );
            tokio::time::sleep(Duration::from_secs(self.config.restart_delay)).await;
        }
    }

    /// One full server run: spawn, read stdout to EOF, tear down. A user
    /// stop request bounds the remaining read by the shutdown grace
    /// period; a server that ignores its stop command is terminated.
    async fn run_once(&mut self) -> Result<RunOutcome, WrapperError> {
        self.state.transition(WrapperState::Starting);
        display::print_status("Starting server...");

        let mut process = ServerProcess::spawn(&self.command)?;
        let stdin = process.take_stdin().ok_or(WrapperError::NoStdin)?;
        let stdout = process.take_stdout().ok_or(WrapperError::NoStdout)?;
        let stderr = process.take_stderr();

        // Fresh per run; the exit path below is the only place that
        // releases waiters, so reuse across runs can never race it.
        let signals = RunSignals::new();
        signals.arm();

        let (tx, rx) = mpsc::unbounded_channel();
        self.handle.attach_writer(tx);
        let writer = tokio::spawn(forward_commands(rx, stdin));
        let stderr_task: Option<JoinHandle<()>> = stderr.map(|s| tokio::spawn(drain_stderr(s)));
        let scheduler = RestartScheduler::spawn(
            self.handle.clone(),
            signals.clone(),
            self.config.scheduled_restart,
        );

        self.state.transition(WrapperState::Running);
        tracing::info!(pid = ?process.id(), "Server process started");

        let mut lines = BufReader::new(stdout).lines();
        let mut became_ready = false;
        let mut force_terminate = false;
        let stop_watch = self.handle.clone();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        became_ready |= self.handle_line(&line, &signals).await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read server stdout");
                        break;
                    }
                },
                () = stop_watch.user_stop_requested() => {
                    self.state.transition(WrapperState::Stopping);
                    // The server has its stop command; keep draining output
                    // for the grace period, then put it down ourselves if
                    // stdout never closes.
                    let deadline = tokio::time::sleep(self.shutdown_grace);
                    tokio::pin!(deadline);
                    loop {
                        tokio::select! {
                            line = lines.next_line() => match line {
                                Ok(Some(line)) => {
                                    became_ready |= self.handle_line(&line, &signals).await;
                                }
                                Ok(None) | Err(_) => break,
                            },
                            () = &mut deadline => {
                                tracing::warn!("Server ignored the stop request, terminating");
                                force_terminate = true;
                                break;
                            }
                        }
                    }
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received, stopping server");
                    self.handle.stop();
                }
            }
        }

        let status = if force_terminate {
            process.graceful_terminate(TERMINATE_TIMEOUT).await?;
            None
        } else {
            // Stdout is closed; the process should be gone or going.
            match tokio::time::timeout(self.shutdown_grace, process.wait()).await {
                Ok(status) => Some(status?),
                Err(_) => {
                    tracing::warn!("Server still alive after stdout closed, terminating");
                    process.graceful_terminate(TERMINATE_TIMEOUT).await?;
                    None
                }
            }
        };

        // Exit path: wake the gate (readiness never reached counts as
        // disarm), interrupt sleeps, then join everything before the next
        // run may rearm.
        signals.mark_stopped();
        self.handle.detach_writer();
        let _ = writer.await;
        if let Some(task) = stderr_task {
            let _ = task.await;
        }
        if let Some(task) = scheduler {
            let _ = task.await;
        }

        self.state.transition(WrapperState::Exited);
        tracing::info!(status = ?status, "Server process exited");
        Ok(RunOutcome { became_ready })
    }

    /// Decode, record, and dispatch one console line.
    ///
    /// Returns whether the line was the ready line.
    async fn handle_line(&mut self, line: &str, signals: &RunSignals) -> bool {
        let event = self.decoder.decode(self.handle.next_event_id(), line);
        self.handle.record_event(&event);

        let ready = event.kind == EventKind::ServerReady;
        if ready {
            tracing::info!("Server is ready");
            signals.disarm();
        }

        self.registry.dispatch(&event).await;
        ready
    }
}

/// Relay queued commands to the server's stdin, newline-terminated.
async fn forward_commands(mut rx: mpsc::UnboundedReceiver<String>, mut stdin: ChildStdin) {
    while let Some(command) = rx.recv().await {
        let write = async {
            stdin.write_all(command.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        if let Err(e) = write.await {
            tracing::debug!(error = %e, "Server stdin closed, writer stopping");
            return;
        }
    }
}

/// Surface anything the server prints on stderr.
async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::warn!(%line, "Server stderr");
    }
}

/// Forward operator-typed console lines verbatim to the server.
///
/// The literal command `stop` (case-insensitive) additionally flags the
/// run as user-terminated. End of input ends the task quietly.
async fn forward_operator_input(handle: WrapperHandle) {
    display::print_status("Type 'stop' to stop the server");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().eq_ignore_ascii_case("stop") {
            handle.mark_user_stop();
        }
        handle.send_command(&line);
    }
}
