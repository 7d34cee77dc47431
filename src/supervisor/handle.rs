//! Shared handle onto the running wrapper.
//!
//! Listeners, the restart scheduler, and the stdin forwarder all hold a
//! [`WrapperHandle`] back-reference instead of owning the supervisor. The
//! handle outlives individual server runs: event ids and the history
//! buffers persist across restarts, while the command channel is swapped
//! per run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::history::BoundedHistory;
use crate::server::{EventKind, ServerEvent};

/// How many console events the wrapper retains.
pub const CONSOLE_HISTORY_CAPACITY: usize = 1000;

/// How many chat events the wrapper retains.
pub const CHAT_HISTORY_CAPACITY: usize = 100;

/// Cloneable handle used to issue commands and read recent events.
#[derive(Debug, Clone)]
pub struct WrapperHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    directory: PathBuf,
    /// Sender for the active run's stdin writer task, absent between runs.
    commands: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Cancelled once the operator asks for the server to stay down; a
    /// token rather than a flag so the run loop can be woken by it.
    user_stop: CancellationToken,
    next_id: AtomicU64,
    console: Mutex<BoundedHistory<ServerEvent>>,
    chat: Mutex<BoundedHistory<ServerEvent>>,
}

impl WrapperHandle {
    /// Create a handle for a wrapper rooted at `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                directory: directory.into(),
                commands: Mutex::new(None),
                user_stop: CancellationToken::new(),
                next_id: AtomicU64::new(0),
                console: Mutex::new(BoundedHistory::new(CONSOLE_HISTORY_CAPACITY)),
                chat: Mutex::new(BoundedHistory::new(CHAT_HISTORY_CAPACITY)),
            }),
        }
    }

    /// Send a command line to the server's stdin.
    ///
    /// Silent no-op when no server is writable; never fails.
    pub fn send_command(&self, command: &str) {
        let guard = lock(&self.inner.commands);
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(command.to_string()).is_err() {
                    tracing::debug!(command, "stdin writer gone, command dropped");
                }
            }
            None => tracing::debug!(command, "no server running, command dropped"),
        }
    }

    /// Request a user-initiated shutdown: suppresses auto-restart, then
    /// asks the server to stop.
    pub fn stop(&self) {
        self.mark_user_stop();
        self.send_command("stop");
    }

    /// Flag the current run as user-terminated without sending anything.
    pub fn mark_user_stop(&self) {
        self.inner.user_stop.cancel();
    }

    /// Whether the operator asked for the server to stay down.
    #[must_use]
    pub fn is_user_stop(&self) -> bool {
        self.inner.user_stop.is_cancelled()
    }

    /// Resolves once a user stop has been requested. Resolves immediately
    /// when the request already happened.
    pub(crate) async fn user_stop_requested(&self) {
        self.inner.user_stop.cancelled().await;
    }

    /// Directory the supervised server runs in.
    #[must_use]
    pub fn current_directory(&self) -> &Path {
        &self.inner.directory
    }

    /// The last `n` chat events, oldest first.
    #[must_use]
    pub fn get_chat_history(&self, n: usize) -> Vec<ServerEvent> {
        lock(&self.inner.chat).suffix(n)
    }

    /// The last `n` console events of any kind, oldest first.
    #[must_use]
    pub fn get_console_history(&self, n: usize) -> Vec<ServerEvent> {
        lock(&self.inner.console).suffix(n)
    }

    /// Next event id. Ids strictly increase for the handle's lifetime and
    /// are never reused, including across restarts.
    #[must_use]
    pub fn next_event_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Append a decoded event to the history buffers.
    pub fn record_event(&self, event: &ServerEvent) {
        lock(&self.inner.console).append(event.clone());
        if event.is_user_message() {
            lock(&self.inner.chat).append(event.clone());
        }
    }

    /// Record a chat message the wrapper itself injected, so that later
    /// history reads see it as part of the conversation.
    pub fn record_injected_chat(&self, author: &str, message: &str) -> ServerEvent {
        let content = format!("<{author}> {message}");
        let event = ServerEvent {
            id: self.next_event_id(),
            content: Some(content.clone()),
            raw_content: content,
            author: author.to_string(),
            user_payload: Some(message.to_string()),
            kind: EventKind::PlayerChat,
        };
        self.record_event(&event);
        event
    }

    /// Install the stdin writer channel for a new run.
    pub(crate) fn attach_writer(&self, tx: mpsc::UnboundedSender<String>) {
        *lock(&self.inner.commands) = Some(tx);
    }

    /// Remove the stdin writer channel when a run ends. Dropping the
    /// sender lets the writer task finish.
    pub(crate) fn detach_writer(&self) {
        *lock(&self.inner.commands) = None;
    }
}

/// Lock a mutex, recovering from poisoning.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_command_without_server_is_noop() {
        let handle = WrapperHandle::new("/tmp/srv");
        handle.send_command("say hi");
    }

    #[test]
    fn test_stop_marks_user_stop() {
        let handle = WrapperHandle::new("/tmp/srv");
        assert!(!handle.is_user_stop());
        handle.stop();
        assert!(handle.is_user_stop());
    }

    #[tokio::test]
    async fn test_user_stop_wakes_waiters() {
        let handle = WrapperHandle::new("/tmp/srv");
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.user_stop_requested().await })
        };
        tokio::task::yield_now().await;
        handle.mark_user_stop();
        waiter.await.unwrap();

        // And the already-stopped case resolves immediately.
        handle.user_stop_requested().await;
    }

    #[tokio::test]
    async fn test_commands_reach_attached_writer() {
        let handle = WrapperHandle::new("/tmp/srv");
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.attach_writer(tx);

        handle.send_command("say hello");
        assert_eq!(rx.recv().await.as_deref(), Some("say hello"));

        handle.detach_writer();
        handle.send_command("say dropped");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_event_ids_strictly_increase() {
        let handle = WrapperHandle::new("/tmp/srv");
        let a = handle.next_event_id();
        let b = handle.next_event_id();
        let c = handle.next_event_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_chat_history_only_holds_user_messages() {
        let handle = WrapperHandle::new("/tmp/srv");
        let decoder = crate::server::LineDecoder::new();

        let chat = decoder.decode(
            handle.next_event_id(),
            "[12:00:00] [Server thread/INFO]: <Alice> hello",
        );
        let plain = decoder.decode(
            handle.next_event_id(),
            "[12:00:00] [Server thread/INFO]: Preparing level",
        );
        handle.record_event(&chat);
        handle.record_event(&plain);

        let history = handle.get_chat_history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].author, "Alice");
        assert_eq!(handle.get_console_history(10).len(), 2);
    }

    #[test]
    fn test_injected_chat_is_visible_in_history() {
        let handle = WrapperHandle::new("/tmp/srv");
        let event = handle.record_injected_chat("Herobrine", "behind you");
        assert!(event.is_user_message());
        let history = handle.get_chat_history(5);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_payload.as_deref(), Some("behind you"));
    }
}
