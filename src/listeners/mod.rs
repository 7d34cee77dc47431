//! Event listeners and the dispatch bus.
//!
//! Listeners receive every decoded console event, in registration order,
//! on the task that produced the event. The bus provides no isolation: a
//! panicking listener takes the dispatch (and the reader) down with it,
//! so listeners are expected to contain their own failures.

mod herobrine;
mod logger;
mod webhook;

pub use herobrine::{Herobrine, HerobrineConfig};
pub use logger::{ConsoleLogger, LogFilter};
pub use webhook::{WebhookConfig, WebhookNotifier};

use async_trait::async_trait;

use crate::server::ServerEvent;

/// An observer of decoded server events.
///
/// Implementations hold a [`crate::supervisor::WrapperHandle`]
/// back-reference when they need to issue commands or read chat history.
#[async_trait]
pub trait Listener: Send {
    /// Stable identity used for registration and removal.
    fn name(&self) -> &str;

    /// Handle one decoded event.
    async fn handle(&mut self, event: &ServerEvent);
}

/// Ordered collection of listeners with identity-keyed registration.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<Box<dyn Listener>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener at the end of the dispatch order.
    ///
    /// A listener whose name is already registered is dropped; the
    /// original keeps its position.
    pub fn register(&mut self, listener: Box<dyn Listener>) {
        if self.listeners.iter().any(|l| l.name() == listener.name()) {
            tracing::warn!(name = listener.name(), "Listener already registered");
            return;
        }
        tracing::debug!(name = listener.name(), "Listener registered");
        self.listeners.push(listener);
    }

    /// Remove a listener by name. Returns whether one was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.name() != name);
        before != self.listeners.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver one event to every listener, in registration order.
    pub async fn dispatch(&mut self, event: &ServerEvent) {
        for listener in &mut self.listeners {
            listener.handle(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::server::LineDecoder;

    struct Recording {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Listener for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&mut self, event: &ServerEvent) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.id));
        }
    }

    fn recording(name: &str, seen: &Arc<Mutex<Vec<String>>>) -> Box<dyn Listener> {
        Box::new(Recording {
            name: name.to_string(),
            seen: Arc::clone(seen),
        })
    }

    #[tokio::test]
    async fn test_dispatch_follows_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.register(recording("first", &seen));
        registry.register(recording("second", &seen));

        let event = LineDecoder::new().decode(7, "[12:00:00] [Server thread/INFO]: hi");
        registry.dispatch(&event).await;

        assert_eq!(*seen.lock().unwrap(), vec!["first:7", "second:7"]);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_ignored() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.register(recording("dup", &seen));
        registry.register(recording("dup", &seen));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_removes_by_name() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.register(recording("a", &seen));
        registry.register(recording("b", &seen));

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.len(), 1);

        let event = LineDecoder::new().decode(1, "[12:00:00] [Server thread/INFO]: hi");
        registry.dispatch(&event).await;
        assert_eq!(*seen.lock().unwrap(), vec!["b:1"]);
    }
}
