//! Filtering logger listener.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::display;
use crate::server::{EventKind, ServerEvent};

use super::Listener;

/// Which event classes a logging listener cares about.
///
/// Flags are checked in field order; the first match wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFilter {
    pub log_all: bool,
    pub log_player_messages: bool,
    pub log_player_joins: bool,
    pub log_player_leaves: bool,
    pub log_server_start: bool,
    pub log_server_stop: bool,
    pub log_death_messages: bool,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            log_all: false,
            log_player_messages: true,
            log_player_joins: true,
            log_player_leaves: true,
            log_server_start: true,
            log_server_stop: true,
            log_death_messages: true,
        }
    }
}

impl LogFilter {
    /// A filter that matches every event.
    #[must_use]
    pub fn all() -> Self {
        Self {
            log_all: true,
            ..Self::default()
        }
    }

    /// Whether `event` passes the filter.
    #[must_use]
    pub fn matches(&self, event: &ServerEvent) -> bool {
        if self.log_all {
            return true;
        }
        if self.log_player_messages && event.is_user_message() {
            return true;
        }
        if self.log_player_joins && matches!(event.kind, EventKind::PlayerJoined { .. }) {
            return true;
        }
        if self.log_player_leaves && matches!(event.kind, EventKind::PlayerLeft { .. }) {
            return true;
        }
        if self.log_server_start && event.kind == EventKind::ServerReady {
            return true;
        }
        if self.log_server_stop && event.kind == EventKind::ServerStopped {
            return true;
        }
        if self.log_death_messages && matches!(event.kind, EventKind::PlayerDeath { .. }) {
            return true;
        }
        false
    }
}

/// Console logger: filtered events get a colored tag, everything else is
/// passed through as the raw server line.
#[derive(Debug, Default)]
pub struct ConsoleLogger {
    filter: LogFilter,
}

impl ConsoleLogger {
    #[must_use]
    pub fn new(filter: LogFilter) -> Self {
        Self { filter }
    }
}

#[async_trait]
impl Listener for ConsoleLogger {
    fn name(&self) -> &str {
        "console"
    }

    async fn handle(&mut self, event: &ServerEvent) {
        if self.filter.matches(event) {
            display::print_event(event);
        } else {
            display::print_raw_line(&event.raw_content);
        }
    }
}
