//! Decoded server console events.

/// Default author assigned to lines that did not come from a player.
pub const SERVER_AUTHOR: &str = "server";

/// Classification of a decoded console line.
///
/// Assigned by the decoder in a fixed priority order; `Other` covers every
/// line the wrapper has no special handling for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The server finished initializing and accepts commands.
    ServerReady,
    /// The server confirmed it is shutting down.
    ServerStopped,
    /// A player connected.
    PlayerJoined { player: String },
    /// A player disconnected.
    PlayerLeft { player: String },
    /// A player spoke in chat.
    PlayerChat,
    /// A player died; `victim` is the name captured from the death message.
    PlayerDeath { victim: String },
    /// Any other server output.
    Other,
}

/// One decoded line of server console output.
///
/// Immutable once constructed. `content` is the line with its
/// timestamp/thread prefix stripped; it is `None` when the prefix markers
/// were missing, in which case no classification was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// Monotonically increasing id, unique for the wrapper's lifetime.
    pub id: u64,
    /// Payload after the `]: ` marker, if the prefix could be stripped.
    pub content: Option<String>,
    /// The line exactly as received.
    pub raw_content: String,
    /// Player name for chat messages, otherwise [`SERVER_AUTHOR`].
    pub author: String,
    /// Chat message body; present only for player chat.
    pub user_payload: Option<String>,
    /// Classification result.
    pub kind: EventKind,
}

impl ServerEvent {
    /// Whether this event is a player chat message.
    #[must_use]
    pub fn is_user_message(&self) -> bool {
        self.user_payload.is_some()
    }
}
