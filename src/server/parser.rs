//! Line decoder for server console output.
//!
//! Maps one raw console line to a [`ServerEvent`]. Decoding never fails:
//! a line whose timestamp/thread prefix cannot be stripped degrades to an
//! event with `content == None`, and a line that matches no known shape
//! becomes a generic server event.

use regex::Regex;

use super::event::{EventKind, ServerEvent, SERVER_AUTHOR};

/// Marker the server injects in front of unsigned chat messages.
const NOT_SECURE_MARKER: &str = "[Not Secure]";

/// The exact line the server prints when shutting down.
const STOP_CONFIRMATION: &str = "Stopping server";

/// Death-message shapes, tried in order; the first capture is the victim.
const DEATH_PATTERNS: &[&str] = &[
    r"^(\w+) died",
    r"^(\w+) tried to swim in lava",
    r"^(\w+) was pricked to death",
    r"^(\w+) walked into a cactus whilst trying to escape (\w+)",
    r"^(\w+) drowned",
    r"^(\w+) drowned whilst trying to escape (\w+)",
    r"^(\w+) was shot by arrow",
    r"^(\w+) was shot by (\w+)",
    r"^(\w+) was shot off a ladder by (\w+)",
    r"^(\w+) was shot off some vines by (\w+)",
    r"^(\w+) was shot off some twisting vines by (\w+)",
    r"^(\w+) was blown up by (\w+)",
    r"^(\w+) was blown up by (\w+) using (\w+)",
    r"^(\w+) was killed by magic",
    r"^(\w+) was killed by (\w+) using magic",
    r"^(\w+) was killed by (\w+)",
    r"^(\w+) was killed by (\w+) using (\w+)",
    r"^(\w+) hit the ground too hard",
    r"^(\w+) fell from a high place",
];

/// Decoder with the classification patterns compiled once.
#[derive(Debug)]
pub struct LineDecoder {
    ready: Regex,
    joined: Regex,
    left: Regex,
    deaths: Vec<Regex>,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// Compile the decoder patterns.
    ///
    /// # Panics
    ///
    /// Panics if a built-in pattern fails to compile, which would be a bug.
    #[must_use]
    pub fn new() -> Self {
        let compile = |p: &str| Regex::new(p).unwrap_or_else(|e| panic!("bad pattern {p}: {e}"));
        Self {
            ready: compile(r#"^Done \(\d+\.\d+s\)! For help, type "help""#),
            joined: compile(r"^(\w+) joined the game"),
            left: compile(r"^(\w+) left the game"),
            deaths: DEATH_PATTERNS.iter().map(|&p| compile(p)).collect(),
        }
    }

    /// Decode one raw console line into an event with the given id.
    #[must_use]
    pub fn decode(&self, id: u64, raw_line: &str) -> ServerEvent {
        let normalized = strip_not_secure(raw_line);
        let content = strip_log_prefix(&normalized);

        let (kind, author, user_payload) = match content.as_deref() {
            Some(content) => self.classify(content),
            None => (EventKind::Other, SERVER_AUTHOR.to_string(), None),
        };

        ServerEvent {
            id,
            content,
            raw_content: raw_line.to_string(),
            author,
            user_payload,
            kind,
        }
    }

    /// Classify stripped content, first match wins.
    fn classify(&self, content: &str) -> (EventKind, String, Option<String>) {
        let server = || SERVER_AUTHOR.to_string();

        if self.ready.is_match(content) {
            return (EventKind::ServerReady, server(), None);
        }
        if content == STOP_CONFIRMATION {
            return (EventKind::ServerStopped, server(), None);
        }
        if let Some(caps) = self.joined.captures(content) {
            let player = caps[1].to_string();
            return (EventKind::PlayerJoined { player }, server(), None);
        }
        if let Some(caps) = self.left.captures(content) {
            let player = caps[1].to_string();
            return (EventKind::PlayerLeft { player }, server(), None);
        }
        if let Some((author, payload)) = parse_chat(content) {
            return (EventKind::PlayerChat, author, Some(payload));
        }
        for pattern in &self.deaths {
            if let Some(caps) = pattern.captures(content) {
                let victim = caps[1].to_string();
                return (EventKind::PlayerDeath { victim }, server(), None);
            }
        }
        (EventKind::Other, server(), None)
    }
}

/// Remove the `[Not Secure]` marker the first time it appears.
fn strip_not_secure(line: &str) -> String {
    let with_space = format!("{NOT_SECURE_MARKER} ");
    if line.contains(&with_space) {
        line.replacen(&with_space, "", 1)
    } else {
        line.replacen(NOT_SECURE_MARKER, "", 1)
    }
}

/// Strip the `[time] [thread/LEVEL]: ` prefix, returning the payload.
///
/// Finds the first `"] "`, then the next `"]: "` after it; the payload
/// begins right after the second marker. Returns `None` when either marker
/// is missing.
fn strip_log_prefix(line: &str) -> Option<String> {
    let first = line.find("] ")?;
    let second = line[first..].find("]: ")? + first;
    Some(line[second + 3..].to_string())
}

/// Parse a `<name> message` chat line into author and payload.
fn parse_chat(content: &str) -> Option<(String, String)> {
    if !content.starts_with('<') {
        return None;
    }
    let close = content.find('>')?;
    let author = content[1..close].to_string();
    // Skip the bracket plus the one-character separator.
    let payload = content.get(close + 2..).unwrap_or("").to_string();
    Some((author, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(line: &str) -> ServerEvent {
        LineDecoder::new().decode(0, line)
    }

    #[test]
    fn test_decode_server_ready() {
        let event = decode(r#"[12:00:00] [Server thread/INFO]: Done (1.234s)! For help, type "help""#);
        assert_eq!(event.kind, EventKind::ServerReady);
        assert_eq!(
            event.content.as_deref(),
            Some(r#"Done (1.234s)! For help, type "help""#)
        );
        assert_eq!(event.author, "server");
        assert!(!event.is_user_message());
    }

    #[test]
    fn test_decode_server_stopped() {
        let event = decode("[12:00:00] [Server thread/INFO]: Stopping server");
        assert_eq!(event.kind, EventKind::ServerStopped);
    }

    #[test]
    fn test_decode_player_joined() {
        let event = decode("[12:00:00] [Server thread/INFO]: Alice joined the game");
        assert_eq!(
            event.kind,
            EventKind::PlayerJoined {
                player: "Alice".to_string()
            }
        );
        assert!(!event.is_user_message());
    }

    #[test]
    fn test_decode_player_left() {
        let event = decode("[12:00:00] [Server thread/INFO]: Bob left the game");
        assert_eq!(
            event.kind,
            EventKind::PlayerLeft {
                player: "Bob".to_string()
            }
        );
    }

    #[test]
    fn test_decode_player_chat() {
        let event = decode("[12:00:00] [Server thread/INFO]: <Alice> hello");
        assert_eq!(event.kind, EventKind::PlayerChat);
        assert_eq!(event.author, "Alice");
        assert_eq!(event.user_payload.as_deref(), Some("hello"));
        assert!(event.is_user_message());
    }

    #[test]
    fn test_decode_chat_empty_message() {
        let event = decode("[12:00:00] [Server thread/INFO]: <Alice>");
        assert_eq!(event.kind, EventKind::PlayerChat);
        assert_eq!(event.user_payload.as_deref(), Some(""));
    }

    #[test]
    fn test_decode_not_secure_chat() {
        let event = decode("[12:00:00] [Server thread/INFO]: [Not Secure] <Alice> hi there");
        assert_eq!(event.kind, EventKind::PlayerChat);
        assert_eq!(event.author, "Alice");
        assert_eq!(event.user_payload.as_deref(), Some("hi there"));
    }

    #[test]
    fn test_decode_player_death_simple() {
        let event = decode("[12:00:00] [Server thread/INFO]: Bob died");
        assert_eq!(
            event.kind,
            EventKind::PlayerDeath {
                victim: "Bob".to_string()
            }
        );
    }

    #[test]
    fn test_decode_player_death_killed_by() {
        let event = decode("[12:00:00] [Server thread/INFO]: Bob was killed by Zombie");
        assert_eq!(
            event.kind,
            EventKind::PlayerDeath {
                victim: "Bob".to_string()
            }
        );
    }

    #[test]
    fn test_decode_missing_prefix() {
        let event = decode("garbage with no closing marker");
        assert_eq!(event.content, None);
        assert_eq!(event.raw_content, "garbage with no closing marker");
        assert_eq!(event.kind, EventKind::Other);
        assert_eq!(event.author, "server");
    }

    #[test]
    fn test_decode_first_marker_only() {
        let event = decode("[12:00:00] no second marker here");
        assert_eq!(event.content, None);
        assert_eq!(event.kind, EventKind::Other);
    }

    #[test]
    fn test_decode_generic_server_line() {
        let event = decode("[12:00:00] [Server thread/INFO]: Preparing spawn area: 85%");
        assert_eq!(event.kind, EventKind::Other);
        assert_eq!(event.content.as_deref(), Some("Preparing spawn area: 85%"));
    }

    #[test]
    fn test_quoted_ready_message_is_chat() {
        // The ready pattern is anchored, so a chat line quoting it still
        // classifies as chat.
        let event =
            decode(r#"[12:00:00] [Server thread/INFO]: <Eve> Done (1.2s)! For help, type "help""#);
        assert_eq!(event.kind, EventKind::PlayerChat);
    }

    #[test]
    fn test_raw_content_is_preserved_verbatim() {
        let raw = "[12:00:00] [Server thread/INFO]: [Not Secure] <Alice> hi";
        let event = decode(raw);
        assert_eq!(event.raw_content, raw);
    }
}
