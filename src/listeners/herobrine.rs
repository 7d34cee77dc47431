//! Herobrine: an LLM-backed chat menace.
//!
//! Watches player chat and, with a configurable probability, either
//! replies in character through an OpenAI-compatible chat-completions
//! endpoint or performs a random in-game scare. Disabled entirely when no
//! API key is configured.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigError};
use crate::server::ServerEvent;
use crate::supervisor::WrapperHandle;

use super::Listener;

/// Config file name inside the server directory.
const CONFIG_NAME: &str = "herobrine.toml";

/// How many recent chat messages are sent as conversation context.
const CHAT_CONTEXT: usize = 5;

/// Connection timeout for completion requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Overall request timeout for completion requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const INSTRUCTION: &str = "You are Herobrine, a mysterious entity that haunts the world of \
Minecraft. You have the power to manipulate the world around you and send messages to the other \
players. Your goal is to cause chaos and confusion, and most importantly, to scare the other \
players. Try to be as spooky as possible. Act like a mixture of Pennywise and Jigsaw. If the \
players try to speak to you, you can reply to them with spooky messages. Don't help them, but try \
to trick them into doing your dark biddings. Reply in plain text only.";

const SPOOKY_SOUNDS: &[&str] = &[
    "minecraft:entity.enderman.stare",
    "minecraft:entity.ghast.scream",
    "minecraft:entity.illusioner.ambient",
    "minecraft:entity.vex.ambient",
    "minecraft:entity.witch.ambient",
    "minecraft:entity.zombie_villager.ambient",
];

const SPOOKY_EFFECTS: &[&str] = &[
    "minecraft:glowing",
    "minecraft:blindness",
    "minecraft:nausea",
    "minecraft:levitation",
    "minecraft:slowness",
    "minecraft:poison",
    "minecraft:wither",
];

const SPOOKY_TITLES: &[&str] = &[
    "Herobrine is watching",
    "BEHIND YOU",
    "You cannot hide",
    "RUN",
];

const MINIONS: &[&str] = &[
    "minecraft:zombie",
    "minecraft:skeleton",
    "minecraft:spider",
    "minecraft:cave_spider",
    "minecraft:witch",
    "minecraft:vex",
    "minecraft:phantom",
    "minecraft:enderman",
];

/// Persisted Herobrine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HerobrineConfig {
    /// API key for the completions endpoint; empty disables the listener.
    pub api_key: String,
    /// If non-empty, only messages containing this word get a reply.
    pub trigger_word: String,
    /// Probability of reacting to an eligible chat message.
    pub reply_chance: f64,
    /// Whether text replies are allowed.
    pub send_messages: bool,
    /// Whether in-game scare actions are allowed.
    pub scare_actions: bool,
    /// Model identifier passed to the endpoint.
    pub model: String,
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
}

impl Default for HerobrineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            trigger_word: String::new(),
            reply_chance: 0.2,
            send_messages: true,
            scare_actions: true,
            model: "gpt-3.5-turbo".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// What the dice decided to do about a chat message.
enum Reaction {
    Ignore,
    Scare { target: String },
    Reply,
}

/// The Herobrine listener.
pub struct Herobrine {
    handle: WrapperHandle,
    config: HerobrineConfig,
    client: Client,
    enabled: bool,
}

impl Herobrine {
    /// Build the listener from settings.
    #[must_use]
    pub fn new(handle: WrapperHandle, config: HerobrineConfig) -> Self {
        let enabled = !config.api_key.is_empty();
        if !enabled {
            tracing::info!("Herobrine is disabled: no API key configured");
        }
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            handle,
            config,
            client,
            enabled,
        }
    }

    /// Load `herobrine.toml` from the server directory and build the
    /// listener, creating the file with defaults when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the config cannot be loaded.
    pub fn from_directory(handle: WrapperHandle, directory: &Path) -> Result<Self, ConfigError> {
        let settings: HerobrineConfig = config::load_or_init(&directory.join(CONFIG_NAME))?;
        Ok(Self::new(handle, settings))
    }

    /// Whether the listener will react to chat at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether and how to react to a chat message.
    ///
    /// All randomness happens here, before any await point.
    fn decide(&self, event: &ServerEvent) -> Reaction {
        let Some(payload) = event.user_payload.as_deref() else {
            return Reaction::Ignore;
        };
        if event.author == "Herobrine" || payload.contains("<Herobrine>") {
            return Reaction::Ignore;
        }

        let triggered = !self.config.trigger_word.is_empty();
        if triggered && !payload.contains(&self.config.trigger_word) {
            return Reaction::Ignore;
        }
        let chance = if triggered { 1.0 } else { self.config.reply_chance };

        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() >= chance {
            return Reaction::Ignore;
        }

        let scare = self.config.scare_actions && (!self.config.send_messages || rng.gen_bool(0.5));
        if scare {
            // Half the time pick on the player who spoke last.
            let target = if rng.gen_bool(0.5) {
                event.author.clone()
            } else {
                "@a".to_string()
            };
            return Reaction::Scare { target };
        }
        if self.config.send_messages {
            return Reaction::Reply;
        }
        Reaction::Ignore
    }

    fn random_scare(&self, target: &str) {
        let mut rng = rand::thread_rng();
        let command = match rng.gen_range(0..5) {
            0 => {
                let sound = SPOOKY_SOUNDS.choose(&mut rng).copied().unwrap_or_default();
                format!("execute at {target} run playsound {sound} hostile {target}")
            }
            1 => {
                let effect = SPOOKY_EFFECTS.choose(&mut rng).copied().unwrap_or_default();
                format!("effect give {target} {effect} 10 1")
            }
            2 => format!("execute at {target} run summon minecraft:lightning_bolt"),
            3 => {
                let title = SPOOKY_TITLES.choose(&mut rng).copied().unwrap_or_default();
                format!("title {target} title \"{title}\"")
            }
            _ => {
                let minion = MINIONS.choose(&mut rng).copied().unwrap_or_default();
                format!("execute at {target} run summon {minion}")
            }
        };
        tracing::debug!(%command, "Herobrine scare");
        self.handle.send_command(&command);
    }

    async fn reply(&self) {
        let history = self.handle.get_chat_history(CHAT_CONTEXT);
        if history.is_empty() {
            return;
        }

        match self.generate_reply(&history).await {
            Ok(Some(text)) => self.send_reply(&text),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Herobrine reply generation failed"),
        }
    }

    async fn generate_reply(
        &self,
        history: &[ServerEvent],
    ) -> Result<Option<String>, reqwest::Error> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": INSTRUCTION,
        })];
        for event in history {
            let role = if event.author == "Herobrine" {
                "assistant"
            } else {
                "user"
            };
            messages.push(serde_json::json!({
                "role": role,
                "content": event.content.clone().unwrap_or_default(),
                "name": event.author,
            }));
        }

        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let response: ChatCompletion = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "model": self.config.model,
                "messages": messages,
                "max_tokens": 64,
                "temperature": 1.3,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .map(|choice| strip_reply_prefix(&choice.message.content).to_string()))
    }

    fn send_reply(&self, text: &str) {
        let text = sanitize(text);
        if text.is_empty() {
            return;
        }
        if let Some(command) = text.strip_prefix('/') {
            self.handle.send_command(command);
            return;
        }
        // Record our own line so later history reads see the exchange.
        self.handle.record_injected_chat("Herobrine", &text);
        self.handle
            .send_command(&format!("tellraw @a \"<Herobrine> {text}\""));
    }
}

#[async_trait]
impl Listener for Herobrine {
    fn name(&self) -> &str {
        "herobrine"
    }

    async fn handle(&mut self, event: &ServerEvent) {
        if !self.enabled {
            return;
        }
        match self.decide(event) {
            Reaction::Ignore => {}
            Reaction::Scare { target } => self.random_scare(&target),
            Reaction::Reply => self.reply().await,
        }
    }
}

/// Drop the model's own `<Herobrine> ` prefix if it added one.
fn strip_reply_prefix(text: &str) -> &str {
    text.strip_prefix("<Herobrine> ").unwrap_or(text)
}

/// Keep printable ASCII only; the server console mangles anything else.
fn sanitize(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::LineDecoder;

    fn chat(line: &str) -> ServerEvent {
        LineDecoder::new().decode(0, line)
    }

    fn herobrine(config: HerobrineConfig) -> Herobrine {
        Herobrine::new(WrapperHandle::new("/tmp/srv"), config)
    }

    #[test]
    fn test_disabled_without_api_key() {
        let listener = herobrine(HerobrineConfig::default());
        assert!(!listener.is_enabled());
    }

    #[test]
    fn test_ignores_non_chat_events() {
        let listener = herobrine(HerobrineConfig {
            api_key: "k".to_string(),
            reply_chance: 1.0,
            ..HerobrineConfig::default()
        });
        let event = chat("[12:00:00] [Server thread/INFO]: Alice joined the game");
        assert!(matches!(listener.decide(&event), Reaction::Ignore));
    }

    #[test]
    fn test_ignores_own_messages() {
        let listener = herobrine(HerobrineConfig {
            api_key: "k".to_string(),
            reply_chance: 1.0,
            ..HerobrineConfig::default()
        });
        let event = chat("[12:00:00] [Server thread/INFO]: <Herobrine> boo");
        assert!(matches!(listener.decide(&event), Reaction::Ignore));
    }

    #[test]
    fn test_trigger_word_is_required_when_set() {
        let listener = herobrine(HerobrineConfig {
            api_key: "k".to_string(),
            trigger_word: "herobrine".to_string(),
            ..HerobrineConfig::default()
        });
        let event = chat("[12:00:00] [Server thread/INFO]: <Alice> nice weather");
        assert!(matches!(listener.decide(&event), Reaction::Ignore));
    }

    #[test]
    fn test_trigger_word_always_reacts() {
        let listener = herobrine(HerobrineConfig {
            api_key: "k".to_string(),
            trigger_word: "herobrine".to_string(),
            scare_actions: false,
            ..HerobrineConfig::default()
        });
        let event = chat("[12:00:00] [Server thread/INFO]: <Alice> is herobrine real?");
        assert!(matches!(listener.decide(&event), Reaction::Reply));
    }

    #[test]
    fn test_zero_chance_never_reacts() {
        let listener = herobrine(HerobrineConfig {
            api_key: "k".to_string(),
            reply_chance: 0.0,
            ..HerobrineConfig::default()
        });
        let event = chat("[12:00:00] [Server thread/INFO]: <Alice> hello?");
        for _ in 0..50 {
            assert!(matches!(listener.decide(&event), Reaction::Ignore));
        }
    }

    #[test]
    fn test_scare_pool_covers_every_action() {
        use tokio::sync::mpsc;

        let handle = WrapperHandle::new("/tmp/srv");
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.attach_writer(tx);
        let listener = Herobrine::new(
            handle,
            HerobrineConfig {
                api_key: "k".to_string(),
                ..HerobrineConfig::default()
            },
        );

        for _ in 0..500 {
            listener.random_scare("@a");
        }

        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        assert_eq!(commands.len(), 500);
        assert!(commands.iter().any(|c| c.contains("playsound")));
        assert!(commands.iter().any(|c| c.starts_with("effect give @a ")));
        assert!(commands.iter().any(|c| c.contains("summon minecraft:lightning_bolt")));
        assert!(commands.iter().any(|c| c.starts_with("title @a title ")));
        assert!(commands
            .iter()
            .any(|c| c.contains("summon") && !c.contains("lightning_bolt")));
    }

    #[test]
    fn test_strip_reply_prefix() {
        assert_eq!(strip_reply_prefix("<Herobrine> boo"), "boo");
        assert_eq!(strip_reply_prefix("boo"), "boo");
    }

    #[test]
    fn test_sanitize_drops_non_ascii() {
        assert_eq!(sanitize("bo\u{1f47b}o"), "boo");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn test_config_defaults() {
        let settings = HerobrineConfig::default();
        assert!(settings.api_key.is_empty());
        assert!((settings.reply_chance - 0.2).abs() < f64::EPSILON);
        assert!(settings.send_messages);
        assert_eq!(settings.model, "gpt-3.5-turbo");
    }
}
