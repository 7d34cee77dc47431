//! Webhook notifier listener.
//!
//! Posts filtered events as JSON to a configured webhook URL. Delivery
//! failures are the notifier's own problem: after a few consecutive
//! failures it disables itself rather than stall every dispatch behind a
//! dead endpoint.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{self, ConfigError};
use crate::server::{EventKind, ServerEvent};

use super::logger::LogFilter;
use super::Listener;

/// Config file name inside the server directory.
const CONFIG_NAME: &str = "webhook.toml";

/// Consecutive delivery failures before the notifier turns itself off.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Connection timeout for webhook requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Overall request timeout for webhook requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Persisted webhook settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Target URL; empty disables the notifier.
    pub webhook_url: String,
    #[serde(flatten)]
    pub filter: LogFilter,
}

/// Errors constructing the webhook notifier.
#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error("invalid webhook URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Listener that forwards filtered events to a webhook endpoint.
pub struct WebhookNotifier {
    url: Url,
    filter: LogFilter,
    client: Client,
    consecutive_failures: u32,
    disabled: bool,
}

impl WebhookNotifier {
    /// Build a notifier from settings, validating the URL up front.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidUrl` when the configured URL does
    /// not parse.
    pub fn new(settings: &WebhookConfig) -> Result<Self, WebhookError> {
        let url = Url::parse(&settings.webhook_url)?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Ok(Self {
            url,
            filter: settings.filter,
            client,
            consecutive_failures: 0,
            disabled: false,
        })
    }

    /// Load `webhook.toml` from the server directory and build the
    /// notifier, creating the file with defaults when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the config cannot be loaded or the URL is
    /// invalid.
    pub fn from_directory(directory: &Path) -> Result<Self, WebhookError> {
        let settings: WebhookConfig = config::load_or_init(&directory.join(CONFIG_NAME))?;
        Self::new(&settings)
    }

    /// Whether the notifier gave up after repeated failures.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// The text posted for an event, if any.
    fn message_for(event: &ServerEvent) -> Option<String> {
        match event.kind {
            EventKind::ServerReady => Some("Server has finished starting!".to_string()),
            EventKind::ServerStopped => Some("Server has stopped!".to_string()),
            _ => event.content.clone(),
        }
    }

    async fn deliver(&mut self, text: &str) {
        let result = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(_) => self.record_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Webhook delivery failed");
                self.record_failure();
            }
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            self.disabled = true;
            tracing::warn!(
                failures = self.consecutive_failures,
                "Webhook disabled after repeated delivery failures"
            );
        }
    }
}

#[async_trait]
impl Listener for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn handle(&mut self, event: &ServerEvent) {
        if self.disabled || !self.filter.matches(event) {
            return;
        }
        if let Some(text) = Self::message_for(event) {
            self.deliver(&text).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::LineDecoder;

    fn notifier() -> WebhookNotifier {
        WebhookNotifier::new(&WebhookConfig {
            webhook_url: "https://example.invalid/hook".to_string(),
            filter: LogFilter::default(),
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = WebhookNotifier::new(&WebhookConfig {
            webhook_url: "not a url".to_string(),
            filter: LogFilter::default(),
        });
        assert!(matches!(err, Err(WebhookError::InvalidUrl(_))));
    }

    #[test]
    fn test_disables_after_failure_budget() {
        let mut notifier = notifier();
        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            assert!(!notifier.is_disabled());
            notifier.record_failure();
        }
        assert!(notifier.is_disabled());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut notifier = notifier();
        notifier.record_failure();
        notifier.record_failure();
        notifier.record_success();
        notifier.record_failure();
        assert!(!notifier.is_disabled());
    }

    #[test]
    fn test_ready_and_stop_messages_are_rewritten() {
        let decoder = LineDecoder::new();
        let ready = decoder.decode(
            0,
            r#"[12:00:00] [Server thread/INFO]: Done (1.2s)! For help, type "help""#,
        );
        assert_eq!(
            WebhookNotifier::message_for(&ready).as_deref(),
            Some("Server has finished starting!")
        );

        let stopped = decoder.decode(1, "[12:00:00] [Server thread/INFO]: Stopping server");
        assert_eq!(
            WebhookNotifier::message_for(&stopped).as_deref(),
            Some("Server has stopped!")
        );

        let chat = decoder.decode(2, "[12:00:00] [Server thread/INFO]: <Alice> hi");
        assert_eq!(WebhookNotifier::message_for(&chat).as_deref(), Some("<Alice> hi"));
    }

    #[test]
    fn test_config_defaults() {
        let settings = WebhookConfig::default();
        assert!(settings.webhook_url.is_empty());
        assert!(!settings.filter.log_all);
    }
}
