use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::backoff::Backoff;
use crate::poller::PollSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Added to the poll timeout to get the HTTP request timeout
    #[serde(default = "default_request_margin_secs")]
    pub request_margin_secs: u64,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_initial_secs")]
    pub initial_secs: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub max_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_secs: default_backoff_initial_secs(),
            max_secs: default_backoff_max_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_broadcast_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_broadcast_text")]
    pub text: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_broadcast_interval_secs(),
            text: default_broadcast_text(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_request_margin_secs() -> u64 {
    10
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_backoff_initial_secs() -> u64 {
    1
}

fn default_backoff_max_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_broadcast_interval_secs() -> u64 {
    10
}

fn default_broadcast_text() -> String {
    "Broadcasted message".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.telegram.bot_token.trim().is_empty(),
            "telegram.bot_token must not be empty"
        );
        ensure!(
            self.telegram.request_margin_secs >= 1,
            "telegram.request_margin_secs must be at least 1 so empty polls return before the request times out"
        );
        ensure!(
            self.backoff.max_secs >= self.backoff.initial_secs,
            "backoff.max_secs ({}) is below backoff.initial_secs ({})",
            self.backoff.max_secs,
            self.backoff.initial_secs
        );
        ensure!(
            self.broadcast.interval_secs >= 1,
            "broadcast.interval_secs must be at least 1"
        );
        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            timeout: Duration::from_secs(self.telegram.poll_timeout_secs),
            request_margin: Duration::from_secs(self.telegram.request_margin_secs),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.telegram.send_timeout_secs)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs(self.backoff.initial_secs),
            Duration::from_secs(self.backoff.max_secs),
        )
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs(self.broadcast.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [telegram]
            bot_token = "123:abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");
        assert_eq!(config.poll_settings().timeout, Duration::from_secs(30));
        assert_eq!(
            config.poll_settings().request_timeout(),
            Duration::from_secs(40)
        );
        assert_eq!(config.backoff().current(), Duration::from_secs(1));
        assert!(config.broadcast.enabled);
        assert_eq!(config.broadcast_interval(), Duration::from_secs(10));
        assert_eq!(config.broadcast.text, "Broadcasted message");
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse(
            r#"
            [telegram]
            bot_token = "t"
            poll_timeout_secs = 50
            request_margin_secs = 5

            [backoff]
            max_secs = 8

            [broadcast]
            enabled = false
            text = "Olá a todos"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.poll_settings().request_timeout(),
            Duration::from_secs(55)
        );
        assert_eq!(config.backoff.initial_secs, 1);
        assert_eq!(config.backoff.max_secs, 8);
        assert!(!config.broadcast.enabled);
        assert_eq!(config.broadcast.text, "Olá a todos");
    }

    #[test]
    fn test_missing_token_rejected() {
        assert!(Config::parse("[backoff]\nmax_secs = 5\n").is_err());
        assert!(Config::parse("[telegram]\nbot_token = \"  \"\n").is_err());
    }

    #[test]
    fn test_zero_margin_rejected() {
        let err = Config::parse(
            r#"
            [telegram]
            bot_token = "t"
            request_margin_secs = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("request_margin_secs"));
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let result = Config::parse(
            r#"
            [telegram]
            bot_token = "t"

            [backoff]
            initial_secs = 10
            max_secs = 2
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/pollbot.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
