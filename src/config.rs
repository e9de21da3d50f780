//! Client configuration: TOML file, then environment, then CLI flags.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::frame::TrailingFramePolicy;
use crate::i18n::Language;
use crate::session::ChatMode;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_TONE: &str = "balanced";

/// Tones the board backend understands. Others are passed through and the
/// backend falls back to `balanced`.
pub const KNOWN_TONES: &[&str] = &["formal", "balanced", "casual", "concise", "detailed"];

/// Per-mode idle timeouts in seconds. `0` waits forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub chat_secs: u64,
    pub debate_secs: u64,
    pub board_secs: u64,
    pub search_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            chat_secs: 60,
            debate_secs: 120,
            board_secs: 180,
            search_secs: 60,
        }
    }
}

impl TimeoutConfig {
    /// Longest wait for the response head or for the next body chunk.
    pub fn idle_timeout(&self, mode: ChatMode) -> Option<Duration> {
        let secs = match mode {
            ChatMode::Chat => self.chat_secs,
            ChatMode::Debate => self.debate_secs,
            ChatMode::Board => self.board_secs,
            ChatMode::Search => self.search_secs,
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub backend_url: String,
    pub language: Language,
    pub default_model: String,
    pub default_tone: String,
    pub trailing_frame: TrailingFramePolicy,
    pub timeouts: TimeoutConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            language: Language::default(),
            default_model: DEFAULT_MODEL.to_string(),
            default_tone: DEFAULT_TONE.to_string(),
            trailing_frame: TrailingFramePolicy::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, StreamError> {
        let cfg: ClientConfig =
            toml::from_str(s).map_err(|e| StreamError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, StreamError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StreamError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Apply `BACKEND_URL` and `LANGUAGE` from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env`](Self::with_env) with an injectable lookup.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("BACKEND_URL").filter(|v| !v.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(lang) = lookup("LANGUAGE").filter(|v| !v.trim().is_empty()) {
            self.language = Language::from_env_value(&lang);
        }
        self
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        let url = reqwest::Url::parse(&self.backend_url)
            .map_err(|e| StreamError::Config(format!("backend_url {:?}: {e}", self.backend_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StreamError::Config(format!(
                "backend_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.default_model.trim().is_empty() {
            return Err(StreamError::Config("default_model must not be empty".into()));
        }
        Ok(())
    }
}
