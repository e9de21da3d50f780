use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{ClientConfig, KNOWN_TONES};
use crate::error::StreamError;
use crate::frame::TrailingFramePolicy;
use crate::i18n::Language;
use crate::session::ChatMode;

#[derive(Parser, Debug)]
#[command(name = "chat-lanes")]
#[command(version = "0.3.0")]
#[command(about = "Terminal client for streaming multi-agent chat backends")]
pub struct Args {
    /// Prompt to send. Without one, starts an interactive session on stdin.
    pub prompt: Option<String>,

    /// Chat mode: chat, debate, board or search
    #[arg(long, short, value_enum, default_value = "chat")]
    pub mode: ChatMode,

    /// Model name passed to the backend (defaults to the configured model)
    #[arg(long)]
    pub model: Option<String>,

    /// Board meeting tone (formal, balanced, casual, concise, detailed)
    #[arg(long)]
    pub tone: Option<String>,

    /// Display language for titles, status lines and error prefixes
    #[arg(long, value_enum)]
    pub lang: Option<Language>,

    /// TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config and BACKEND_URL)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Parse an unterminated last frame instead of discarding it
    #[arg(long)]
    pub flush_trailing_frame: bool,

    /// Print the final message as JSON instead of streaming it
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Config file (or defaults), then environment, then flags.
    pub fn resolve_config(&self) -> Result<ClientConfig, StreamError> {
        let base = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        let mut cfg = base.with_env();
        if let Some(url) = &self.backend_url {
            cfg.backend_url = url.clone();
        }
        if let Some(lang) = self.lang {
            cfg.language = lang;
        }
        if let Some(model) = &self.model {
            cfg.default_model = model.clone();
        }
        if let Some(tone) = &self.tone {
            cfg.default_tone = tone.clone();
        }
        if self.flush_trailing_frame {
            cfg.trailing_frame = TrailingFramePolicy::Flush;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn is_known_tone(tone: &str) -> bool {
    KNOWN_TONES.contains(&tone)
}

/// One line typed in interactive mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Prompt(String),
    SwitchMode(ChatMode),
    Clear,
    Quit,
    Empty,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return ReplCommand::Prompt(line.to_string());
        };
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("quit") | Some("exit"), None) => ReplCommand::Quit,
            (Some("clear"), None) => ReplCommand::Clear,
            (Some("mode"), Some(name)) => match ChatMode::from_str(name, true) {
                Ok(mode) => ReplCommand::SwitchMode(mode),
                Err(_) => ReplCommand::Invalid(format!("unknown mode: {name}")),
            },
            _ => ReplCommand::Invalid(format!("unknown command: /{rest}")),
        }
    }
}
