//! Localized strings used by the stream core and the terminal view.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ja,
    En,
}

impl Language {
    /// Loose parse used for the `LANGUAGE` environment variable.
    /// Anything that is not English falls back to Japanese.
    pub fn from_env_value(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en_us" | "english" => Language::En,
            _ => Language::Ja,
        }
    }

    pub fn text(self, key: Text) -> &'static str {
        match self {
            Language::Ja => ja(key),
            Language::En => en(key),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Ja => write!(f, "ja"),
            Language::En => write!(f, "en"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    ErrorPrefix,
    StatusThinking,
    StatusMultiAgent,
    StatusSearching,
    StatusDiscussing,
    AgentGeneral,
    AgentCritical,
    AgentPositive,
    AgentSynthesizer,
    AgentCeo,
    AgentCto,
    AgentCfo,
    AgentCoo,
    MultiAgentLabel,
    BoardTitle,
    User,
}

fn ja(key: Text) -> &'static str {
    match key {
        Text::ErrorPrefix => "❌ エラー: ",
        Text::StatusThinking => "AI が考え中...",
        Text::StatusMultiAgent => "マルチエージェント分析中...",
        Text::StatusSearching => "RAG検索中...",
        Text::StatusDiscussing => "AI役員会議で協議中...",
        Text::AgentGeneral => "アシスタント",
        Text::AgentCritical => "批判的思考",
        Text::AgentPositive => "創造的思考",
        Text::AgentSynthesizer => "統合分析",
        Text::AgentCeo => "CEO",
        Text::AgentCto => "CTO",
        Text::AgentCfo => "CFO",
        Text::AgentCoo => "COO",
        Text::MultiAgentLabel => "マルチエージェント分析",
        Text::BoardTitle => "AI役員会議",
        Text::User => "あなた",
    }
}

fn en(key: Text) -> &'static str {
    match key {
        Text::ErrorPrefix => "❌ Error: ",
        Text::StatusThinking => "AI is thinking...",
        Text::StatusMultiAgent => "Analyzing with multiple agents...",
        Text::StatusSearching => "Searching knowledge base...",
        Text::StatusDiscussing => "AI Board is discussing...",
        Text::AgentGeneral => "Assistant",
        Text::AgentCritical => "Critical Thinking",
        Text::AgentPositive => "Creative Thinking",
        Text::AgentSynthesizer => "Synthesis",
        Text::AgentCeo => "CEO",
        Text::AgentCto => "CTO",
        Text::AgentCfo => "CFO",
        Text::AgentCoo => "COO",
        Text::MultiAgentLabel => "Multi-Agent Analysis",
        Text::BoardTitle => "AI Board Meeting",
        Text::User => "You",
    }
}

/// The string appended inline when a request fails: a blank line, the
/// localized prefix, then the error message.
pub fn inline_error(lang: Language, message: &str) -> String {
    format!("\n\n{}{}", lang.text(Text::ErrorPrefix), message)
}
