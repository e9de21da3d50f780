//! Conversation lanes and the messages they own.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::i18n::{Language, Text};
use crate::message::{AiMessage, Message, MessageKind, UserMessage};

/// The fixed conversation lanes. Each maps to one backend session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    General,
    Guideline,
    Board,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::General, Lane::Guideline, Lane::Board];

    pub fn session_id(self) -> &'static str {
        match self {
            Lane::General => "default",
            Lane::Guideline => "guideline",
            Lane::Board => "idobata",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lane::General => write!(f, "general"),
            Lane::Guideline => write!(f, "guideline"),
            Lane::Board => write!(f, "board"),
        }
    }
}

/// How a submission is sent and how its answer is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Single agent, plain text stream.
    #[default]
    Chat,
    /// Critical vs. positive analysts, then a synthesis.
    Debate,
    /// CEO / CTO / CFO / COO planning meeting.
    Board,
    /// Retrieval-augmented search, plain text stream.
    Search,
}

impl ChatMode {
    pub fn lane(self) -> Lane {
        match self {
            ChatMode::Chat | ChatMode::Debate => Lane::General,
            ChatMode::Search => Lane::Guideline,
            ChatMode::Board => Lane::Board,
        }
    }

    pub fn message_kind(self) -> MessageKind {
        match self {
            ChatMode::Chat | ChatMode::Search => MessageKind::Plain,
            ChatMode::Debate => MessageKind::DualAgent,
            ChatMode::Board => MessageKind::Planning,
        }
    }

    /// Multiplexed modes carry newline-delimited JSON frames.
    pub fn is_multiplexed(self) -> bool {
        !matches!(self.message_kind(), MessageKind::Plain)
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            ChatMode::Chat => "/api/chat/stream",
            ChatMode::Debate => "/api/chat/multi-agent-stream",
            ChatMode::Board => "/api/chat/idobata-stream",
            ChatMode::Search => "/api/rag/stream",
        }
    }

    pub fn status_text(self, lang: Language) -> &'static str {
        lang.text(match self {
            ChatMode::Chat => Text::StatusThinking,
            ChatMode::Debate => Text::StatusMultiAgent,
            ChatMode::Search => Text::StatusSearching,
            ChatMode::Board => Text::StatusDiscussing,
        })
    }

    /// Label shown beside the user's message, if the mode has one.
    pub fn user_label(self, lang: Language) -> Option<&'static str> {
        match self {
            ChatMode::Debate => Some(lang.text(Text::MultiAgentLabel)),
            ChatMode::Board => Some(lang.text(Text::BoardTitle)),
            ChatMode::Chat | ChatMode::Search => None,
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatMode::Chat => write!(f, "chat"),
            ChatMode::Debate => write!(f, "debate"),
            ChatMode::Board => write!(f, "board"),
            ChatMode::Search => write!(f, "search"),
        }
    }
}

/// One conversation lane's in-memory history.
#[derive(Debug, Clone)]
pub struct Session {
    lane: Lane,
    messages: Vec<Message>,
}

impl Session {
    pub fn new(lane: Lane) -> Self {
        Self {
            lane,
            messages: Vec::new(),
        }
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn id(&self) -> &'static str {
        self.lane.session_id()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::User(UserMessage::new(content)));
    }

    /// Append a fresh AI message and hand back a handle to it.
    pub fn push_ai(&mut self, kind: MessageKind) -> &mut AiMessage {
        self.messages.push(Message::Ai(AiMessage::new(kind)));
        match self.messages.last_mut() {
            Some(Message::Ai(m)) => m,
            _ => unreachable!("just pushed an AI message"),
        }
    }

    pub fn last_ai(&self) -> Option<&AiMessage> {
        self.messages.last().and_then(Message::as_ai)
    }

    /// True while the lane's last message is still receiving.
    pub fn is_receiving(&self) -> bool {
        self.last_ai().is_some_and(AiMessage::any_open)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// The three lanes that exist for the whole life of the process.
#[derive(Debug, Clone)]
pub struct ChatLanes {
    general: Session,
    guideline: Session,
    board: Session,
}

impl Default for ChatLanes {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatLanes {
    pub fn new() -> Self {
        Self {
            general: Session::new(Lane::General),
            guideline: Session::new(Lane::Guideline),
            board: Session::new(Lane::Board),
        }
    }

    pub fn get(&self, lane: Lane) -> &Session {
        match lane {
            Lane::General => &self.general,
            Lane::Guideline => &self.guideline,
            Lane::Board => &self.board,
        }
    }

    pub fn get_mut(&mut self, lane: Lane) -> &mut Session {
        match lane {
            Lane::General => &mut self.general,
            Lane::Guideline => &mut self.guideline,
            Lane::Board => &mut self.board,
        }
    }

    /// Lanes whose last message is still receiving.
    pub fn receiving(&self) -> Vec<Lane> {
        Lane::ALL
            .into_iter()
            .filter(|l| self.get(*l).is_receiving())
            .collect()
    }
}
