//! Per-message accumulation state.
//!
//! ## Design
//! - Every AI message owns a fixed set of named [`Accumulator`]s chosen by its
//!   kind: one for plain answers, three for the critical/positive debate, four
//!   for the board meeting.
//! - An accumulator keeps the raw text exactly as received and a normalized
//!   view re-derived from the whole raw text after every append, so the view
//!   never depends on where fragment boundaries fell.
//! - `open` only goes `false → true` on creation or an explicit start event
//!   and only `true → false` when the message is finished. A finished
//!   message cannot be reopened.

use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::event::AgentRole;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

static THREE_OR_MORE_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static TWO_OR_MORE_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Text is shown as received.
    Verbatim,
    /// Runs of 3+ newlines become exactly one blank line.
    CollapseBlankLines,
    /// Runs of 2+ newlines become a single line break.
    CollapseLineBreaks,
}

impl Normalization {
    pub fn apply(self, raw: &str) -> String {
        match self {
            Normalization::Verbatim => raw.to_string(),
            Normalization::CollapseBlankLines => {
                THREE_OR_MORE_NEWLINES.replace_all(raw, "\n\n").into_owned()
            }
            Normalization::CollapseLineBreaks => {
                TWO_OR_MORE_NEWLINES.replace_all(raw, "\n").into_owned()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Accumulator {
    raw: String,
    normalized: String,
    normalization: Normalization,
    open: bool,
    activated: bool,
}

impl Accumulator {
    /// An accumulator that is receiving from the start.
    pub fn open(normalization: Normalization) -> Self {
        Self {
            raw: String::new(),
            normalized: String::new(),
            normalization,
            open: true,
            activated: true,
        }
    }

    /// An accumulator that stays hidden until a start event arrives.
    pub fn dormant(normalization: Normalization) -> Self {
        Self {
            open: false,
            activated: false,
            ..Self::open(normalization)
        }
    }

    pub fn append(&mut self, text: &str) {
        self.raw.push_str(text);
        self.normalized = self.normalization.apply(&self.raw);
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The normalized view for display.
    pub fn text(&self) -> &str {
        &self.normalized
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Shown once started, or as soon as anything has landed in it.
    pub fn is_visible(&self) -> bool {
        self.activated || !self.raw.is_empty()
    }

    fn start(&mut self) {
        self.activated = true;
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }
}

// ---------------------------------------------------------------------------
// Channels and message kinds
// ---------------------------------------------------------------------------

/// Named accumulator slot within one AI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Main,
    Critical,
    Positive,
    Synthesis,
    Planning,
    Tech,
    Business,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Channel::Main => "main",
            Channel::Critical => "critical",
            Channel::Positive => "positive",
            Channel::Synthesis => "synthesis",
            Channel::Planning => "planning",
            Channel::Tech => "tech",
            Channel::Business => "business",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Plain,
    DualAgent,
    Planning,
}

impl MessageKind {
    pub fn channels(self) -> &'static [Channel] {
        match self {
            MessageKind::Plain => &[Channel::Main],
            MessageKind::DualAgent => &[Channel::Critical, Channel::Positive, Channel::Synthesis],
            MessageKind::Planning => &[
                Channel::Planning,
                Channel::Tech,
                Channel::Business,
                Channel::Synthesis,
            ],
        }
    }

    /// Where in-band and transport errors are appended.
    pub fn fallback_channel(self) -> Channel {
        match self {
            MessageKind::Plain => Channel::Main,
            MessageKind::DualAgent | MessageKind::Planning => Channel::Synthesis,
        }
    }

    /// Map a wire role onto this kind's channels. Roles that belong to the
    /// other multiplexed kind resolve to `None`.
    pub fn channel_for(self, role: AgentRole) -> Option<Channel> {
        match (self, role) {
            (MessageKind::DualAgent, AgentRole::CriticalAnalyst) => Some(Channel::Critical),
            (MessageKind::DualAgent, AgentRole::PositiveAdvocate) => Some(Channel::Positive),
            (MessageKind::DualAgent, AgentRole::Synthesizer) => Some(Channel::Synthesis),
            (MessageKind::Planning, AgentRole::Ceo) => Some(Channel::Planning),
            (MessageKind::Planning, AgentRole::Cto) => Some(Channel::Tech),
            (MessageKind::Planning, AgentRole::Cfo) => Some(Channel::Business),
            (MessageKind::Planning, AgentRole::Coo) => Some(Channel::Synthesis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlainAiMessage {
    pub content: Accumulator,
}

#[derive(Debug, Clone)]
pub struct DualAgentAiMessage {
    pub critical: Accumulator,
    pub positive: Accumulator,
    /// Dormant until the backend announces the synthesis phase.
    pub synthesis: Accumulator,
}

#[derive(Debug, Clone)]
pub struct PlanningAiMessage {
    pub planning: Accumulator,
    pub tech: Accumulator,
    pub business: Accumulator,
    pub synthesis: Accumulator,
}

#[derive(Debug, Clone)]
pub enum AiBody {
    Plain(PlainAiMessage),
    DualAgent(DualAgentAiMessage),
    Planning(PlanningAiMessage),
}

impl AiBody {
    fn new(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Plain => AiBody::Plain(PlainAiMessage {
                content: Accumulator::open(Normalization::Verbatim),
            }),
            MessageKind::DualAgent => AiBody::DualAgent(DualAgentAiMessage {
                critical: Accumulator::open(Normalization::CollapseBlankLines),
                positive: Accumulator::open(Normalization::CollapseBlankLines),
                synthesis: Accumulator::dormant(Normalization::CollapseBlankLines),
            }),
            MessageKind::Planning => AiBody::Planning(PlanningAiMessage {
                planning: Accumulator::open(Normalization::CollapseLineBreaks),
                tech: Accumulator::open(Normalization::CollapseLineBreaks),
                business: Accumulator::open(Normalization::CollapseLineBreaks),
                synthesis: Accumulator::open(Normalization::CollapseLineBreaks),
            }),
        }
    }

    fn kind(&self) -> MessageKind {
        match self {
            AiBody::Plain(_) => MessageKind::Plain,
            AiBody::DualAgent(_) => MessageKind::DualAgent,
            AiBody::Planning(_) => MessageKind::Planning,
        }
    }

    fn get(&self, channel: Channel) -> Option<&Accumulator> {
        match (self, channel) {
            (AiBody::Plain(m), Channel::Main) => Some(&m.content),
            (AiBody::DualAgent(m), Channel::Critical) => Some(&m.critical),
            (AiBody::DualAgent(m), Channel::Positive) => Some(&m.positive),
            (AiBody::DualAgent(m), Channel::Synthesis) => Some(&m.synthesis),
            (AiBody::Planning(m), Channel::Planning) => Some(&m.planning),
            (AiBody::Planning(m), Channel::Tech) => Some(&m.tech),
            (AiBody::Planning(m), Channel::Business) => Some(&m.business),
            (AiBody::Planning(m), Channel::Synthesis) => Some(&m.synthesis),
            _ => None,
        }
    }

    fn get_mut(&mut self, channel: Channel) -> Option<&mut Accumulator> {
        match (self, channel) {
            (AiBody::Plain(m), Channel::Main) => Some(&mut m.content),
            (AiBody::DualAgent(m), Channel::Critical) => Some(&mut m.critical),
            (AiBody::DualAgent(m), Channel::Positive) => Some(&mut m.positive),
            (AiBody::DualAgent(m), Channel::Synthesis) => Some(&mut m.synthesis),
            (AiBody::Planning(m), Channel::Planning) => Some(&mut m.planning),
            (AiBody::Planning(m), Channel::Tech) => Some(&mut m.tech),
            (AiBody::Planning(m), Channel::Business) => Some(&mut m.business),
            (AiBody::Planning(m), Channel::Synthesis) => Some(&mut m.synthesis),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UserMessage {
    content: String,
    created_at_ms: u64,
}

impl UserMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            created_at_ms: now_ms(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }
}

#[derive(Debug, Clone)]
pub struct AiMessage {
    body: AiBody,
    created_at_ms: u64,
    finished: bool,
}

impl AiMessage {
    /// A fresh message with every default-open channel open.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            body: AiBody::new(kind),
            created_at_ms: now_ms(),
            finished: false,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    pub fn body(&self) -> &AiBody {
        &self.body
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn accumulator(&self, channel: Channel) -> Option<&Accumulator> {
        self.body.get(channel)
    }

    /// Normalized text of `channel`, or `""` if this kind has no such channel.
    pub fn text(&self, channel: Channel) -> &str {
        self.accumulator(channel).map(Accumulator::text).unwrap_or("")
    }

    /// Append to `channel`. Returns `false` when the channel does not exist
    /// for this message kind.
    pub fn append(&mut self, channel: Channel, text: &str) -> bool {
        match self.body.get_mut(channel) {
            Some(acc) => {
                acc.append(text);
                true
            }
            None => false,
        }
    }

    /// Open or close one channel. Returns whether the request was honored:
    /// unknown channels and reopening after [`finish`](Self::finish) are refused.
    pub fn set_open(&mut self, channel: Channel, open: bool) -> bool {
        if open && self.finished {
            return false;
        }
        match self.body.get_mut(channel) {
            Some(acc) if open => {
                acc.start();
                true
            }
            Some(acc) => {
                acc.close();
                true
            }
            None => false,
        }
    }

    pub fn any_open(&self) -> bool {
        self.kind()
            .channels()
            .iter()
            .filter_map(|c| self.body.get(*c))
            .any(Accumulator::is_open)
    }

    /// Close every channel for good.
    pub fn finish(&mut self) {
        for channel in self.kind().channels() {
            if let Some(acc) = self.body.get_mut(*channel) {
                acc.close();
            }
        }
        self.finished = true;
    }

    pub fn snapshot(&self) -> MessageSnapshot<'_> {
        let channels = self
            .kind()
            .channels()
            .iter()
            .filter_map(|c| {
                self.body.get(*c).map(|acc| ChannelView {
                    channel: *c,
                    text: acc.text(),
                    open: acc.is_open(),
                    visible: acc.is_visible(),
                })
            })
            .collect();
        MessageSnapshot {
            kind: self.kind(),
            created_at_ms: self.created_at_ms,
            finished: self.finished,
            channels,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    User(UserMessage),
    Ai(AiMessage),
}

impl Message {
    pub fn as_ai(&self) -> Option<&AiMessage> {
        match self {
            Message::Ai(m) => Some(m),
            Message::User(_) => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User(_))
    }
}

// ---------------------------------------------------------------------------
// Read-only views
// ---------------------------------------------------------------------------

/// Borrowed, read-only view of one AI message for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSnapshot<'a> {
    pub kind: MessageKind,
    pub created_at_ms: u64,
    pub finished: bool,
    pub channels: Vec<ChannelView<'a>>,
}

impl MessageSnapshot<'_> {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelView<'_>> {
        self.channels.iter().find(|v| v.channel == channel)
    }

    pub fn any_open(&self) -> bool {
        self.channels.iter().any(|v| v.open)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelView<'a> {
    pub channel: Channel,
    pub text: &'a str,
    pub open: bool,
    pub visible: bool,
}
