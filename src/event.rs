//! Frame parsing: one newline-delimited JSON object → one typed [`Event`].
//!
//! Parsing never fails the stream. Blank frames vanish silently, malformed
//! frames are logged and dropped, and well-formed frames that carry nothing
//! routable (an `agent` without `content`, or the reverse) are dropped too.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Raw shape of a multiplexed frame. Every field is optional on the wire;
/// unknown fields (`is_final`, `seq`, `executor_id`, ...) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireFrame {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub frame_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Agent roles the backend names on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    CriticalAnalyst,
    PositiveAdvocate,
    Synthesizer,
    Ceo,
    Cto,
    Cfo,
    Coo,
}

impl AgentRole {
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "CriticalAnalyst" => Some(AgentRole::CriticalAnalyst),
            "PositiveAdvocate" => Some(AgentRole::PositiveAdvocate),
            "Synthesizer" => Some(AgentRole::Synthesizer),
            "CEO" => Some(AgentRole::Ceo),
            "CTO" => Some(AgentRole::Cto),
            "CFO" => Some(AgentRole::Cfo),
            "COO" => Some(AgentRole::Coo),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            AgentRole::CriticalAnalyst => "CriticalAnalyst",
            AgentRole::PositiveAdvocate => "PositiveAdvocate",
            AgentRole::Synthesizer => "Synthesizer",
            AgentRole::Ceo => "CEO",
            AgentRole::Cto => "CTO",
            AgentRole::Cfo => "CFO",
            AgentRole::Coo => "COO",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Progress markers that carry no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    AgentsComplete,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Flip a channel to open/visible without appending text.
    ChannelStart { agent: String },
    /// Append `text` to the channel named `agent`.
    Content { agent: String, text: String },
    Lifecycle(Lifecycle),
    /// Informational banner from the backend (`ui_message`).
    Notice(String),
    /// The backend reported a failure in-band. The stream itself continues.
    BackendError(String),
}

/// `type` values that open a channel, with the wire agent they open.
const CHANNEL_START_TYPES: &[(&str, &str)] = &[("synthesis_start", "Synthesizer")];

/// Parse one frame. Returns `None` for blank, malformed, or non-routable
/// frames; never panics and never returns an error.
pub fn parse_frame(frame: &str) -> Option<Event> {
    let trimmed = frame.trim();
    if trimmed.is_empty() {
        return None;
    }

    let wire: WireFrame = match serde_json::from_str(trimmed) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, len = trimmed.len(), "dropping malformed frame");
            return None;
        }
    };

    let event = classify(wire);
    if event.is_none() {
        debug!(frame = trimmed, "frame carries nothing routable");
    }
    event
}

fn classify(wire: WireFrame) -> Option<Event> {
    if let Some(kind) = wire.frame_type.as_deref() {
        if let Some((_, agent)) = CHANNEL_START_TYPES.iter().find(|(t, _)| *t == kind) {
            return Some(Event::ChannelStart {
                agent: (*agent).to_string(),
            });
        }
    }

    // Empty strings count as absent on both keys.
    let agent = wire.agent.filter(|a| !a.is_empty());
    let content = wire.content.filter(|c| !c.is_empty());
    if let (Some(agent), Some(text)) = (agent, content) {
        return Some(Event::Content { agent, text });
    }

    match wire.frame_type.as_deref() {
        Some("start") => Some(Event::Lifecycle(Lifecycle::Start)),
        Some("agents_complete") => Some(Event::Lifecycle(Lifecycle::AgentsComplete)),
        Some("complete") => Some(Event::Lifecycle(Lifecycle::Complete)),
        Some("ui_message") => wire.message.map(Event::Notice),
        Some("error") => Some(Event::BackendError(
            wire.message.unwrap_or_else(|| "unknown backend error".to_string()),
        )),
        _ => None,
    }
}
