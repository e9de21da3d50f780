//! Event dispatch into the current message's accumulators.

use tracing::{debug, info, warn};

use crate::event::{AgentRole, Event};
use crate::i18n::{inline_error, Language};
use crate::message::{AiMessage, Channel};

/// What routing did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Appended(Channel),
    Opened(Channel),
    /// The event named a role this message kind has no channel for.
    UnknownChannel,
    /// Nothing to accumulate (lifecycle markers, notices, refused reopen).
    Ignored,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamRouter {
    language: Language,
}

impl StreamRouter {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    fn resolve(&self, agent: &str, message: &AiMessage) -> Option<Channel> {
        AgentRole::from_wire(agent).and_then(|role| message.kind().channel_for(role))
    }

    pub fn route(&self, event: &Event, message: &mut AiMessage) -> RouteOutcome {
        match event {
            Event::Content { agent, text } => match self.resolve(agent, message) {
                Some(channel) => {
                    message.append(channel, text);
                    RouteOutcome::Appended(channel)
                }
                None => {
                    warn!(agent = agent.as_str(), kind = ?message.kind(), "ignoring content for unknown channel");
                    RouteOutcome::UnknownChannel
                }
            },
            Event::ChannelStart { agent } => match self.resolve(agent, message) {
                Some(channel) if message.set_open(channel, true) => {
                    debug!(%channel, "channel started");
                    RouteOutcome::Opened(channel)
                }
                Some(channel) => {
                    warn!(%channel, "refusing to reopen channel on a finished message");
                    RouteOutcome::Ignored
                }
                None => {
                    warn!(agent = agent.as_str(), kind = ?message.kind(), "ignoring start for unknown channel");
                    RouteOutcome::UnknownChannel
                }
            },
            Event::BackendError(detail) => {
                let channel = message.kind().fallback_channel();
                warn!(detail = detail.as_str(), "backend reported an error in-band");
                message.append(channel, &inline_error(self.language, detail));
                RouteOutcome::Appended(channel)
            }
            Event::Lifecycle(stage) => {
                debug!(?stage, "lifecycle frame");
                RouteOutcome::Ignored
            }
            Event::Notice(text) => {
                info!(notice = text.as_str(), "backend notice");
                RouteOutcome::Ignored
            }
        }
    }

    /// Single-channel mode: raw decoded text goes straight into the sole
    /// accumulator, no framing, no normalization beyond the channel's own.
    pub fn append_plain(&self, text: &str, message: &mut AiMessage) -> RouteOutcome {
        let channel = message.kind().fallback_channel();
        if message.append(channel, text) {
            RouteOutcome::Appended(channel)
        } else {
            RouteOutcome::UnknownChannel
        }
    }
}
