//! Rendering boundary.
//!
//! The controller pushes read-only [`MessageSnapshot`]s through a
//! [`RenderProjector`] after every processed chunk and once more when the
//! request settles. [`TerminalProjector`] turns those snapshots into an
//! incremental colored transcript.

use std::collections::HashMap;
use std::io::Write;

use colored::*;

use crate::controller::StreamPhase;
use crate::i18n::{Language, Text};
use crate::message::{Channel, MessageKind, MessageSnapshot};
use crate::session::ChatMode;

pub trait RenderProjector: Send {
    /// A new AI message is about to stream for `mode`.
    fn begin(&mut self, _mode: ChatMode) {}

    fn phase_changed(&mut self, _phase: StreamPhase) {}

    fn render(&mut self, snapshot: &MessageSnapshot<'_>);
}

/// Renders nothing. Used when only the final state matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProjector;

impl RenderProjector for SilentProjector {
    fn render(&mut self, _snapshot: &MessageSnapshot<'_>) {}
}

pub fn channel_title(channel: Channel, kind: MessageKind, lang: Language) -> &'static str {
    let key = match (channel, kind) {
        (Channel::Main, _) => Text::AgentGeneral,
        (Channel::Critical, _) => Text::AgentCritical,
        (Channel::Positive, _) => Text::AgentPositive,
        (Channel::Synthesis, MessageKind::Planning) => Text::AgentCoo,
        (Channel::Synthesis, _) => Text::AgentSynthesizer,
        (Channel::Planning, _) => Text::AgentCeo,
        (Channel::Tech, _) => Text::AgentCto,
        (Channel::Business, _) => Text::AgentCfo,
    };
    lang.text(key)
}

fn paint_title(channel: Channel, title: &str) -> ColoredString {
    let label = format!("[{title}]");
    match channel {
        Channel::Main => label.bright_green().bold(),
        Channel::Critical => label.bright_red().bold(),
        Channel::Positive => label.bright_yellow().bold(),
        Channel::Synthesis => label.bright_magenta().bold(),
        Channel::Planning => label.bright_cyan().bold(),
        Channel::Tech => label.bright_blue().bold(),
        Channel::Business => label.bright_white().bold(),
    }
}

/// Incremental transcript writer.
///
/// Normalized channel text only ever grows at the end, so each render prints
/// just the suffix not yet written. A channel title is printed whenever the
/// output switches channel. The completion footer is written exactly once,
/// on the first snapshot that is finished with every channel closed.
pub struct TerminalProjector<W: Write + Send> {
    out: W,
    language: Language,
    printed: HashMap<Channel, usize>,
    current: Option<Channel>,
    footer_written: bool,
}

impl<W: Write + Send> TerminalProjector<W> {
    pub fn new(out: W, language: Language) -> Self {
        Self {
            out,
            language,
            printed: HashMap::new(),
            current: None,
            footer_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RenderProjector for TerminalProjector<W> {
    fn begin(&mut self, mode: ChatMode) {
        self.printed.clear();
        self.current = None;
        self.footer_written = false;
        let _ = writeln!(self.out, "{}", mode.status_text(self.language).dimmed());
    }

    fn render(&mut self, snapshot: &MessageSnapshot<'_>) {
        for view in snapshot.channels.iter().filter(|v| v.visible) {
            let printed = self.printed.get(&view.channel).copied().unwrap_or(0);
            if view.text.len() <= printed || !view.text.is_char_boundary(printed) {
                continue;
            }
            if self.current != Some(view.channel) && snapshot.kind != MessageKind::Plain {
                let title = channel_title(view.channel, snapshot.kind, self.language);
                let _ = write!(self.out, "\n{}\n", paint_title(view.channel, title));
            }
            let _ = write!(self.out, "{}", &view.text[printed..]);
            self.printed.insert(view.channel, view.text.len());
            self.current = Some(view.channel);
        }

        if snapshot.finished && !snapshot.any_open() && !self.footer_written {
            self.footer_written = true;
            let _ = writeln!(self.out, "\n{}", "=".repeat(50).bright_blue());
        }
        let _ = self.out.flush();
    }
}
