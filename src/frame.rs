//! Newline framing for multiplexed streams.
//!
//! [`FrameBuffer`] accumulates decoded text across reads and hands back every
//! newline-terminated frame exactly once, in arrival order. Whatever follows
//! the last newline stays in the carry-over until a later read terminates it.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do with an unterminated carry-over when the body ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingFramePolicy {
    /// Drop it. The backend is trusted to terminate its last frame.
    #[default]
    Discard,
    /// Treat it as one final frame.
    Flush,
}

#[derive(Debug, Default)]
pub struct FrameBuffer {
    carry: String,
    frames_emitted: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the frames it completed.
    ///
    /// Frames are returned without their terminating `\n`. An empty line is
    /// still a frame (the parser discards it).
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.carry.push_str(chunk);
        let mut frames = Vec::new();
        while let Some(line_end) = self.carry.find('\n') {
            let frame = self.carry[..line_end].to_string();
            self.carry.drain(..=line_end);
            frames.push(frame);
        }
        self.frames_emitted += frames.len();
        frames
    }

    /// End of stream. Applies `policy` to any unterminated carry-over and
    /// leaves the buffer empty.
    pub fn finish(&mut self, policy: TrailingFramePolicy) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.carry);
        match policy {
            TrailingFramePolicy::Discard => {
                warn!(
                    bytes = rest.len(),
                    "discarding unterminated trailing frame at end of stream"
                );
                None
            }
            TrailingFramePolicy::Flush => {
                self.frames_emitted += 1;
                Some(rest)
            }
        }
    }

    /// Bytes currently held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.carry.len()
    }

    pub fn frames_emitted(&self) -> usize {
        self.frames_emitted
    }
}
