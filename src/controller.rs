//! Per-request stream driver.
//!
//! [`SessionStreamController::submit`] walks one request through
//! `Idle -> Requesting -> Streaming -> {Completed, Failed} -> Idle`:
//! admission through the shared [`AdmissionGate`], message creation, the
//! read loop (decode, frame, parse, route), and finalization. Every failure
//! after admission ends up as inline message content; nothing past this
//! boundary sees a [`StreamError`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::decode::Utf8Decoder;
use crate::error::StreamError;
use crate::event::parse_frame;
use crate::frame::FrameBuffer;
use crate::gate::{AdmissionGate, AdmissionPermit};
use crate::i18n::inline_error;
use crate::message::AiMessage;
use crate::render::RenderProjector;
use crate::router::{RouteOutcome, StreamRouter};
use crate::session::{ChatMode, Lane, Session};
use crate::transport::{ChatTransport, StreamRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamPhase {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
}

/// Why a submission never started. Nothing was sent and nothing changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("another request is in flight")]
    Busy,
    #[error("{mode} belongs to the {expected} lane, not {actual}")]
    WrongLane {
        mode: ChatMode,
        expected: Lane,
        actual: Lane,
    },
}

/// One user submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub mode: ChatMode,
    pub prompt: String,
    pub model: Option<String>,
    pub tone: Option<String>,
}

impl Submission {
    pub fn new(mode: ChatMode, prompt: impl Into<String>) -> Self {
        Self {
            mode,
            prompt: prompt.into(),
            model: None,
            tone: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum StreamOutcome {
    Completed,
    Failed(String),
}

/// What happened to an admitted request.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub request_id: String,
    pub lane: Lane,
    pub mode: ChatMode,
    pub outcome: StreamOutcome,
    pub chunks: usize,
    pub bytes: usize,
    pub frames: usize,
    /// Frames that were malformed, carried nothing routable, or named an
    /// unknown channel.
    pub dropped_frames: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
struct ReadStats {
    chunks: usize,
    bytes: usize,
    frames: usize,
    dropped_frames: usize,
}

async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, StreamError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| StreamError::IdleTimeout(limit)),
        None => Ok(fut.await),
    }
}

/// An admitted request's message and gate slot, settled together.
///
/// If the request future is dropped before it settles, the message is
/// closed here before the slot is released.
struct InFlight<'a> {
    message: &'a mut AiMessage,
    _permit: AdmissionPermit,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.message.is_finished() {
            warn!("request abandoned before completion; closing message");
            self.message.finish();
        }
    }
}

#[derive(Clone)]
pub struct SessionStreamController {
    transport: Arc<dyn ChatTransport>,
    gate: AdmissionGate,
    config: ClientConfig,
    router: StreamRouter,
}

impl SessionStreamController {
    pub fn new(transport: Arc<dyn ChatTransport>, gate: AdmissionGate, config: ClientConfig) -> Self {
        let router = StreamRouter::new(config.language);
        Self {
            transport,
            gate,
            config,
            router,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Run one submission to completion on `session`.
    ///
    /// Rejections happen before anything is mutated or sent. Once admitted,
    /// the request always returns a summary: transport and read failures are
    /// appended to the message and reported as [`StreamOutcome::Failed`].
    pub async fn submit(
        &self,
        session: &mut Session,
        submission: Submission,
        projector: &mut dyn RenderProjector,
    ) -> Result<StreamSummary, SubmitRejection> {
        let mode = submission.mode;
        let prompt = submission.prompt.trim();
        if prompt.is_empty() {
            return Err(SubmitRejection::EmptyPrompt);
        }
        if session.lane() != mode.lane() {
            return Err(SubmitRejection::WrongLane {
                mode,
                expected: mode.lane(),
                actual: session.lane(),
            });
        }
        let permit = self
            .gate
            .try_admit(session.lane())
            .ok_or(SubmitRejection::Busy)?;

        let request_id = Uuid::new_v4().to_string();
        let model = submission
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);
        let tone = submission
            .tone
            .as_deref()
            .unwrap_or(&self.config.default_tone);
        let request = StreamRequest::for_mode(mode, prompt, model, tone);
        let span = tracing::info_span!("stream", request_id = %request_id, lane = %session.lane(), %mode);

        let summary = async {
            let started = Instant::now();
            info!(model = request.model.as_str(), "request started");

            session.push_user(prompt);
            let mut flight = InFlight {
                message: session.push_ai(mode.message_kind()),
                _permit: permit,
            };
            let message = &mut *flight.message;
            projector.begin(mode);
            projector.phase_changed(StreamPhase::Requesting);
            projector.render(&message.snapshot());

            let mut stats = ReadStats::default();
            let result = self
                .drive(mode, &request, message, projector, &mut stats)
                .await;

            let (phase, outcome) = match result {
                Ok(()) => (StreamPhase::Completed, StreamOutcome::Completed),
                Err(e) => {
                    let detail = e.to_string();
                    warn!(error = %detail, "request failed");
                    let channel = mode.message_kind().fallback_channel();
                    message.append(channel, &inline_error(self.config.language, &detail));
                    (StreamPhase::Failed, StreamOutcome::Failed(detail))
                }
            };
            message.finish();
            debug!(?phase, "stream settled");
            projector.phase_changed(phase);
            projector.render(&message.snapshot());

            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(
                chunks = stats.chunks,
                bytes = stats.bytes,
                frames = stats.frames,
                dropped = stats.dropped_frames,
                elapsed_ms,
                ok = matches!(outcome, StreamOutcome::Completed),
                "request finished"
            );
            StreamSummary {
                request_id: request_id.clone(),
                lane: mode.lane(),
                mode,
                outcome,
                chunks: stats.chunks,
                bytes: stats.bytes,
                frames: stats.frames,
                dropped_frames: stats.dropped_frames,
                elapsed_ms,
            }
        }
        .instrument(span)
        .await;

        projector.phase_changed(StreamPhase::Idle);
        Ok(summary)
    }

    async fn drive(
        &self,
        mode: ChatMode,
        request: &StreamRequest,
        message: &mut AiMessage,
        projector: &mut dyn RenderProjector,
        stats: &mut ReadStats,
    ) -> Result<(), StreamError> {
        let idle = self.config.timeouts.idle_timeout(mode);
        let mut body = within(idle, self.transport.open_stream(mode, request)).await??;
        debug!("streaming");
        projector.phase_changed(StreamPhase::Streaming);

        let mut decoder = Utf8Decoder::new();
        let mut frames = FrameBuffer::new();

        while let Some(chunk) = within(idle, body.next()).await? {
            let chunk = chunk?;
            stats.chunks += 1;
            stats.bytes += chunk.len();
            let text = decoder.decode(&chunk);
            self.ingest(mode, &text, &mut frames, message, stats);
            projector.render(&message.snapshot());
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            self.ingest(mode, &tail, &mut frames, message, stats);
        }
        if mode.is_multiplexed() {
            if let Some(frame) = frames.finish(self.config.trailing_frame) {
                self.dispatch(&frame, message, stats);
            }
        }
        Ok(())
    }

    fn ingest(
        &self,
        mode: ChatMode,
        text: &str,
        frames: &mut FrameBuffer,
        message: &mut AiMessage,
        stats: &mut ReadStats,
    ) {
        if text.is_empty() {
            return;
        }
        if mode.is_multiplexed() {
            for frame in frames.push(text) {
                self.dispatch(&frame, message, stats);
            }
        } else {
            self.router.append_plain(text, message);
        }
    }

    fn dispatch(&self, frame: &str, message: &mut AiMessage, stats: &mut ReadStats) {
        if frame.trim().is_empty() {
            return;
        }
        stats.frames += 1;
        match parse_frame(frame) {
            Some(event) => {
                if self.router.route(&event, message) == RouteOutcome::UnknownChannel {
                    stats.dropped_frames += 1;
                }
            }
            None => stats.dropped_frames += 1,
        }
    }

    /// Empty `session` locally and ask the backend to forget it.
    ///
    /// The remote call is spawned on the current Tokio runtime and not
    /// awaited; a failure is only logged. Outside a runtime the local clear
    /// still happens and the remote call is skipped with a warning.
    pub fn clear_session(&self, session: &mut Session) -> Result<(), SubmitRejection> {
        if session.is_receiving() {
            return Err(SubmitRejection::Busy);
        }
        session.clear();
        let session_id = session.id();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(session_id, "no async runtime; remote session not cleared");
            return Ok(());
        };
        let transport = Arc::clone(&self.transport);
        handle.spawn(async move {
            match transport.clear_session(session_id).await {
                Ok(()) => debug!(session_id, "remote session cleared"),
                Err(e) => warn!(session_id, error = %e, "failed to clear remote session"),
            }
        });
        Ok(())
    }
}
