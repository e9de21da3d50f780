use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use futures_util::StreamExt;
use tokio::sync::Notify;

use chat_lanes::controller::{StreamOutcome, StreamPhase, Submission, SubmitRejection};
use chat_lanes::message::MessageSnapshot;
use chat_lanes::transport::ByteStream;
use chat_lanes::{
    AdmissionGate, Channel, ChatMode, ChatTransport, ClientConfig, Lane, Language, Message,
    RenderProjector, Session, SessionStreamController, SilentProjector, StreamError,
    StreamRequest, TimeoutConfig, TrailingFramePolicy,
};

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

enum Script {
    Chunks(Vec<Vec<u8>>),
    Status(u16),
    FailAfter(Vec<Vec<u8>>, &'static str),
    Stall,
    StallAfter(Vec<u8>),
    Gated(Arc<Notify>, Vec<u8>),
}

#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<(ChatMode, StreamRequest)>>,
    cleared: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn with(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        mode: ChatMode,
        request: &StreamRequest,
    ) -> Result<ByteStream, StreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("lock")
            .push((mode, request.clone()));
        let script = self
            .scripts
            .lock()
            .expect("lock")
            .pop_front()
            .expect("no script left");
        match script {
            Script::Chunks(chunks) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
            Script::Status(status) => Err(StreamError::Status {
                status,
                url: mode.endpoint().to_string(),
            }),
            Script::FailAfter(chunks, detail) => {
                let mut items: Vec<Result<Vec<u8>, StreamError>> =
                    chunks.into_iter().map(Ok).collect();
                items.push(Err(StreamError::Read(detail.to_string())));
                Ok(stream::iter(items).boxed())
            }
            Script::Stall => Ok(stream::pending().boxed()),
            Script::StallAfter(chunk) => Ok(stream::iter(vec![Ok(chunk)])
                .chain(stream::pending())
                .boxed()),
            Script::Gated(notify, chunk) => Ok(stream::once(async move {
                notify.notified().await;
                Ok(chunk)
            })
            .boxed()),
        }
    }

    async fn clear_session(&self, session_id: &str) -> Result<(), StreamError> {
        self.cleared
            .lock()
            .expect("lock")
            .push(session_id.to_string());
        Ok(())
    }
}

fn chunks(parts: &[&str]) -> Script {
    Script::Chunks(parts.iter().map(|p| p.as_bytes().to_vec()).collect())
}

// ---------------------------------------------------------------------------
// Recording projector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ChannelState {
    channel: Channel,
    text: String,
    open: bool,
    visible: bool,
}

#[derive(Default)]
struct Recorder {
    phases: Vec<StreamPhase>,
    renders: usize,
    last: Vec<ChannelState>,
    footers: usize,
}

impl Recorder {
    fn channel(&self, channel: Channel) -> &ChannelState {
        self.last
            .iter()
            .find(|c| c.channel == channel)
            .expect("channel rendered")
    }
}

impl RenderProjector for Recorder {
    fn phase_changed(&mut self, phase: StreamPhase) {
        self.phases.push(phase);
    }

    fn render(&mut self, snapshot: &MessageSnapshot<'_>) {
        self.renders += 1;
        if snapshot.finished && !snapshot.any_open() {
            self.footers += 1;
        }
        self.last = snapshot
            .channels
            .iter()
            .map(|v| ChannelState {
                channel: v.channel,
                text: v.text.to_string(),
                open: v.open,
                visible: v.visible,
            })
            .collect();
    }
}

fn english() -> ClientConfig {
    ClientConfig {
        language: Language::En,
        ..ClientConfig::default()
    }
}

fn controller(transport: Arc<ScriptedTransport>, config: ClientConfig) -> SessionStreamController {
    SessionStreamController::new(transport, AdmissionGate::new(), config)
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_plain_chunks_accumulate() {
    let transport = ScriptedTransport::with(vec![chunks(&["Hel", "lo wor", "ld"])]);
    let c = controller(transport.clone(), english());
    let mut session = Session::new(Lane::General);
    let mut rec = Recorder::default();

    let summary = c
        .submit(&mut session, Submission::new(ChatMode::Chat, "hi"), &mut rec)
        .await
        .expect("admitted");

    let ai = session.last_ai().expect("ai message");
    assert_eq!(ai.text(Channel::Main), "Hello world");
    assert!(!ai.any_open());
    assert_eq!(summary.outcome, StreamOutcome::Completed);
    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.bytes, 11);
    assert_eq!(
        rec.phases,
        vec![
            StreamPhase::Requesting,
            StreamPhase::Streaming,
            StreamPhase::Completed,
            StreamPhase::Idle
        ]
    );
    // Creation, one per chunk, final.
    assert_eq!(rec.renders, 5);
    assert_eq!(rec.footers, 1);
    assert!(!c.gate().is_busy());
}

#[tokio::test]
async fn test_dual_agent_frames_fill_channels() {
    let body = concat!(
        "{\"agent\":\"CriticalAnalyst\",\"content\":\"A\"}\n",
        "{\"agent\":\"PositiveAdvocate\",\"content\":\"B\"}\n",
        "{\"type\":\"synthesis_start\"}\n",
        "{\"agent\":\"Synthesizer\",\"content\":\"C\"}\n",
    );
    let transport = ScriptedTransport::with(vec![chunks(&[body])]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::General);
    let mut rec = Recorder::default();

    c.submit(&mut session, Submission::new(ChatMode::Debate, "q"), &mut rec)
        .await
        .expect("admitted");

    let ai = session.last_ai().expect("ai message");
    assert_eq!(ai.text(Channel::Critical), "A");
    assert_eq!(ai.text(Channel::Positive), "B");
    assert_eq!(ai.text(Channel::Synthesis), "C");
    assert!(rec.channel(Channel::Synthesis).visible);
    assert!(rec.last.iter().all(|c| !c.open));
}

#[tokio::test]
async fn test_http_500_appends_single_error() {
    let transport = ScriptedTransport::with(vec![Script::Status(500)]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::General);
    let mut rec = Recorder::default();

    let summary = c
        .submit(&mut session, Submission::new(ChatMode::Chat, "hi"), &mut rec)
        .await
        .expect("admitted");

    let text = session.last_ai().expect("ai").text(Channel::Main).to_string();
    assert_eq!(text, "\n\n❌ Error: HTTP error! status: 500");
    assert_eq!(text.matches("❌ Error: ").count(), 1);
    assert!(matches!(summary.outcome, StreamOutcome::Failed(_)));
    assert!(rec.last.iter().all(|c| !c.open));
    assert!(rec.phases.contains(&StreamPhase::Failed));
    assert!(!rec.phases.contains(&StreamPhase::Streaming));
    assert!(!c.gate().is_busy());
    assert!(!session.is_receiving());
}

#[tokio::test]
async fn test_dual_agent_error_lands_in_synthesis_once() {
    let transport = ScriptedTransport::with(vec![Script::Status(503)]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::General);

    c.submit(&mut session, Submission::new(ChatMode::Debate, "q"), &mut SilentProjector)
        .await
        .expect("admitted");

    let ai = session.last_ai().expect("ai");
    assert_eq!(ai.text(Channel::Synthesis).matches("status: 503").count(), 1);
    assert_eq!(ai.text(Channel::Critical), "");
    assert!(ai.snapshot().channel(Channel::Synthesis).expect("synthesis").visible);
}

#[tokio::test]
async fn test_frame_split_at_newline_yields_both() {
    let transport = ScriptedTransport::with(vec![chunks(&[
        "{\"agent\":\"CriticalAnalyst\",\"content\":\"one\"}\n",
        "{\"agent\":\"CriticalAnalyst\",\"content\":\" two\"}\n",
    ])]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::General);

    let summary = c
        .submit(&mut session, Submission::new(ChatMode::Debate, "q"), &mut SilentProjector)
        .await
        .expect("admitted");

    assert_eq!(summary.frames, 2);
    assert_eq!(
        session.last_ai().expect("ai").text(Channel::Critical),
        "one two"
    );
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_busy_submission_is_noop() {
    let transport = ScriptedTransport::with(vec![chunks(&["x"])]);
    let gate = AdmissionGate::new();
    let c = SessionStreamController::new(transport.clone(), gate.clone(), english());
    let mut session = Session::new(Lane::Board);

    let held = gate.try_admit(Lane::General).expect("hold slot");
    let r = c
        .submit(&mut session, Submission::new(ChatMode::Board, "plan"), &mut SilentProjector)
        .await;

    assert_eq!(r.unwrap_err(), SubmitRejection::Busy);
    assert_eq!(transport.calls(), 0);
    assert!(session.is_empty());
    drop(held);

    c.submit(&mut session, Submission::new(ChatMode::Board, "plan"), &mut SilentProjector)
        .await
        .expect("admitted after release");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_second_lane_rejected_while_first_streams() {
    let release = Arc::new(Notify::new());
    let transport = ScriptedTransport::with(vec![Script::Gated(
        release.clone(),
        b"done".to_vec(),
    )]);
    let c = controller(transport.clone(), english());
    let mut general = Session::new(Lane::General);
    let mut guideline = Session::new(Lane::Guideline);

    let mut projector = SilentProjector;
    let first = c.submit(&mut general, Submission::new(ChatMode::Chat, "a"), &mut projector);
    let second = async {
        while !c.gate().is_busy() {
            tokio::task::yield_now().await;
        }
        let r = c
            .submit(&mut guideline, Submission::new(ChatMode::Search, "b"), &mut SilentProjector)
            .await;
        release.notify_one();
        r
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.expect("first admitted").outcome, StreamOutcome::Completed);
    assert_eq!(second.unwrap_err(), SubmitRejection::Busy);
    assert_eq!(transport.calls(), 1);
    assert!(guideline.is_empty());
    assert_eq!(general.last_ai().expect("ai").text(Channel::Main), "done");
    assert!(!c.gate().is_busy());
}

// ---------------------------------------------------------------------------
// Recovery and failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_malformed_and_unknown_frames_do_not_abort() {
    let transport = ScriptedTransport::with(vec![chunks(&[
        "{\"agent\":\"CEO\",\"content\":\"vision\"}\n{broken\n",
        "{\"agent\":\"CriticalAnalyst\",\"content\":\"wrong lane\"}\n",
        "{\"agent\":\"CTO\",\"content\":\"stack\"}\n{\"agent\":\"CFO\"}\n",
    ])]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::Board);

    let summary = c
        .submit(&mut session, Submission::new(ChatMode::Board, "plan"), &mut SilentProjector)
        .await
        .expect("admitted");

    let ai = session.last_ai().expect("ai");
    assert_eq!(ai.text(Channel::Planning), "vision");
    assert_eq!(ai.text(Channel::Tech), "stack");
    assert_eq!(ai.text(Channel::Business), "");
    assert_eq!(summary.outcome, StreamOutcome::Completed);
    assert_eq!(summary.dropped_frames, 3);
}

#[tokio::test]
async fn test_board_normalizes_line_breaks() {
    let transport = ScriptedTransport::with(vec![chunks(&[
        "{\"agent\":\"COO\",\"content\":\"step 1\\n\"}\n",
        "{\"agent\":\"COO\",\"content\":\"\\n\\nstep 2\"}\n",
    ])]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::Board);

    c.submit(&mut session, Submission::new(ChatMode::Board, "plan"), &mut SilentProjector)
        .await
        .expect("admitted");

    let ai = session.last_ai().expect("ai");
    assert_eq!(ai.text(Channel::Synthesis), "step 1\nstep 2");
    assert_eq!(
        ai.accumulator(Channel::Synthesis).expect("acc").raw(),
        "step 1\n\n\nstep 2"
    );
}

#[tokio::test]
async fn test_read_failure_mid_stream() {
    let transport =
        ScriptedTransport::with(vec![Script::FailAfter(vec![b"partial".to_vec()], "reset")]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::Guideline);

    let summary = c
        .submit(&mut session, Submission::new(ChatMode::Search, "q"), &mut SilentProjector)
        .await
        .expect("admitted");

    assert_eq!(
        session.last_ai().expect("ai").text(Channel::Main),
        "partial\n\n❌ Error: stream read failed: reset"
    );
    assert_eq!(
        summary.outcome,
        StreamOutcome::Failed("stream read failed: reset".into())
    );
    assert!(!c.gate().is_busy());
}

#[tokio::test]
async fn test_stalled_stream_times_out() {
    let transport = ScriptedTransport::with(vec![Script::Stall]);
    let config = ClientConfig {
        timeouts: TimeoutConfig {
            chat_secs: 1,
            ..TimeoutConfig::default()
        },
        ..english()
    };
    let c = controller(transport, config);
    let mut session = Session::new(Lane::General);

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        c.submit(&mut session, Submission::new(ChatMode::Chat, "hi"), &mut SilentProjector),
    )
    .await
    .expect("controller must not hang")
    .expect("admitted");

    assert!(matches!(summary.outcome, StreamOutcome::Failed(ref e) if e.contains("no data received")));
    assert!(!session.is_receiving());
    assert!(!c.gate().is_busy());
}

#[tokio::test]
async fn test_cancelled_submit_closes_message_and_frees_lane() {
    let transport = ScriptedTransport::with(vec![
        Script::StallAfter(b"part".to_vec()),
        chunks(&["next"]),
    ]);
    let c = controller(transport.clone(), english());
    let mut session = Session::new(Lane::General);

    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        c.submit(&mut session, Submission::new(ChatMode::Chat, "hi"), &mut SilentProjector),
    )
    .await;
    assert!(cancelled.is_err());

    assert!(!c.gate().is_busy());
    assert!(!session.is_receiving());
    let ai = session.last_ai().expect("ai");
    assert!(ai.is_finished());
    assert_eq!(ai.text(Channel::Main), "part");

    c.submit(&mut session, Submission::new(ChatMode::Chat, "again"), &mut SilentProjector)
        .await
        .expect("lane usable after cancellation");
    assert_eq!(session.len(), 4);
    assert!(session
        .messages()
        .iter()
        .filter_map(Message::as_ai)
        .all(|m| !m.any_open()));

    assert!(c.clear_session(&mut session).is_ok());
    assert!(session.is_empty());
}

#[tokio::test]
async fn test_backend_error_frame_is_inline() {
    let transport = ScriptedTransport::with(vec![chunks(&[
        "{\"type\":\"start\"}\n{\"agent\":\"CriticalAnalyst\",\"content\":\"A\"}\n",
        "{\"type\":\"error\",\"message\":\"quota exceeded\"}\n",
    ])]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::General);

    let summary = c
        .submit(&mut session, Submission::new(ChatMode::Debate, "q"), &mut SilentProjector)
        .await
        .expect("admitted");

    let ai = session.last_ai().expect("ai");
    assert_eq!(ai.text(Channel::Synthesis), "\n\n❌ Error: quota exceeded");
    assert_eq!(ai.text(Channel::Critical), "A");
    assert_eq!(summary.outcome, StreamOutcome::Completed);
}

#[tokio::test]
async fn test_utf8_split_across_chunks() {
    let bytes = "日本語".as_bytes();
    let transport = ScriptedTransport::with(vec![Script::Chunks(vec![
        bytes[..4].to_vec(),
        bytes[4..].to_vec(),
    ])]);
    let c = controller(transport, english());
    let mut session = Session::new(Lane::General);

    c.submit(&mut session, Submission::new(ChatMode::Chat, "hi"), &mut SilentProjector)
        .await
        .expect("admitted");

    assert_eq!(session.last_ai().expect("ai").text(Channel::Main), "日本語");
}

// ---------------------------------------------------------------------------
// Trailing frame policy
// ---------------------------------------------------------------------------

async fn run_unterminated(policy: TrailingFramePolicy) -> String {
    let transport = ScriptedTransport::with(vec![chunks(&[
        "{\"agent\":\"CEO\",\"content\":\"a\"}\n{\"agent\":\"CEO\",\"content\":\"b\"}",
    ])]);
    let config = ClientConfig {
        trailing_frame: policy,
        ..english()
    };
    let c = controller(transport, config);
    let mut session = Session::new(Lane::Board);
    c.submit(&mut session, Submission::new(ChatMode::Board, "p"), &mut SilentProjector)
        .await
        .expect("admitted");
    session.last_ai().expect("ai").text(Channel::Planning).to_string()
}

#[tokio::test]
async fn test_trailing_frame_discarded_by_default() {
    assert_eq!(run_unterminated(TrailingFramePolicy::Discard).await, "a");
}

#[tokio::test]
async fn test_trailing_frame_flushed_when_configured() {
    assert_eq!(run_unterminated(TrailingFramePolicy::Flush).await, "ab");
}

// ---------------------------------------------------------------------------
// Requests and clearing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_request_uses_defaults_and_overrides() {
    let transport = ScriptedTransport::with(vec![chunks(&[""]), chunks(&[""])]);
    let c = controller(transport.clone(), english());
    let mut board = Session::new(Lane::Board);

    c.submit(&mut board, Submission::new(ChatMode::Board, "p1"), &mut SilentProjector)
        .await
        .expect("admitted");
    c.submit(
        &mut board,
        Submission::new(ChatMode::Board, "p2")
            .with_model("gpt-4.1")
            .with_tone("concise"),
        &mut SilentProjector,
    )
    .await
    .expect("admitted");

    let requests = transport.requests.lock().expect("lock");
    assert_eq!(requests[0].1.model, "gpt-4.1-mini");
    assert_eq!(requests[0].1.tone.as_deref(), Some("balanced"));
    assert_eq!(requests[0].1.session_id.as_deref(), Some("idobata"));
    assert_eq!(requests[1].1.model, "gpt-4.1");
    assert_eq!(requests[1].1.tone.as_deref(), Some("concise"));
    assert_eq!(board.len(), 4);
}

#[tokio::test]
async fn test_clear_session_is_fire_and_forget() {
    let transport = ScriptedTransport::with(vec![chunks(&["hello"])]);
    let c = controller(transport.clone(), english());
    let mut session = Session::new(Lane::Guideline);
    c.submit(&mut session, Submission::new(ChatMode::Search, "q"), &mut SilentProjector)
        .await
        .expect("admitted");
    assert_eq!(session.len(), 2);

    c.clear_session(&mut session).expect("cleared");
    assert!(session.is_empty());

    for _ in 0..100 {
        if !transport.cleared.lock().expect("lock").is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        *transport.cleared.lock().expect("lock"),
        vec!["guideline".to_string()]
    );
}
