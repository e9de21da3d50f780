//! Streaming client core for a multi-lane, multi-agent chat backend.
//!
//! A submission goes through the process-wide [`AdmissionGate`], is sent by a
//! [`ChatTransport`], and its response body is decoded, split into frames,
//! parsed into [`Event`]s and routed into the named channels of one
//! [`AiMessage`]. Renderers observe the message through read-only
//! [`MessageSnapshot`]s.

pub mod cli;
pub mod config;
pub mod controller;
pub mod decode;
pub mod error;
pub mod event;
pub mod frame;
pub mod gate;
pub mod i18n;
pub mod message;
pub mod render;
pub mod router;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, TimeoutConfig};
pub use controller::{
    SessionStreamController, StreamOutcome, StreamPhase, StreamSummary, Submission,
    SubmitRejection,
};
pub use error::StreamError;
pub use event::{parse_frame, AgentRole, Event, Lifecycle};
pub use frame::{FrameBuffer, TrailingFramePolicy};
pub use gate::{AdmissionGate, AdmissionPermit};
pub use i18n::Language;
pub use message::{AiMessage, Channel, Message, MessageKind, MessageSnapshot};
pub use render::{RenderProjector, SilentProjector, TerminalProjector};
pub use router::{RouteOutcome, StreamRouter};
pub use session::{ChatLanes, ChatMode, Lane, Session};
pub use transport::{ChatTransport, HttpTransport, StreamRequest};
