//! Backend wire contract.
//!
//! [`ChatTransport`] is the seam between the controller and the network: it
//! turns a request into a stream of raw body chunks. [`HttpTransport`] is the
//! reqwest implementation; tests substitute scripted transports.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::StreamError;
use crate::session::ChatMode;

/// Raw body chunks, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, StreamError>>;

pub const CLEAR_SESSION_PATH: &str = "/api/messages/clear";

/// JSON body of every streaming endpoint. Fields a mode does not use are
/// omitted from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

impl StreamRequest {
    pub fn for_mode(mode: ChatMode, prompt: &str, model: &str, tone: &str) -> Self {
        let session_id = match mode {
            ChatMode::Search => None,
            _ => Some(mode.lane().session_id().to_string()),
        };
        let tone = match mode {
            ChatMode::Board => Some(tone.to_string()),
            _ => None,
        };
        Self {
            prompt: prompt.to_string(),
            session_id,
            model: model.to_string(),
            tone,
        }
    }
}

#[derive(Debug, Serialize)]
struct ClearRequest<'a> {
    session_id: &'a str,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `request` to `mode`'s endpoint. Resolves once the response head
    /// has arrived with a success status.
    async fn open_stream(
        &self,
        mode: ChatMode,
        request: &StreamRequest,
    ) -> Result<ByteStream, StreamError>;

    /// Ask the backend to forget a session's history.
    async fn clear_session(&self, session_id: &str) -> Result<(), StreamError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let client = Client::builder()
            .build()
            .map_err(|e| StreamError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(
        &self,
        mode: ChatMode,
        request: &StreamRequest,
    ) -> Result<ByteStream, StreamError> {
        let url = self.url(mode.endpoint());
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| StreamError::Connect {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
                url,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Err(StreamError::MissingBody);
        }
        debug!(%url, status = status.as_u16(), "stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| StreamError::Read(e.to_string()))
            })
            .boxed();
        Ok(stream)
    }

    async fn clear_session(&self, session_id: &str) -> Result<(), StreamError> {
        let url = self.url(CLEAR_SESSION_PATH);
        let response = self
            .client
            .post(&url)
            .json(&ClearRequest { session_id })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StreamError::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(())
    }
}
