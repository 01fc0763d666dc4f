//! State machine that re-frames watsonx `text/chat_stream` events as OpenAI chunks.
//!
//! The [`StreamRelay`] is fed the `data` payload of each upstream event one at a
//! time and returns the frames to forward, in order:
//!
//! ```text
//! INIT ──start──▶ STREAMING ──[DONE] / end / failure──▶ DONE
//! ```
//!
//! * leaving `INIT` emits a role-only assistant chunk;
//! * every upstream event carrying text emits one content chunk;
//! * reaching `DONE` always emits a chunk with `finish_reason = "stop"` followed
//!   by the `[DONE]` terminator, with a placeholder content chunk first when no
//!   text was relayed, or an apology chunk when the upstream failed.
//!
//! Usage:
//!   let mut relay = StreamRelay::new("ibm/granite-13b-chat-v2");
//!   for data in upstream_events {
//!       for frame in relay.process_data(&data) { /* send as SSE */ }
//!   }
//!   for frame in relay.finish() { /* send as SSE */ }

use super::openai_types::{ChatCompletionChunk, ChunkChoice, ChunkDelta, Role};
use super::response::{chat_completion_id, fingerprint, unix_now};
use super::watsonx_types::ChatStreamEvent;

pub const DONE_SENTINEL: &str = "[DONE]";
pub const EMPTY_STREAM_PLACEHOLDER: &str = "I understand your request.";

const TIMEOUT_APOLOGY: &str =
    "I apologize, but I'm having trouble processing your request right now. Please try again.";
const STATUS_APOLOGY: &str =
    "I encountered an error while processing your request. Please try again later.";
const TRANSPORT_APOLOGY: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Init,
    Streaming,
    Done,
}

/// One unit of output for the caller's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayFrame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl RelayFrame {
    /// Payload for the SSE `data:` field.
    pub fn sse_data(&self) -> String {
        match self {
            Self::Chunk(chunk) => serde_json::to_string(chunk).unwrap_or_default(),
            Self::Done => DONE_SENTINEL.to_string(),
        }
    }

    pub fn chunk(&self) -> Option<&ChatCompletionChunk> {
        match self {
            Self::Chunk(chunk) => Some(chunk),
            Self::Done => None,
        }
    }
}

/// Why the upstream stream could not be consumed to its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFailure {
    Timeout,
    Status { status: u16, body: String },
    Transport(String),
}

impl StreamFailure {
    /// Text shown to the caller in place of a completion.
    pub fn apology(&self) -> &'static str {
        match self {
            Self::Timeout => TIMEOUT_APOLOGY,
            Self::Status { .. } => STATUS_APOLOGY,
            Self::Transport(_) => TRANSPORT_APOLOGY,
        }
    }
}

impl std::fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "upstream read timed out"),
            Self::Status { status, body } => write!(f, "upstream returned status {status}: {body}"),
            Self::Transport(msg) => write!(f, "upstream transport error: {msg}"),
        }
    }
}

impl From<reqwest::Error> for StreamFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<std::convert::Infallible> for StreamFailure {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

#[derive(Debug)]
pub struct StreamRelay {
    id: String,
    created: i64,
    model: String,
    fingerprint: String,
    state: RelayState,
    accumulated: String,
}

impl StreamRelay {
    pub fn new(model: &str) -> Self {
        Self {
            id: chat_completion_id(),
            created: unix_now(),
            model: model.to_string(),
            fingerprint: fingerprint(),
            state: RelayState::Init,
            accumulated: String::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// All content relayed so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Leave `INIT`, emitting the role-establishing chunk. No-op afterwards.
    pub fn start(&mut self) -> Vec<RelayFrame> {
        if self.state != RelayState::Init {
            return Vec::new();
        }
        self.state = RelayState::Streaming;

        vec![self.chunk(
            ChunkDelta {
                role: Some(Role::Assistant),
                content: Some(String::new()),
            },
            None,
        )]
    }

    /// Process the payload of one `data:` event.
    pub fn process_data(&mut self, data: &str) -> Vec<RelayFrame> {
        if self.state == RelayState::Done {
            return Vec::new();
        }

        let mut frames = self.start();
        let data = data.trim();

        if data == DONE_SENTINEL {
            frames.append(&mut self.finish());
            return frames;
        }

        let event: ChatStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, data, "Skipping unparseable stream event");
                return frames;
            }
        };

        if let Some(content) = event.content().filter(|c| !c.is_empty()) {
            self.accumulated.push_str(content);
            frames.push(self.chunk(
                ChunkDelta {
                    role: None,
                    content: Some(content.to_string()),
                },
                None,
            ));
        }

        frames
    }

    /// Call when the upstream stream ends without (or after) `[DONE]`.
    pub fn finish(&mut self) -> Vec<RelayFrame> {
        if self.state == RelayState::Done {
            return Vec::new();
        }

        let mut frames = self.start();

        if self.accumulated.is_empty() {
            tracing::warn!("Upstream stream produced no content, sending placeholder");
            self.accumulated.push_str(EMPTY_STREAM_PLACEHOLDER);
            frames.push(self.chunk(
                ChunkDelta {
                    role: None,
                    content: Some(EMPTY_STREAM_PLACEHOLDER.to_string()),
                },
                None,
            ));
        }

        frames.append(&mut self.close());
        frames
    }

    /// Call when the upstream connection failed or broke mid-stream.
    pub fn fail(&mut self, failure: &StreamFailure) -> Vec<RelayFrame> {
        if self.state == RelayState::Done {
            return Vec::new();
        }

        tracing::error!(%failure, "Upstream stream failed, closing with apology");

        let mut frames = self.start();
        frames.push(self.chunk(
            ChunkDelta {
                role: None,
                content: Some(failure.apology().to_string()),
            },
            Some("stop"),
        ));
        frames.push(RelayFrame::Done);
        self.state = RelayState::Done;
        frames
    }

    fn close(&mut self) -> Vec<RelayFrame> {
        self.state = RelayState::Done;
        vec![self.chunk(ChunkDelta::default(), Some("stop")), RelayFrame::Done]
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<&str>) -> RelayFrame {
        RelayFrame::Chunk(ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: self.fingerprint.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                logprobs: None,
                finish_reason: finish_reason.map(String::from),
            }],
            usage: None,
        })
    }
}
