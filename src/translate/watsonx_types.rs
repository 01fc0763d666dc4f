//! Type definitions for the watsonx.ai REST API.
//!
//! Requests are what we send to `text/generation`, `text/chat` and
//! `text/chat_stream`; responses are read leniently (every field defaulted)
//! because the gateway must answer even when watsonx omits optional data.

use super::openai_types::ChatMessage;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what we send TO watsonx.ai)
// ---------------------------------------------------------------------------

/// Body of `POST /ml/v1/text/generation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub input: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub model_id: String,
    pub project_id: String,
}

/// Body of `POST /ml/v1/text/chat` and `/ml/v1/text/chat_stream`.
///
/// Sampling parameters sit at the top level next to `messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model_id: String,
    pub project_id: String,
    #[serde(flatten)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// Either upstream request shape, as produced by the request translator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpstreamPayload {
    Generation(GenerationRequest),
    Chat(ChatRequest),
}

impl UpstreamPayload {
    pub fn model_id(&self) -> &str {
        match self {
            Self::Generation(r) => &r.model_id,
            Self::Chat(r) => &r.model_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Response types (what we receive FROM watsonx.ai)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub results: Vec<GenerationResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationResult {
    #[serde(default)]
    pub generated_text: Option<String>,
    #[serde(default)]
    pub generated_token_count: Option<u64>,
    #[serde(default)]
    pub input_token_count: Option<u64>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
    #[serde(default)]
    pub usage: Option<ChatResponseUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponseChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: Option<MessageFragment>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The part of a chat message or delta the gateway reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageFragment {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponseUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// Buffered upstream reply, matching the [`UpstreamPayload`] variant that was sent.
#[derive(Debug, Clone)]
pub enum UpstreamResponse {
    Generation(GenerationResponse),
    Chat(ChatResponse),
}

/// One `data:` event from `text/chat_stream`.
///
/// watsonx emits `delta` fragments, but some deployments send whole `message`
/// objects per event; both are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStreamEvent {
    #[serde(default)]
    pub choices: Vec<StreamEventChoice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamEventChoice {
    #[serde(default)]
    pub message: Option<MessageFragment>,
    #[serde(default)]
    pub delta: Option<MessageFragment>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatStreamEvent {
    /// Text carried by the first choice, preferring `message` over `delta`.
    pub fn content(&self) -> Option<&str> {
        let choice = self.choices.first()?;
        choice
            .message
            .as_ref()
            .or(choice.delta.as_ref())
            .and_then(|m| m.content.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Model catalog (`GET /ml/v1/foundation_model_specs`)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundationModelSpecs {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub resources: Vec<FoundationModel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundationModel {
    pub model_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default)]
    pub model_limits: Option<ModelLimits>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelLimits {
    #[serde(default)]
    pub max_sequence_length: Option<u64>,
    #[serde(default)]
    pub max_output_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_content_from_delta_or_message() {
        let delta: ChatStreamEvent =
            serde_json::from_str(r#"{"choices":[{"index":0,"delta":{"content":"He"}}]}"#).unwrap();
        assert_eq!(delta.content(), Some("He"));

        let message: ChatStreamEvent = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"llo"}}]}"#,
        )
        .unwrap();
        assert_eq!(message.content(), Some("llo"));

        let empty: ChatStreamEvent = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.content(), None);
    }

    #[test]
    fn test_chat_request_flattens_parameters() {
        let mut parameters = serde_json::Map::new();
        parameters.insert("max_tokens".to_string(), serde_json::json!(100));

        let req = ChatRequest {
            messages: Vec::new(),
            model_id: "ibm/granite-13b-chat-v2".to_string(),
            project_id: "p".to_string(),
            parameters,
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_tokens"], 100);
        assert!(json.get("parameters").is_none());
    }

    #[test]
    fn test_generation_response_tolerates_missing_fields() {
        let resp: GenerationResponse =
            serde_json::from_str(r#"{"results":[{"generated_text":"ok"}]}"#).unwrap();
        assert_eq!(resp.results[0].generated_text.as_deref(), Some("ok"));
        assert!(resp.results[0].stop_reason.is_none());
    }
}
