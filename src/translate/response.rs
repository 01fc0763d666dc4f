use super::openai_types::{
    AssistantMessage, ChatChoice, ChatCompletionResponse, Role, TextChoice,
    TextCompletionResponse, Usage,
};
use super::watsonx_types::{ChatResponse, GenerationResponse, UpstreamResponse};
use serde::Serialize;

pub const NO_GENERATED_TEXT: &str = "\n\nNo response available.";
pub const NO_CHAT_CONTENT: &str = "I understand your request and I'm here to help you.";

const LEGACY_FINISH_REASON: &str = "length";
const CHAT_FINISH_REASON: &str = "stop";

// Reported when watsonx leaves token counts out of a generation result
const PLACEHOLDER_INPUT_TOKENS: u64 = 5;
const PLACEHOLDER_GENERATED_TOKENS: u64 = 7;

/// A buffered OpenAI reply of either shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OpenAIResponse {
    Text(TextCompletionResponse),
    Chat(ChatCompletionResponse),
}

impl OpenAIResponse {
    pub fn usage(&self) -> &Usage {
        match self {
            Self::Text(r) => &r.usage,
            Self::Chat(r) => &r.usage,
        }
    }
}

/// Translate whichever buffered reply watsonx returned.
pub fn to_openai_response(raw: &UpstreamResponse, requested_model: &str) -> OpenAIResponse {
    match raw {
        UpstreamResponse::Generation(g) => {
            OpenAIResponse::Text(to_openai_completion(g, requested_model))
        }
        UpstreamResponse::Chat(c) => {
            OpenAIResponse::Chat(to_openai_chat_completion(c, requested_model))
        }
    }
}

/// Translate a `text/generation` response into an OpenAI `text_completion`.
/// Only the first result is used; `requested_model` is echoed back as `model`.
pub fn to_openai_completion(
    raw: &GenerationResponse,
    requested_model: &str,
) -> TextCompletionResponse {
    let result = raw.results.first();

    let text = result
        .and_then(|r| r.generated_text.clone())
        .unwrap_or_else(|| {
            tracing::warn!("No generated text found in Watsonx.ai response");
            NO_GENERATED_TEXT.to_string()
        });

    let finish_reason = result
        .and_then(|r| r.stop_reason.clone())
        .unwrap_or_else(|| LEGACY_FINISH_REASON.to_string());

    let usage = Usage::new(
        result
            .and_then(|r| r.input_token_count)
            .unwrap_or(PLACEHOLDER_INPUT_TOKENS),
        result
            .and_then(|r| r.generated_token_count)
            .unwrap_or(PLACEHOLDER_GENERATED_TOKENS),
    );

    TextCompletionResponse {
        id: completion_id(),
        object: "text_completion".to_string(),
        created: unix_now(),
        model: requested_model.to_string(),
        system_fingerprint: fingerprint(),
        choices: vec![TextChoice {
            text,
            index: 0,
            logprobs: None,
            finish_reason,
        }],
        usage,
    }
}

/// Translate a `text/chat` response into an OpenAI `chat.completion`.
/// Only the first choice is used; `requested_model` is echoed back as `model`.
pub fn to_openai_chat_completion(
    raw: &ChatResponse,
    requested_model: &str,
) -> ChatCompletionResponse {
    let choice = raw.choices.first();

    let content = choice
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.clone())
        .unwrap_or_else(|| {
            tracing::warn!("No message content found in Watsonx.ai chat response");
            NO_CHAT_CONTENT.to_string()
        });

    let finish_reason = choice
        .and_then(|c| c.finish_reason.clone())
        .unwrap_or_else(|| CHAT_FINISH_REASON.to_string());

    let usage = raw.usage.as_ref().map_or_else(
        || Usage::new(0, 0),
        |u| {
            let prompt = u.prompt_tokens.unwrap_or(0);
            let completion = u.completion_tokens.unwrap_or(0);
            Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: u.total_tokens.unwrap_or(prompt + completion),
            }
        },
    );

    ChatCompletionResponse {
        id: chat_completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: requested_model.to_string(),
        system_fingerprint: fingerprint(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: Role::Assistant,
                content,
                tool_calls: None,
                function_call: None,
            },
            logprobs: None,
            finish_reason,
        }],
        usage,
    }
}

pub(crate) fn completion_id() -> String {
    format!("cmpl-{}", short_uuid())
}

pub(crate) fn chat_completion_id() -> String {
    format!("chatcmpl-{}", short_uuid())
}

pub(crate) fn fingerprint() -> String {
    format!("fp_{}", short_uuid())
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn short_uuid() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
