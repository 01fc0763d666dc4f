//! Translate OpenAI completion and chat completion requests into watsonx.ai payloads.
//!
//! Legacy completions become a `text/generation` body with the prompt as
//! `input`; chat completions become a `text/chat` body with the message list
//! passed through untouched. Parameter defaults and field names come from
//! [`super::params`].

use super::openai_types::CompletionRequest;
use super::params::{upstream_parameters, Mode, SamplingParams};
use super::watsonx_types::{ChatRequest, GenerationRequest, UpstreamPayload};
use crate::error::{GatewayError, Result};

/// Deployment-level values every payload carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateContext {
    pub project_id: String,
    pub default_model: String,
}

/// Translate an inbound request into the upstream payload for `mode`.
/// Pure function: no I/O, no shared state.
///
/// # Errors
/// Returns `GatewayError::Validation` when, in legacy mode, `prompt` is
/// neither a string nor a list of strings.
pub fn translate(
    req: &CompletionRequest,
    mode: Mode,
    ctx: &TranslateContext,
) -> Result<UpstreamPayload> {
    match mode {
        Mode::LegacyCompletion => translate_generation(req, ctx).map(UpstreamPayload::Generation),
        Mode::Chat => Ok(UpstreamPayload::Chat(translate_chat(req, ctx))),
    }
}

/// Legacy completion → `text/generation` body.
pub fn translate_generation(
    req: &CompletionRequest,
    ctx: &TranslateContext,
) -> Result<GenerationRequest> {
    let params = SamplingParams::resolve(req, &ctx.default_model);
    tracing::debug!(?params, "Resolved generation parameters");

    Ok(GenerationRequest {
        input: resolve_prompt(req.prompt.as_ref())?,
        parameters: upstream_parameters(&params, Mode::LegacyCompletion),
        model_id: params.model_id,
        project_id: ctx.project_id.clone(),
    })
}

/// Chat completion → `text/chat` / `text/chat_stream` body.
pub fn translate_chat(req: &CompletionRequest, ctx: &TranslateContext) -> ChatRequest {
    let params = SamplingParams::resolve(req, &ctx.default_model);
    tracing::debug!(?params, "Resolved chat parameters");

    ChatRequest {
        messages: req.messages.clone().unwrap_or_default(),
        parameters: upstream_parameters(&params, Mode::Chat),
        model_id: params.model_id,
        project_id: ctx.project_id.clone(),
    }
}

/// Flatten a legacy `prompt` into the single string watsonx expects.
/// A list of strings is joined with one space; a missing prompt is empty.
fn resolve_prompt(prompt: Option<&serde_json::Value>) -> Result<String> {
    use serde_json::Value;

    match prompt {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(invalid_prompt))
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join(" ")),
        Some(other) => {
            tracing::error!(prompt = %other, "Invalid type for 'prompt'");
            Err(invalid_prompt())
        }
    }
}

fn invalid_prompt() -> GatewayError {
    GatewayError::validation("Invalid type for 'prompt'. Expected a string or list of strings.")
}
