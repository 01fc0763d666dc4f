//! Default values and upstream field names for sampling parameters.
//!
//! Both translation modes read from the same two tables: [`SamplingParams::resolve`]
//! fills in the documented defaults, and [`PARAM_FIELDS`] says what each
//! parameter is called in the generation and chat payloads (or that a mode
//! does not carry it).

use super::openai_types::CompletionRequest;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_MAX_TOKENS: u64 = 2000;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_PRESENCE_PENALTY: f64 = 1.0;
pub const DEFAULT_TOP_P: f64 = 1.0;
pub const DEFAULT_BEST_OF: u32 = 1;
pub const DEFAULT_N: u32 = 1;

/// Generation endpoint rejects greedy decoding for several models.
const GENERATION_DECODING_METHOD: &str = "sample";
const GENERATION_TOP_K: u64 = 50;

/// Which upstream payload shape a request is translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `/v1/completions` → `text/generation`
    LegacyCompletion,
    /// `/v1/chat/completions` → `text/chat` / `text/chat_stream`
    Chat,
}

/// Inbound parameters with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub model_id: String,
    pub max_tokens: u64,
    pub temperature: f64,
    pub top_p: f64,
    pub presence_penalty: f64,
    pub seed: Option<i64>,
    pub stop: Vec<String>,
    pub logit_bias: BTreeMap<String, f64>,
    pub stream: bool,
    pub echo: bool,
    pub best_of: u32,
    pub n: u32,
    pub logprobs: Option<serde_json::Value>,
    pub suffix: Option<String>,
}

impl SamplingParams {
    pub fn resolve(req: &CompletionRequest, default_model: &str) -> Self {
        Self {
            model_id: req
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: req.top_p.unwrap_or(DEFAULT_TOP_P),
            presence_penalty: req.presence_penalty.unwrap_or(DEFAULT_PRESENCE_PENALTY),
            seed: req.seed,
            stop: req.stop.clone().map(|s| s.into_vec()).unwrap_or_default(),
            logit_bias: req.logit_bias.clone().unwrap_or_default(),
            stream: req.stream.unwrap_or(false),
            echo: req.echo.unwrap_or(false),
            best_of: req.best_of.unwrap_or(DEFAULT_BEST_OF),
            n: req.n.unwrap_or(DEFAULT_N),
            logprobs: req.logprobs.clone(),
            suffix: req.suffix.clone(),
        }
    }
}

/// One row of the upstream field-name table.
pub struct ParamField {
    pub name: &'static str,
    pub generation: Option<&'static str>,
    pub chat: Option<&'static str>,
    /// `None` means "leave the field out of the payload".
    value: fn(&SamplingParams) -> Option<Value>,
}

impl ParamField {
    pub fn upstream_name(&self, mode: Mode) -> Option<&'static str> {
        match mode {
            Mode::LegacyCompletion => self.generation,
            Mode::Chat => self.chat,
        }
    }
}

pub const PARAM_FIELDS: &[ParamField] = &[
    ParamField {
        name: "decoding_method",
        generation: Some("decoding_method"),
        chat: None,
        value: |_| Some(json!(GENERATION_DECODING_METHOD)),
    },
    ParamField {
        name: "max_tokens",
        generation: Some("max_new_tokens"),
        chat: Some("max_tokens"),
        value: |p| Some(json!(p.max_tokens)),
    },
    ParamField {
        name: "temperature",
        generation: Some("temperature"),
        chat: Some("temperature"),
        value: |p| Some(json!(p.temperature)),
    },
    ParamField {
        name: "top_k",
        generation: Some("top_k"),
        chat: None,
        value: |_| Some(json!(GENERATION_TOP_K)),
    },
    ParamField {
        name: "top_p",
        generation: Some("top_p"),
        chat: Some("top_p"),
        value: |p| Some(json!(p.top_p)),
    },
    ParamField {
        name: "seed",
        generation: Some("random_seed"),
        chat: Some("seed"),
        value: |p| Some(json!(p.seed)),
    },
    ParamField {
        name: "presence_penalty",
        generation: Some("repetition_penalty"),
        chat: Some("frequency_penalty"),
        value: |p| Some(json!(p.presence_penalty)),
    },
    ParamField {
        name: "stop",
        generation: Some("stop_sequences"),
        chat: Some("stop"),
        value: |p| (!p.stop.is_empty()).then(|| json!(p.stop)),
    },
    ParamField {
        name: "logit_bias",
        generation: Some("logit_bias"),
        chat: Some("logit_bias"),
        value: |p| (!p.logit_bias.is_empty()).then(|| json!(p.logit_bias)),
    },
];

/// Build the upstream parameter object for `mode` from the field table.
pub fn upstream_parameters(params: &SamplingParams, mode: Mode) -> Map<String, Value> {
    PARAM_FIELDS
        .iter()
        .filter_map(|field| {
            let key = field.upstream_name(mode)?;
            let value = (field.value)(params)?;
            Some((key.to_string(), value))
        })
        .collect()
}
