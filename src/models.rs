//! Model catalog adapter.
//!
//! Fetches the watsonx.ai foundation model catalog and reshapes each entry
//! into an OpenAI `model` object. The catalog is re-fetched on every call.

use crate::error::{GatewayError, Result};
use crate::translate::openai_types::{ModelDescriptor, ModelList, TokenLimits};
use crate::translate::response::unix_now;
use crate::translate::watsonx_types::FoundationModel;
use crate::upstream::UpstreamClient;

const UNKNOWN_OWNER: &str = "unknown";

/// Reshape one catalog entry. `created` is stamped by the caller.
pub fn to_model_descriptor(model: &FoundationModel, created: i64) -> ModelDescriptor {
    let provider = model.provider.as_deref().unwrap_or(UNKNOWN_OWNER);
    let source = model.source.as_deref().unwrap_or(UNKNOWN_OWNER);
    let limits = model.model_limits.clone().unwrap_or_default();

    ModelDescriptor {
        id: model.model_id.clone(),
        object: "model".to_string(),
        created,
        owned_by: format!("{provider} / {source}"),
        description: format!(
            "{} Supports tasks like {}.",
            model.short_description.as_deref().unwrap_or_default(),
            model.task_ids.join(", ")
        ),
        max_tokens: limits.max_output_tokens,
        token_limits: TokenLimits {
            max_sequence_length: limits.max_sequence_length,
            max_output_tokens: limits.max_output_tokens,
        },
    }
}

/// Linear lookup by model id.
pub fn find_model<'a>(models: &'a [FoundationModel], id: &str) -> Option<&'a FoundationModel> {
    models.iter().find(|m| m.model_id == id)
}

/// All text-generation models currently offered in the configured region.
///
/// # Errors
/// `GatewayError::Auth` if no token can be obtained, `GatewayError::Upstream`
/// if the catalog call is rejected.
pub async fn list_models(upstream: &UpstreamClient) -> Result<ModelList> {
    let credential = upstream.tokens().get_token().await?;
    let specs = upstream.fetch_catalog(&credential).await?;
    let created = unix_now();

    tracing::debug!(count = specs.resources.len(), "Fetched model catalog");

    Ok(ModelList::new(
        specs
            .resources
            .iter()
            .map(|m| to_model_descriptor(m, created))
            .collect(),
    ))
}

/// A single model, wrapped in a one-element list.
///
/// # Errors
/// As [`list_models`], plus `GatewayError::NotFound` for an unknown id.
pub async fn get_model(upstream: &UpstreamClient, id: &str) -> Result<ModelList> {
    let credential = upstream.tokens().get_token().await?;
    let specs = upstream.fetch_catalog(&credential).await?;

    let model = find_model(&specs.resources, id).ok_or_else(|| {
        tracing::warn!(model_id = %id, "Requested model not in catalog");
        GatewayError::not_found(format!("Model with ID {id} not found."))
    })?;

    Ok(ModelList::new(vec![to_model_descriptor(model, unix_now())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::watsonx_types::ModelLimits;

    fn granite() -> FoundationModel {
        FoundationModel {
            model_id: "ibm/granite-13b-chat-v2".to_string(),
            label: Some("granite-13b-chat-v2".to_string()),
            provider: Some("IBM".to_string()),
            source: Some("IBM".to_string()),
            short_description: Some("A chat model.".to_string()),
            task_ids: vec!["question_answering".to_string(), "summarization".to_string()],
            model_limits: Some(ModelLimits {
                max_sequence_length: Some(8192),
                max_output_tokens: Some(4096),
            }),
        }
    }

    #[test]
    fn test_descriptor_fields() {
        let descriptor = to_model_descriptor(&granite(), 1_700_000_000);

        assert_eq!(descriptor.id, "ibm/granite-13b-chat-v2");
        assert_eq!(descriptor.object, "model");
        assert_eq!(descriptor.created, 1_700_000_000);
        assert_eq!(descriptor.owned_by, "IBM / IBM");
        assert_eq!(
            descriptor.description,
            "A chat model. Supports tasks like question_answering, summarization."
        );
        assert_eq!(descriptor.max_tokens, Some(4096));
        assert_eq!(descriptor.token_limits.max_sequence_length, Some(8192));
        assert_eq!(descriptor.token_limits.max_output_tokens, Some(4096));
    }

    #[test]
    fn test_descriptor_from_sparse_record() {
        let sparse = FoundationModel {
            model_id: "x/y".to_string(),
            ..FoundationModel::default()
        };
        let descriptor = to_model_descriptor(&sparse, 0);

        assert_eq!(descriptor.owned_by, "unknown / unknown");
        assert!(descriptor.max_tokens.is_none());
        assert_eq!(descriptor.token_limits, TokenLimits::default());
    }

    #[test]
    fn test_find_model() {
        let models = vec![
            FoundationModel {
                model_id: "a".to_string(),
                ..FoundationModel::default()
            },
            granite(),
        ];

        assert!(find_model(&models, "ibm/granite-13b-chat-v2").is_some());
        assert!(find_model(&models, "ibm/missing").is_none());
    }
}
