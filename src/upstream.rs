//! HTTP client for the watsonx.ai REST API.
//!
//! Buffered calls (`text/generation`, `text/chat`, the model catalog) fail with
//! [`GatewayError::Upstream`] on any non-2xx status, keeping the body verbatim.
//! The streaming call (`text/chat_stream`) never fails with a `GatewayError`:
//! its failures are [`StreamFailure`]s that the relay turns into an in-band
//! apology chunk.

use crate::config::{GatewayConfig, TimeoutConfig};
use crate::error::{GatewayError, Result};
use crate::token::{Credential, TokenCache};
use crate::translate::request::TranslateContext;
use crate::translate::streaming::StreamFailure;
use crate::translate::watsonx_types::{
    ChatRequest, FoundationModelSpecs, UpstreamPayload, UpstreamResponse,
};

use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{future, Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const CATALOG_FILTERS: &str = "function_text_generation,!lifecycle_withdrawn:and";

/// Fully-qualified watsonx.ai endpoint URLs for one region and API version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub generation: String,
    pub chat: String,
    pub chat_stream: String,
    pub catalog: String,
}

impl Endpoints {
    pub fn new(base_url: &str, api_version: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            generation: format!("{base}/ml/v1/text/generation?version={api_version}"),
            chat: format!("{base}/ml/v1/text/chat?version={api_version}"),
            chat_stream: format!("{base}/ml/v1/text/chat_stream?version={api_version}"),
            catalog: format!("{base}/ml/v1/foundation_model_specs"),
        }
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
    tokens: Arc<TokenCache>,
    context: TranslateContext,
    catalog_version: String,
    catalog_limit: u32,
    timeouts: TimeoutConfig,
}

impl UpstreamClient {
    /// Build a client for the configured region. `api_key` and `project_id` are
    /// passed in already resolved so startup can fail before anything is built.
    pub fn from_config(config: &GatewayConfig, api_key: &str, project_id: &str) -> Result<Self> {
        let base_url = config.effective_base_url()?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect())
            .build()?;

        let tokens = TokenCache::new(
            client.clone(),
            config.iam_url.clone(),
            api_key,
            Duration::from_secs(config.token_refresh_margin_secs),
            config.timeouts.request(),
        );

        Ok(Self {
            client,
            endpoints: Arc::new(Endpoints::new(&base_url, &config.api_version)),
            tokens: Arc::new(tokens),
            context: TranslateContext {
                project_id: project_id.to_string(),
                default_model: config.default_model.clone(),
            },
            catalog_version: config.catalog_version.clone(),
            catalog_limit: config.catalog_limit,
            timeouts: config.timeouts.clone(),
        })
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn context(&self) -> &TranslateContext {
        &self.context
    }

    /// Send a translated payload to `text/generation` or `text/chat`,
    /// depending on its shape, and read the whole reply.
    pub async fn call_buffered(
        &self,
        payload: &UpstreamPayload,
        credential: &Credential,
    ) -> Result<UpstreamResponse> {
        match payload {
            UpstreamPayload::Generation(body) => self
                .post_json(&self.endpoints.generation, body, credential)
                .await
                .map(UpstreamResponse::Generation),
            UpstreamPayload::Chat(body) => self
                .post_json(&self.endpoints.chat, body, credential)
                .await
                .map(UpstreamResponse::Chat),
        }
    }

    async fn post_json<B, R>(&self, url: &str, body: &B, credential: &Credential) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(%url, "Calling watsonx.ai");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, credential.bearer())
            .header(ACCEPT, "application/json")
            .json(body)
            .timeout(self.timeouts.request())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %text, %url, "watsonx.ai call failed");
            return Err(GatewayError::upstream(status.as_u16(), text));
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Open the `text/chat_stream` connection. The total stream duration is
    /// bounded by the stream timeout; connection setup by the connect timeout.
    pub async fn open_chat_stream(
        &self,
        payload: &ChatRequest,
        credential: &Credential,
    ) -> std::result::Result<reqwest::Response, StreamFailure> {
        tracing::debug!(url = %self.endpoints.chat_stream, "Opening watsonx.ai chat stream");

        let response = self
            .client
            .post(&self.endpoints.chat_stream)
            .header(AUTHORIZATION, credential.bearer())
            .header(ACCEPT, "text/event-stream")
            .json(payload)
            .timeout(self.timeouts.stream())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %body, "watsonx.ai chat stream rejected");
            return Err(StreamFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Fetch text-generation-capable, non-withdrawn models.
    pub async fn fetch_catalog(&self, credential: &Credential) -> Result<FoundationModelSpecs> {
        let limit = self.catalog_limit.to_string();

        let response = self
            .client
            .get(&self.endpoints.catalog)
            .query(&[
                ("version", self.catalog_version.as_str()),
                ("filters", CATALOG_FILTERS),
                ("limit", limit.as_str()),
            ])
            .header(AUTHORIZATION, credential.bearer())
            .header(ACCEPT, "application/json")
            .timeout(self.timeouts.request())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %text, "Error fetching models");
            return Err(GatewayError::upstream(status.as_u16(), text));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Parse an upstream byte stream as server-sent events and yield the `data`
/// payload of each one.
///
/// Events without data are skipped. A transport error or a malformed stream is
/// yielded as a [`StreamFailure`] and the caller stops reading.
pub fn event_data<S, E>(bytes: S) -> impl Stream<Item = std::result::Result<String, StreamFailure>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<StreamFailure> + std::fmt::Display + Send + 'static,
{
    bytes
        .eventsource()
        .filter(|event| future::ready(!matches!(event, Ok(e) if e.data.is_empty())))
        .map(|event| match event {
            Ok(event) => Ok(event.data),
            Err(EventStreamError::Transport(e)) => Err(e.into()),
            Err(other) => Err(StreamFailure::Transport(other.to_string())),
        })
}
