use crate::error::{GatewayError, Result};
use crate::logging::{LogLevel, SharedLogger};
use crate::translate::openai_types::CompletionRequest;
use crate::translate::params::Mode;
use crate::translate::request::{translate, translate_chat};
use crate::translate::response::{to_openai_response, OpenAIResponse};
use crate::translate::streaming::{RelayFrame, RelayState, StreamFailure, StreamRelay};
use crate::translate::watsonx_types::UpstreamPayload;
use crate::upstream::{event_data, UpstreamClient};

use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// Outcome of a streaming chat request: OpenAI chunks followed by `[DONE]`.
pub type RelayStream = Pin<Box<dyn Stream<Item = RelayFrame> + Send>>;

/// Forward a buffered request: legacy completions through `text/generation`,
/// chat completions through `text/chat`.
///
/// `stream=true` on a legacy completion is accepted but ignored.
pub async fn proxy_buffered(
    req: &CompletionRequest,
    mode: Mode,
    upstream: &UpstreamClient,
    logger: &SharedLogger,
) -> Result<OpenAIResponse> {
    warn_if_tool_calling(req, logger);
    if mode == Mode::LegacyCompletion && req.is_streaming() {
        logger.debug("proxy", "stream=true ignored for legacy completion");
    }

    let payload = translate(req, mode, upstream.context())?;
    let credential = fetch_credential(upstream, logger).await?;

    match &payload {
        UpstreamPayload::Generation(g) => {
            logger.info("proxy", format!("POST text/generation model={}", g.model_id));
        }
        UpstreamPayload::Chat(c) => logger.info(
            "proxy",
            format!(
                "POST text/chat model={} messages={}",
                c.model_id,
                c.messages.len()
            ),
        ),
    }

    let raw = upstream
        .call_buffered(&payload, &credential)
        .await
        .map_err(|e| log_upstream_error(logger, e))?;

    let resp = to_openai_response(&raw, payload.model_id());

    logger.info(
        "proxy",
        format!(
            "Completed: prompt={} completion={} tokens",
            resp.usage().prompt_tokens,
            resp.usage().completion_tokens
        ),
    );

    Ok(resp)
}

/// Forward a streaming chat completion through `text/chat_stream`.
///
/// Only a failure to obtain a token is returned as an error. Once this returns,
/// every upstream failure is reported in-band by the relay. The upstream
/// connection is opened when the returned stream is first polled.
pub async fn proxy_chat_streaming(
    req: &CompletionRequest,
    upstream: &UpstreamClient,
    logger: &SharedLogger,
) -> Result<RelayStream> {
    warn_if_tool_calling(req, logger);

    let payload = translate_chat(req, upstream.context());
    let credential = fetch_credential(upstream, logger).await?;

    logger.info(
        "proxy",
        format!(
            "POST text/chat_stream model={} messages={} (streaming)",
            payload.model_id,
            payload.messages.len()
        ),
    );

    let relay = StreamRelay::new(&payload.model_id);
    let upstream = upstream.clone();

    let events = async_stream::stream! {
        match upstream.open_chat_stream(&payload, &credential).await {
            Ok(response) => {
                let inner = event_data(response.bytes_stream());
                tokio::pin!(inner);
                while let Some(item) = inner.next().await {
                    yield item;
                }
            }
            Err(failure) => {
                yield Err(failure);
            }
        }
    };

    Ok(Box::pin(relay_events(relay, events, logger.clone())))
}

/// Drive a [`StreamRelay`] over upstream event payloads.
///
/// The role chunk is emitted before `events` is first polled. Dropping the
/// returned stream drops `events`, which closes the upstream connection.
pub fn relay_events<S>(
    mut relay: StreamRelay,
    events: S,
    logger: SharedLogger,
) -> impl Stream<Item = RelayFrame> + Send + 'static
where
    S: Stream<Item = std::result::Result<String, StreamFailure>> + Send + 'static,
{
    async_stream::stream! {
        let mut guard = DisconnectGuard::new(logger.clone(), relay.id());

        for frame in relay.start() {
            yield frame;
        }

        tokio::pin!(events);

        while relay.state() != RelayState::Done {
            let item = match events.next().await {
                Some(item) => item,
                None => break,
            };

            let frames = match item {
                Ok(data) => relay.process_data(&data),
                Err(failure) => {
                    log_stream_failure(&logger, &failure);
                    relay.fail(&failure)
                }
            };

            for frame in frames {
                yield frame;
            }
        }

        for frame in relay.finish() {
            yield frame;
        }

        guard.complete();
        logger.info(
            "stream",
            format!("Stream completed id={} chars={}", relay.id(), relay.accumulated().len()),
        );
    }
}

/// Logs a client disconnect when dropped before the stream reached `[DONE]`.
struct DisconnectGuard {
    logger: SharedLogger,
    stream_id: String,
    completed: bool,
}

impl DisconnectGuard {
    fn new(logger: SharedLogger, stream_id: &str) -> Self {
        Self {
            logger,
            stream_id: stream_id.to_string(),
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.logger.warn(
                "stream",
                format!(
                    "Client disconnected before completion id={}, upstream connection dropped",
                    self.stream_id
                ),
            );
        }
    }
}

async fn fetch_credential(
    upstream: &UpstreamClient,
    logger: &SharedLogger,
) -> Result<crate::token::Credential> {
    upstream.tokens().get_token().await.map_err(|e| {
        logger.error("auth", e.to_string());
        e
    })
}

fn warn_if_tool_calling(req: &CompletionRequest, logger: &SharedLogger) {
    if req.requests_tool_calling() {
        logger.warn(
            "proxy",
            "Tool calling requested but not supported by watsonx.ai, tool fields dropped",
        );
    }
}

fn log_upstream_error(logger: &SharedLogger, err: GatewayError) -> GatewayError {
    match &err {
        GatewayError::Upstream { status, body } => logger.log_with_context(
            LogLevel::Error,
            "proxy",
            format!("watsonx.ai returned status {status}"),
            serde_json::json!({ "status": status, "body": body }),
        ),
        other => logger.error("proxy", other.to_string()),
    }
    err
}

fn log_stream_failure(logger: &SharedLogger, failure: &StreamFailure) {
    let context = match failure {
        StreamFailure::Timeout => serde_json::json!({ "kind": "timeout" }),
        StreamFailure::Status { status, body } => {
            serde_json::json!({ "kind": "status", "status": status, "body": body })
        }
        StreamFailure::Transport(message) => {
            serde_json::json!({ "kind": "transport", "message": message })
        }
    };
    logger.log_with_context(LogLevel::Error, "stream", failure.to_string(), context);
}
