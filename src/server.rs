use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::logging::SharedLogger;
use crate::models;
use crate::proxy;
use crate::translate::openai_types::CompletionRequest;
use crate::translate::params::Mode;
use crate::upstream::UpstreamClient;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub upstream: UpstreamClient,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        // Model catalog, plus the prefixes some clients prepend
        .route("/v1/models", get(handle_list_models))
        .route("/v1/models/*model_id", get(handle_get_model))
        .route("/v1/chat/models", get(handle_list_models))
        .route("/v1/chat/models/*model_id", get(handle_get_model))
        .route("/v1/chat/chat/models", get(handle_list_models))
        .route("/v1/chat/chat/models/*model_id", get(handle_get_model))
        .route("/v1/completions", post(handle_completions))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/chat/chat/completions", post(handle_chat_completions))
        .route("/v1/n8n/chat/completions", post(handle_chat_completions))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_request(state: &AppState, body: &Bytes) -> Result<CompletionRequest, GatewayError> {
    serde_json::from_slice(body).map_err(|e| {
        state
            .logger
            .error("server", format!("Failed to parse request: {e}"));
        GatewayError::validation(format!("Invalid JSON request body: {e}"))
    })
}

async fn handle_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req = match parse_request(&state, &body) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    state.logger.info(
        "server",
        format!(
            "Completion request: model={}",
            req.model.as_deref().unwrap_or(&state.config.default_model)
        ),
    );

    let result =
        proxy::proxy_buffered(&req, Mode::LegacyCompletion, &state.upstream, &state.logger).await;
    match result {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req = match parse_request(&state, &body) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let is_streaming = req.is_streaming();

    state.logger.info(
        "server",
        format!(
            "Chat request: model={} streaming={} messages={}",
            req.model.as_deref().unwrap_or(&state.config.default_model),
            is_streaming,
            req.messages.as_ref().map_or(0, Vec::len)
        ),
    );

    if !is_streaming {
        return match proxy::proxy_buffered(&req, Mode::Chat, &state.upstream, &state.logger).await {
            Ok(resp) => Json(resp).into_response(),
            Err(e) => e.into_response(),
        };
    }

    let relay = match proxy::proxy_chat_streaming(&req, &state.upstream, &state.logger).await {
        Ok(s) => s,
        Err(e) => {
            state
                .logger
                .error("server", format!("Streaming setup error: {e}"));
            return e.into_response();
        }
    };

    let events = relay.map(|frame| -> Result<Event, Infallible> {
        Ok(Event::default().data(frame.sse_data()))
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn handle_list_models(State(state): State<Arc<AppState>>) -> Response {
    match models::list_models(&state.upstream).await {
        Ok(list) => Json(list).into_response(),
        Err(e) => {
            state.logger.error("models", e.to_string());
            e.into_response()
        }
    }
}

async fn handle_get_model(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<String>,
) -> Response {
    let model_id = model_id.trim_start_matches('/');
    match models::get_model(&state.upstream, model_id).await {
        Ok(list) => Json(list).into_response(),
        Err(e) => {
            state.logger.warn("models", e.to_string());
            e.into_response()
        }
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
