use crate::models::chat::Message;
use crate::rag::rag::RagEngine;
use crate::server::error::ApiError;
use crate::server::stream::forward_fragments;

use axum::{
    body::Body,
    extract::{ rejection::JsonRejection, State },
    http::header::CONTENT_TYPE,
    response::{ IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use log::{ info, warn };
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RagEngine>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<RagEngine>, request_timeout: Duration) -> Self {
        Self { engine, request_timeout }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Streams the augmented completion for a conversation as raw text.
async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Message>>, JsonRejection>
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let Json(history) = payload.map_err(|rejection| {
        warn!("[{}] rejected chat request: {}", request_id, rejection.body_text());
        ApiError::InvalidRequest(rejection.body_text())
    })?;
    info!("[{}] chat request with {} message(s)", request_id, history.len());

    let deadline = Instant::now() + state.request_timeout;
    let upstream = match tokio::time::timeout_at(deadline, state.engine.stream_answer(&history)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ApiError::Timeout);
        }
    };

    let body = forward_fragments(request_id, upstream, deadline);
    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], Body::from_stream(body)).into_response())
}
