use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

const NO_MESSAGE: &str = "No message provided";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub user_message: String,
    pub bot_response: String,
    pub status: String,
    pub sources: Vec<String>,
}

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Medical Chatbot API Running",
        "endpoints": {
            "/chat": "POST - Send message",
            "/health": "GET - Server status"
        }
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected chat body: {}", rejection.body_text());
            return Err(ApiError::BadRequest(NO_MESSAGE.to_string()));
        }
    };

    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(NO_MESSAGE.to_string()))?;

    info!("Chat message received ({} chars)", message.chars().count());

    let answer = state.responder.respond(&message).await.map_err(|err| {
        error!("Failed to answer chat message: {}", err);
        ApiError::from(err)
    })?;

    Ok(Json(ChatResponse {
        user_message: message,
        bot_response: answer.text,
        status: "success".to_string(),
        sources: answer.sources,
    }))
}
