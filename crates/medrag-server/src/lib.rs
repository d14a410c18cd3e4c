//! HTTP interface for the medical chatbot
//!
//! Routes:
//! - `GET /` describes the API
//! - `GET /health` reports liveness
//! - `POST /chat` answers `{"message": "..."}`

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;


use std::sync::Arc;
use tokio::net::TcpListener;

pub use error::ApiError;
pub use handlers::{ChatRequest, ChatResponse};
pub use router::router;
pub use state::AppState;

/// Serve the API on an already bound listener until the process stops
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on {}", addr);
    }
    axum::serve(listener, router(state)).await
}
