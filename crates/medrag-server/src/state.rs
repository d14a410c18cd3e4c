use std::sync::Arc;

use medrag_core::Responder;

/// Shared state handed to every request handler
pub struct AppState {
    pub responder: Arc<dyn Responder>,
}

impl AppState {
    pub fn new(responder: Arc<dyn Responder>) -> Arc<Self> {
        Arc::new(Self { responder })
    }
}
