use std::sync::Arc;

use sqlx::PgPool;

use crate::chat::registry::SessionRegistry;
use crate::llm_client::CompletionClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Used directly by one-shot requests (optimize); chat goes through the registry.
    pub completion: Arc<dyn CompletionClient>,
    /// Live chat sessions, one per resume.
    pub sessions: Arc<SessionRegistry>,
}
