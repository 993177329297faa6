pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::optimize::handlers as optimize;
use crate::state::AppState;
use crate::versions::handlers as versions;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat
        .route(
            "/api/v1/resumes/:id/chat",
            get(chat::handle_get_chat)
                .post(chat::handle_send_message)
                .delete(chat::handle_clear_chat),
        )
        .route(
            "/api/v1/resumes/:id/chat/messages/:message_id/apply",
            post(chat::handle_apply),
        )
        .route(
            "/api/v1/resumes/:id/chat/messages/:message_id/dismiss",
            post(chat::handle_dismiss),
        )
        .route("/api/v1/resumes/:id/chat/undo", post(chat::handle_undo))
        // Version history
        .route(
            "/api/v1/resumes/:id/versions",
            get(versions::handle_list_versions).post(versions::handle_save_version),
        )
        .route(
            "/api/v1/resumes/:id/versions/:version_id",
            patch(versions::handle_update_label).delete(versions::handle_delete_version),
        )
        .route(
            "/api/v1/resumes/:id/versions/:version_id/restore",
            post(versions::handle_restore_version),
        )
        // Optimize
        .route("/api/v1/resumes/:id/optimize", post(optimize::handle_optimize))
        .route(
            "/api/v1/resumes/:id/optimize/accept",
            post(optimize::handle_accept_optimization),
        )
        .with_state(state)
}
