//! Axum route handlers for the resume chat.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::message::Message;
use crate::chat::registry::SessionLease;
use crate::chat::session::{ChatSession, SendOutcome};
use crate::db::{fetch_resume, update_latex_source};
use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Transcript plus the flags a chat UI needs to render controls.
#[derive(Debug, Serialize)]
pub struct ChatView {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub can_undo: bool,
    pub error: Option<String>,
}

impl ChatView {
    pub fn of(session: &ChatSession) -> Self {
        let snapshot = session.snapshot();
        Self {
            messages: snapshot.messages,
            is_loading: snapshot.is_loading,
            can_undo: snapshot.can_undo,
            error: snapshot.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub result: SendOutcome,
    pub chat: ChatView,
}

/// Result of apply/dismiss/undo. `changed` is false for the silent no-op cases.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub changed: bool,
    pub document: String,
    pub version_id: Option<Uuid>,
    pub chat: ChatView,
}

// ────────────────────────────────────────────────────────────────────────────
// Shared helpers (also used by versions and optimize handlers)
// ────────────────────────────────────────────────────────────────────────────

/// Fetches the resume and checks out its session under the edit lock, with
/// any newer document from the row already adopted.
pub(crate) async fn checkout_session(
    state: &AppState,
    resume_id: Uuid,
) -> Result<(ResumeRow, SessionLease), AppError> {
    let resume = fetch_resume(&state.db, resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;
    let lease = state.sessions.checkout(&resume).await?;
    Ok((resume, lease))
}

/// Like `checkout_session`, but releases the edit lock before returning.
pub(crate) async fn load_session(
    state: &AppState,
    resume_id: Uuid,
) -> Result<(ResumeRow, Arc<ChatSession>), AppError> {
    let (resume, lease) = checkout_session(state, resume_id).await?;
    Ok((resume, lease.session))
}

/// Writes the live document to Postgres. Used as the writer for the
/// session's `*_with` operations, so a failed write leaves the session as it was.
pub(crate) async fn write_document(
    state: &AppState,
    resume_id: Uuid,
    session: &ChatSession,
    document: String,
) -> Result<(), AppError> {
    let updated_at = update_latex_source(&state.db, resume_id, &document)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;
    session.mark_synced(updated_at);
    Ok(())
}

/// Persists chat history and versions.
pub(crate) async fn persist_history(
    state: &AppState,
    resume_id: Uuid,
    session: &ChatSession,
) -> Result<(), AppError> {
    state.sessions.persist(resume_id, session).await?;
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/resumes/:id/chat
pub async fn handle_get_chat(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ChatView>, AppError> {
    let (_, session) = load_session(&state, resume_id).await?;
    Ok(Json(ChatView::of(&session)))
}

/// POST /api/v1/resumes/:id/chat
///
/// Blank text or a send while another is in flight returns `result.outcome: ignored`.
/// The send runs on its own task: if the client disconnects, the reply is
/// still appended and persisted.
pub async fn handle_send_message(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let (_, session) = load_session(&state, resume_id).await?;

    let outcome = state
        .sessions
        .clone()
        .spawn_send(resume_id, session.clone(), request.text)
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    Ok(Json(SendMessageResponse {
        result: outcome,
        chat: ChatView::of(&session),
    }))
}

/// POST /api/v1/resumes/:id/chat/messages/:message_id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    Path((resume_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ActionResponse>, AppError> {
    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;

    let version_id = session
        .apply_proposal_with(message_id, |document| {
            write_document(&state, resume_id, session, document)
        })
        .await?;
    let changed = version_id.is_some();
    if changed {
        persist_history(&state, resume_id, session).await?;
    }

    Ok(Json(action_response(session, changed, version_id)))
}

/// POST /api/v1/resumes/:id/chat/messages/:message_id/dismiss
pub async fn handle_dismiss(
    State(state): State<AppState>,
    Path((resume_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ActionResponse>, AppError> {
    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;

    let changed = session.dismiss_proposal(message_id);
    if changed {
        persist_history(&state, resume_id, session).await?;
    }

    Ok(Json(action_response(session, changed, None)))
}

/// POST /api/v1/resumes/:id/chat/undo
pub async fn handle_undo(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;

    let changed = session
        .undo_with(|document| write_document(&state, resume_id, session, document))
        .await?;

    Ok(Json(action_response(session, changed, None)))
}

/// DELETE /api/v1/resumes/:id/chat
pub async fn handle_clear_chat(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ChatView>, AppError> {
    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;

    session.clear_chat();
    persist_history(&state, resume_id, session).await?;

    Ok(Json(ChatView::of(session)))
}

fn action_response(session: &ChatSession, changed: bool, version_id: Option<Uuid>) -> ActionResponse {
    ActionResponse {
        changed,
        document: session.document(),
        version_id,
        chat: ChatView::of(session),
    }
}
