//! Axum route handlers for the version history.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::handlers::{checkout_session, load_session, persist_history, write_document};
use crate::errors::AppError;
use crate::state::AppState;
use crate::versions::store::Version;

#[derive(Debug, Deserialize)]
pub struct SaveVersionRequest {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLabelRequest {
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct VersionListResponse {
    pub title: String,
    pub versions: Vec<Version>,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    /// Snapshot of the document as it was before the restore.
    pub snapshot_id: Uuid,
    pub document: String,
}

/// GET /api/v1/resumes/:id/versions
pub async fn handle_list_versions(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<VersionListResponse>, AppError> {
    let (_, session) = load_session(&state, resume_id).await?;
    let snapshot = session.snapshot();
    Ok(Json(VersionListResponse {
        title: snapshot.title,
        versions: snapshot.versions,
    }))
}

/// POST /api/v1/resumes/:id/versions
///
/// Snapshots the current document under a user-supplied label.
pub async fn handle_save_version(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<SaveVersionRequest>,
) -> Result<(StatusCode, Json<Version>), AppError> {
    let label = request.label.trim();
    if label.is_empty() {
        return Err(AppError::Validation("label cannot be empty".to_string()));
    }

    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;
    let version_id = session.save_version(label);
    persist_history(&state, resume_id, session).await?;

    let version = session
        .version_store()
        .get(version_id)
        .cloned()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Saved version {version_id} vanished")))?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// PATCH /api/v1/resumes/:id/versions/:version_id
pub async fn handle_update_label(
    State(state): State<AppState>,
    Path((resume_id, version_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateLabelRequest>,
) -> Result<StatusCode, AppError> {
    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;

    if !session.update_version_label(version_id, request.label.trim()) {
        return Err(AppError::NotFound(format!("Version {version_id} not found")));
    }
    persist_history(&state, resume_id, session).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/resumes/:id/versions/:version_id
///
/// Deleting an unknown version is not an error.
pub async fn handle_delete_version(
    State(state): State<AppState>,
    Path((resume_id, version_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;

    if session.delete_version(version_id) {
        persist_history(&state, resume_id, session).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/resumes/:id/versions/:version_id/restore
pub async fn handle_restore_version(
    State(state): State<AppState>,
    Path((resume_id, version_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RestoreResponse>, AppError> {
    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;

    let snapshot_id = session
        .restore_version_with(version_id, |document| {
            write_document(&state, resume_id, session, document)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Version {version_id} not found")))?;
    persist_history(&state, resume_id, session).await?;

    Ok(Json(RestoreResponse {
        snapshot_id,
        document: session.document(),
    }))
}
