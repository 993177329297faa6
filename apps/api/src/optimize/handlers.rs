//! Axum route handlers for AI optimization.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::handlers::{checkout_session, load_session, persist_history, write_document};
use crate::chat::response_parser::clean_document;
use crate::chat::validator::validate_document;
use crate::errors::AppError;
use crate::optimize::optimizer::{optimize_document, OptimizeProposal};
use crate::state::AppState;
use crate::versions::store::LABEL_OPTIMIZE;

#[derive(Debug, Deserialize)]
pub struct AcceptOptimizationRequest {
    pub latex: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptOptimizationResponse {
    /// Snapshot of the document as it was before the optimization was accepted.
    pub snapshot_id: Uuid,
    pub document: String,
}

/// POST /api/v1/resumes/:id/optimize
///
/// Returns a proposal only; the live document is untouched.
pub async fn handle_optimize(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<OptimizeProposal>, AppError> {
    let (resume, session) = load_session(&state, resume_id).await?;
    let proposal = optimize_document(
        state.completion.as_ref(),
        &session.document(),
        &resume.job_context(),
    )
    .await?;
    Ok(Json(proposal))
}

/// POST /api/v1/resumes/:id/optimize/accept
pub async fn handle_accept_optimization(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<AcceptOptimizationRequest>,
) -> Result<Json<AcceptOptimizationResponse>, AppError> {
    let latex = clean_document(&request.latex);
    let verdict = validate_document(&latex);
    if !verdict.is_accepted() {
        return Err(AppError::Validation(format!(
            "Optimized LaTeX is not a complete document ({verdict:?})"
        )));
    }

    let (_, lease) = checkout_session(&state, resume_id).await?;
    let session = &lease.session;
    let snapshot_id = session
        .replace_document_with(latex, LABEL_OPTIMIZE, |document| {
            write_document(&state, resume_id, session, document)
        })
        .await?;
    persist_history(&state, resume_id, session).await?;

    Ok(Json(AcceptOptimizationResponse {
        snapshot_id,
        document: session.document(),
    }))
}
