//! Whole-document optimization against the target job.
//!
//! Flow: job context check → prompt → completion → response_parser (same
//! grammar and validation as chat) → proposal. Nothing is mutated here.

use serde::Serialize;
use tracing::info;

use crate::chat::message::Change;
use crate::chat::prompts::job_context_block;
use crate::chat::response_parser::parse_response;
use crate::errors::AppError;
use crate::llm_client::prompts::{LATEX_RULES, RESPONSE_FORMAT};
use crate::llm_client::CompletionClient;
use crate::models::resume::JobContext;
use crate::optimize::prompts::{OPTIMIZE_CLOSING, OPTIMIZE_FRAMING};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeProposal {
    pub message: String,
    pub changes: Vec<Change>,
    /// Validated document ready to accept; `None` when the model's output was rejected.
    pub replacement_document: Option<String>,
}

pub async fn optimize_document(
    client: &dyn CompletionClient,
    document: &str,
    job: &JobContext,
) -> Result<OptimizeProposal, AppError> {
    let job_block = match (job.job_description(), job_context_block(job)) {
        (Some(_), Some(block)) => block,
        _ => {
            return Err(AppError::Validation(
                "A job description is required to optimize the resume".to_string(),
            ))
        }
    };

    let prompt = build_optimize_prompt(document, &job_block);
    let raw = client
        .complete(&prompt)
        .await
        .map_err(|e| AppError::Llm(format!("Optimization failed: {e}")))?;

    let parsed = parse_response(&raw);
    info!(
        "Optimization produced {} change(s), document accepted: {}",
        parsed.changes.len(),
        parsed.replacement_document.is_some()
    );

    Ok(OptimizeProposal {
        message: parsed.message,
        changes: parsed.changes,
        replacement_document: parsed.replacement_document,
    })
}

/// Sections are appended in order, never substituted into a template.
fn build_optimize_prompt(document: &str, job_block: &str) -> String {
    let mut prompt = String::with_capacity(document.len() + job_block.len() + 2048);

    prompt.push_str(OPTIMIZE_FRAMING);
    prompt.push_str("\n\n");
    prompt.push_str(job_block);
    prompt.push_str("\nCURRENT LATEX RESUME:\n");
    prompt.push_str(document);
    prompt.push_str("\n\n");
    prompt.push_str(RESPONSE_FORMAT);
    prompt.push_str("\n\n");
    prompt.push_str(LATEX_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(OPTIMIZE_CLOSING);

    prompt
}
