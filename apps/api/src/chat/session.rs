//! Conversation State Machine: one chat per resume.
//!
//! Owns the message history, the live document, a single-slot undo buffer
//! and the version log. All operations are infallible: invalid arguments are
//! no-ops and backend failures become assistant messages.
//!
//! Concurrency: the state lock is only held for synchronous sections and is
//! never held across the completion await, so apply/dismiss/undo stay
//! available while a request is in flight. At most one completion request is
//! outstanding per session; extra sends are dropped, not queued.
//!
//! Document writes are serialised by a separate async edit lock (`lock_edits`).
//! The `*_with` variants hand the would-be document to a writer first and only
//! commit the in-memory change once that write has succeeded.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::message::{Message, MessageStatus};
use crate::chat::prompts::build_chat_prompt;
use crate::chat::response_parser::parse_response;
use crate::llm_client::CompletionClient;
use crate::models::resume::JobContext;
use crate::versions::store::{
    Version, VersionStore, LABEL_CHAT_EDIT, LABEL_EXTERNAL_EDIT, LABEL_RESTORE,
};

/// Everything a session needs from the outside world.
pub struct SessionContext {
    pub title: String,
    pub document: String,
    pub job: JobContext,
    /// When `document` was last written to the resume row.
    pub synced_at: DateTime<Utc>,
    pub completion: Arc<dyn CompletionClient>,
}

/// Result of `send_message`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Blank input, or another request was already in flight.
    Ignored,
    Replied(Message),
    /// The backend failed; the synthetic assistant message was appended.
    Failed(Message),
}

/// Consistent read of the session taken under one lock.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub title: String,
    pub document: String,
    pub messages: Vec<Message>,
    pub versions: Vec<Version>,
    pub can_undo: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct ConversationState {
    title: String,
    job: JobContext,
    messages: Vec<Message>,
    document: String,
    previous_document: Option<String>,
    versions: VersionStore,
    last_error: Option<String>,
    synced_at: DateTime<Utc>,
}

pub struct ChatSession {
    completion: Arc<dyn CompletionClient>,
    in_flight: AtomicBool,
    edit_gate: Arc<tokio::sync::Mutex<()>>,
    state: Mutex<ConversationState>,
}

impl ChatSession {
    pub fn new(context: SessionContext) -> Self {
        Self {
            completion: context.completion,
            in_flight: AtomicBool::new(false),
            edit_gate: Arc::new(tokio::sync::Mutex::new(())),
            state: Mutex::new(ConversationState {
                title: context.title,
                job: context.job,
                messages: Vec::new(),
                document: context.document,
                previous_document: None,
                versions: VersionStore::new(),
                last_error: None,
                synced_at: context.synced_at,
            }),
        }
    }

    /// Restores persisted history and versions before the session is shared.
    pub fn with_history(mut self, messages: Vec<Message>, versions: VersionStore) -> Self {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        state.messages = messages;
        state.versions = versions;
        self
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialises document and proposal mutations across requests. Sends do
    /// not take it, so edits stay available while a completion is in flight.
    pub async fn lock_edits(&self) -> OwnedMutexGuard<()> {
        self.edit_gate.clone().lock_owned().await
    }

    /// Pulls in a document written to the resume row by someone else.
    /// Rows no newer than the last sync are ignored; an adopted document is
    /// snapshot-before-write like any other replacement.
    pub fn sync_document(&self, document: &str, updated_at: DateTime<Utc>) -> Option<Uuid> {
        let mut guard = self.state();
        let state = &mut *guard;
        if updated_at <= state.synced_at {
            return None;
        }
        state.synced_at = updated_at;
        if state.document == document {
            return None;
        }
        let version_id = state
            .versions
            .save_version(&state.document, &state.title, LABEL_EXTERNAL_EDIT);
        state.document = document.to_string();
        state.previous_document = None;
        Some(version_id)
    }

    /// Records that the resume row was written at `updated_at`.
    pub fn mark_synced(&self, updated_at: DateTime<Utc>) {
        let mut state = self.state();
        if updated_at > state.synced_at {
            state.synced_at = updated_at;
        }
    }

    /// Sends a user message and waits for the assistant's reply.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(_in_flight) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Dropping message: a completion request is already in flight");
            return SendOutcome::Ignored;
        };

        let prompt = {
            let mut state = self.state();
            state.last_error = None;
            state.messages.push(Message::user(text));
            build_chat_prompt(&state.document, &state.job, &state.messages)
        };

        match self.completion.complete(&prompt).await {
            Ok(raw) => {
                let parsed = parse_response(&raw);
                if parsed.rejected {
                    warn!("Discarded an invalid document proposed by the assistant");
                }
                let (content, proposal) = parsed.into_parts();
                let reply = Message::assistant(content, proposal);
                info!(
                    "Assistant replied (message {}, actionable: {})",
                    reply.id,
                    reply.applicable_document().is_some()
                );
                self.state().messages.push(reply.clone());
                SendOutcome::Replied(reply)
            }
            Err(e) => {
                warn!("Chat completion failed: {e}");
                let reply = Message::assistant(
                    format!("Sorry, I couldn't process that request: {e}. Please try again."),
                    None,
                );
                let mut state = self.state();
                state.last_error = Some(e.to_string());
                state.messages.push(reply.clone());
                SendOutcome::Failed(reply)
            }
        }
    }

    /// Applies a pending actionable proposal. Returns the id of the
    /// pre-apply snapshot, or `None` when there was nothing to apply.
    pub fn apply_proposal(&self, message_id: Uuid) -> Option<Uuid> {
        let mut guard = self.state();
        let state = &mut *guard;

        let message = state.messages.iter_mut().find(|m| m.id == message_id)?;
        let replacement = message.applicable_document()?.to_string();

        let version_id = state
            .versions
            .save_version(&state.document, &state.title, LABEL_CHAT_EDIT);
        state.previous_document = Some(std::mem::replace(&mut state.document, replacement));
        message.status = MessageStatus::Applied;

        info!("Applied proposal from message {message_id} (snapshot {version_id})");
        Some(version_id)
    }

    /// Marks a pending proposal as dismissed. The document is untouched.
    pub fn dismiss_proposal(&self, message_id: Uuid) -> bool {
        let mut state = self.state();
        let Some(message) = state.messages.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        if message.proposal.is_none() || message.status != MessageStatus::Pending {
            return false;
        }
        message.status = MessageStatus::Dismissed;
        info!("Dismissed proposal from message {message_id}");
        true
    }

    /// Restores the document from before the last apply. Single level.
    pub fn undo(&self) -> bool {
        let mut state = self.state();
        match state.previous_document.take() {
            Some(previous) => {
                state.document = previous;
                info!("Undid last applied proposal");
                true
            }
            None => false,
        }
    }

    /// Drops all messages and the last error. Document and versions are kept.
    pub fn clear_chat(&self) {
        let mut state = self.state();
        state.messages.clear();
        state.last_error = None;
    }

    /// Snapshot-before-write path for mutations that do not come from the chat.
    /// Clears the undo buffer so undo cannot resurrect an older document over it.
    pub fn replace_document(&self, document: String, label: &str) -> Uuid {
        let mut guard = self.state();
        let state = &mut *guard;
        let version_id = state
            .versions
            .save_version(&state.document, &state.title, label);
        state.document = document;
        state.previous_document = None;
        version_id
    }

    fn version_document(&self, version_id: Uuid) -> Option<String> {
        let state = self.state();
        state.versions.get(version_id).map(|v| v.latex_snapshot.clone())
    }

    /// Restores a saved version into the live document, snapshotting first.
    pub fn restore_version(&self, version_id: Uuid) -> Option<Uuid> {
        let latex = self.version_document(version_id)?;
        let snapshot = self.replace_document(latex, LABEL_RESTORE);
        info!("Restored version {version_id} (snapshot {snapshot})");
        Some(snapshot)
    }

    /// Document `apply_proposal` would install, without applying it.
    pub fn pending_document(&self, message_id: Uuid) -> Option<String> {
        let state = self.state();
        let message = state.messages.iter().find(|m| m.id == message_id)?;
        message.applicable_document().map(str::to_string)
    }

    /// `apply_proposal`, committed only after `write` accepts the new document.
    pub async fn apply_proposal_with<E, Fut>(
        &self,
        message_id: Uuid,
        write: impl FnOnce(String) -> Fut,
    ) -> Result<Option<Uuid>, E>
    where
        Fut: Future<Output = Result<(), E>>,
    {
        let Some(document) = self.pending_document(message_id) else {
            return Ok(None);
        };
        write(document).await?;
        Ok(self.apply_proposal(message_id))
    }

    /// `undo`, committed only after `write` accepts the restored document.
    pub async fn undo_with<E, Fut>(&self, write: impl FnOnce(String) -> Fut) -> Result<bool, E>
    where
        Fut: Future<Output = Result<(), E>>,
    {
        let previous = self.state().previous_document.clone();
        let Some(previous) = previous else {
            return Ok(false);
        };
        write(previous).await?;
        Ok(self.undo())
    }

    /// `replace_document`, committed only after `write` accepts `document`.
    pub async fn replace_document_with<E, Fut>(
        &self,
        document: String,
        label: &str,
        write: impl FnOnce(String) -> Fut,
    ) -> Result<Uuid, E>
    where
        Fut: Future<Output = Result<(), E>>,
    {
        write(document.clone()).await?;
        Ok(self.replace_document(document, label))
    }

    /// `restore_version`, committed only after `write` accepts the restored document.
    pub async fn restore_version_with<E, Fut>(
        &self,
        version_id: Uuid,
        write: impl FnOnce(String) -> Fut,
    ) -> Result<Option<Uuid>, E>
    where
        Fut: Future<Output = Result<(), E>>,
    {
        let latex = self.version_document(version_id);
        let Some(latex) = latex else {
            return Ok(None);
        };
        write(latex).await?;
        Ok(self.restore_version(version_id))
    }

    /// Manually snapshots the current document.
    pub fn save_version(&self, label: &str) -> Uuid {
        let mut guard = self.state();
        let state = &mut *guard;
        state
            .versions
            .save_version(&state.document, &state.title, label)
    }

    pub fn delete_version(&self, version_id: Uuid) -> bool {
        self.state().versions.delete_version(version_id)
    }

    pub fn update_version_label(&self, version_id: Uuid, label: &str) -> bool {
        self.state().versions.update_label(version_id, label)
    }

    pub fn set_job_context(&self, job: JobContext) {
        self.state().job = job;
    }

    pub fn set_title(&self, title: &str) {
        self.state().title = title.to_string();
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn can_undo(&self) -> bool {
        self.state().previous_document.is_some()
    }

    pub fn document(&self) -> String {
        self.state().document.clone()
    }

    pub fn job_context(&self) -> JobContext {
        self.state().job.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn version_store(&self) -> VersionStore {
        self.state().versions.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            title: state.title.clone(),
            document: state.document.clone(),
            messages: state.messages.clone(),
            versions: state.versions.list(),
            can_undo: state.previous_document.is_some(),
            is_loading: self.is_loading(),
            error: state.last_error.clone(),
        }
    }
}

/// Claims the single in-flight slot; releases it on drop, whatever the exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
