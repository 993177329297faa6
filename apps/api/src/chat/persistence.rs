//! Chat history and version persistence.
//!
//! Stored messages drop `replacement_document` to keep entries small; a
//! reloaded message keeps its text, changes and status but can no longer be
//! applied. Pruning happens here at the serialization boundary only.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::chat::message::{Change, EditProposal, Message, MessageStatus, Role};
use crate::kv::{KvError, KvStore};
use crate::versions::store::{Version, VersionStore};

pub const MAX_STORED_MESSAGES: usize = 50;
pub const MESSAGE_RETENTION_DAYS: i64 = 7;

pub fn chat_key(resume_id: Uuid) -> String {
    format!("resume:{resume_id}:chat")
}

pub fn versions_key(resume_id: Uuid) -> String {
    format!("resume:{resume_id}:versions")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for StoredMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content.clone(),
            changes: message
                .proposal
                .as_ref()
                .map(|p| p.changes.clone())
                .unwrap_or_default(),
            status: message.status,
            timestamp: message.timestamp,
        }
    }
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        let proposal = (!stored.changes.is_empty()).then(|| EditProposal {
            changes: stored.changes,
            replacement_document: None,
        });
        Message {
            id: stored.id,
            role: stored.role,
            content: stored.content,
            proposal,
            status: stored.status,
            timestamp: stored.timestamp,
        }
    }
}

/// Converts messages for storage: drops anything older than the retention
/// window, then keeps the most recent `MAX_STORED_MESSAGES`.
pub fn to_stored(messages: &[Message], now: DateTime<Utc>) -> Vec<StoredMessage> {
    let cutoff = now - Duration::days(MESSAGE_RETENTION_DAYS);
    let recent: Vec<&Message> = messages.iter().filter(|m| m.timestamp >= cutoff).collect();
    let start = recent.len().saturating_sub(MAX_STORED_MESSAGES);
    recent[start..]
        .iter()
        .map(|m| StoredMessage::from(*m))
        .collect()
}

pub async fn save_history(
    store: &dyn KvStore,
    resume_id: Uuid,
    messages: &[Message],
    versions: &VersionStore,
) -> Result<(), KvError> {
    let stored = to_stored(messages, Utc::now());
    store
        .set(&chat_key(resume_id), &serde_json::to_string(&stored)?)
        .await?;
    store
        .set(&versions_key(resume_id), &serde_json::to_string(versions)?)
        .await?;
    Ok(())
}

/// Loads history and versions. Corrupt entries are logged and treated as empty.
pub async fn load_history(
    store: &dyn KvStore,
    resume_id: Uuid,
) -> Result<(Vec<Message>, VersionStore), KvError> {
    let messages = match store.get(&chat_key(resume_id)).await? {
        Some(raw) => match serde_json::from_str::<Vec<StoredMessage>>(&raw) {
            Ok(stored) => stored.into_iter().map(Message::from).collect(),
            Err(e) => {
                warn!("Discarding corrupt chat history for resume {resume_id}: {e}");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let versions = match store.get(&versions_key(resume_id)).await? {
        Some(raw) => match serde_json::from_str::<Vec<Version>>(&raw) {
            Ok(versions) => VersionStore::from_versions(versions),
            Err(e) => {
                warn!("Discarding corrupt version history for resume {resume_id}: {e}");
                VersionStore::new()
            }
        },
        None => VersionStore::new(),
    };

    Ok((messages, versions))
}
