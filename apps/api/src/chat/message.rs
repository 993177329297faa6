//! Conversation data model: messages, their proposal lifecycle, and edit proposals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of an assistant message's proposal.
/// `Applied` and `Dismissed` are terminal; undo resets the document, not the status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Applied,
    Dismissed,
}

/// One before/after pair. `before` is empty when only a description could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub before: String,
    pub after: String,
}

impl Change {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

/// A candidate document mutation attached to an assistant message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditProposal {
    pub changes: Vec<Change>,
    /// Full validated replacement document. `None` means nothing can be applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_document: Option<String>,
}

impl EditProposal {
    /// Only proposals carrying a replacement document may surface Apply/Dismiss.
    pub fn is_actionable(&self) -> bool {
        self.replacement_document
            .as_deref()
            .is_some_and(|doc| !doc.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<EditProposal>,
    #[serde(default)]
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>, proposal: Option<EditProposal>) -> Self {
        Self::new(Role::Assistant, content.into(), proposal)
    }

    fn new(role: Role, content: String, proposal: Option<EditProposal>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            proposal,
            status: MessageStatus::Pending,
            timestamp: Utc::now(),
        }
    }

    /// The replacement document, if this message can still be applied.
    pub fn applicable_document(&self) -> Option<&str> {
        if self.role != Role::Assistant || self.status != MessageStatus::Pending {
            return None;
        }
        self.proposal
            .as_ref()
            .filter(|p| p.is_actionable())
            .and_then(|p| p.replacement_document.as_deref())
    }
}
