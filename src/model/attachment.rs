//! Attachment rows mirrored from the remote ledger.

use serde::{Deserialize, Serialize};

/// One attachment row as reported by the remote ledger for a journal id. The bytes
/// themselves are owned by the upload/download collaborator; this is only the reference.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AttachmentRecord {
    pub attachment_id: i64,
    pub journal_id: i64,
    pub filename: String,
    pub download_url: Option<String>,
    pub size_bytes: Option<i64>,
}

/// What an attachment is attached to. Only transactions are staged by this engine.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachableKind {
    Transaction,
}

serde_plain::derive_display_from_serialize!(AttachableKind);
