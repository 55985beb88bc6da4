//! Message entity definitions

use serde::Serialize;

/// A persisted one-to-one message. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub text: Option<String>,
    /// Stored attachment name, resolvable under the uploads route.
    pub file: Option<String>,
    /// Name the sender gave the attachment.
    pub file_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub sender_id: String,
    pub recipient_id: String,
    pub text: Option<String>,
    pub file: Option<String>,
    pub file_name: Option<String>,
}
