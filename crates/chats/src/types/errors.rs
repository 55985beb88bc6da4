//! Error types for the chat system.

use relaychat_database::DatabaseError;
use thiserror::Error;

use crate::attachment::AttachmentError;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Reasons a relay or history request can fail. A message with no live
/// recipient connection is not among them.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message has no recipient")]
    MissingRecipient,

    #[error("message needs text or an attachment")]
    EmptyMessage,

    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("attachment could not be stored: {0}")]
    AttachmentPersistFailure(#[from] AttachmentError),

    #[error("message could not be stored: {0}")]
    PersistenceFailure(#[from] DatabaseError),

    #[error("lookup failed: {0}")]
    Lookup(DatabaseError),
}

impl ChatError {
    /// Whether the sender can fix this by changing what they sent.
    pub fn is_client_error(&self) -> bool {
        match self {
            ChatError::MissingRecipient | ChatError::EmptyMessage | ChatError::UnknownRecipient(_) => true,
            ChatError::AttachmentPersistFailure(error) => error.is_client_error(),
            ChatError::PersistenceFailure(_) | ChatError::Lookup(_) => false,
        }
    }
}
