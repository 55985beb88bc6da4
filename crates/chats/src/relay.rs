//! Validates, persists, and forwards one-to-one messages.

use relaychat_auth::Identity;
use relaychat_database::{ChatMessage, MessageRepository, NewMessage, UserRepository};
use tracing::{debug, info, warn};

use crate::attachment::{AttachmentReference, AttachmentSink};
use crate::presence::PresenceRegistry;
use crate::protocol::{DeliveredMessage, OutgoingMessage, ServerFrame};
use crate::types::{ChatError, ChatResult};

#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub message: ChatMessage,
    /// Live recipient connections reached. Zero is not a failure: the message
    /// is stored and shows up in history.
    pub delivered: usize,
}

#[derive(Clone)]
pub struct MessageRelay {
    users: UserRepository,
    messages: MessageRepository,
    attachments: AttachmentSink,
    presence: PresenceRegistry,
}

impl MessageRelay {
    pub fn new(
        users: UserRepository,
        messages: MessageRepository,
        attachments: AttachmentSink,
        presence: PresenceRegistry,
    ) -> Self {
        Self {
            users,
            messages,
            attachments,
            presence,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn attachments(&self) -> &AttachmentSink {
        &self.attachments
    }

    /// Relay a message from `sender`. The sender always comes from the
    /// authenticated connection; nothing in the payload can override it.
    ///
    /// Order: validate, store attachment, persist, deliver. Nothing is sent
    /// to the recipient unless the message is already persisted.
    pub async fn relay(&self, sender: &Identity, outgoing: OutgoingMessage) -> ChatResult<RelayOutcome> {
        let OutgoingMessage {
            recipient,
            text,
            file,
        } = outgoing;

        let recipient = recipient.trim().to_owned();
        if recipient.is_empty() {
            return Err(ChatError::MissingRecipient);
        }

        let text = text.filter(|text| !text.trim().is_empty());
        if text.is_none() && file.is_none() {
            return Err(ChatError::EmptyMessage);
        }

        let recipient_exists = self
            .users
            .exists(&recipient)
            .await
            .map_err(ChatError::Lookup)?;
        if !recipient_exists {
            return Err(ChatError::UnknownRecipient(recipient));
        }

        let attachment = match &file {
            Some(file) => Some(self.attachments.store(file).await?),
            None => None,
        };

        let message = match self
            .messages
            .create(&NewMessage {
                sender_id: sender.id.clone(),
                recipient_id: recipient.clone(),
                text,
                file: attachment.as_ref().map(|a| a.stored_name.clone()),
                file_name: attachment.as_ref().map(|a| a.original_name.clone()),
            })
            .await
        {
            Ok(message) => message,
            Err(error) => {
                self.discard_orphan(attachment.as_ref()).await;
                return Err(ChatError::PersistenceFailure(error));
            }
        };

        let frame = ServerFrame::Message(DeliveredMessage::from(&message));
        let delivered = self.presence.deliver(&recipient, frame).await;
        if delivered == 0 {
            debug!(
                message = %message.public_id,
                recipient = %recipient,
                "recipient offline, message kept for history"
            );
        } else {
            info!(
                message = %message.public_id,
                sender = %sender.id,
                recipient = %recipient,
                delivered,
                "message relayed"
            );
        }

        Ok(RelayOutcome { message, delivered })
    }

    /// Messages between `viewer` and `peer`, oldest first.
    pub async fn history(&self, viewer: &Identity, peer: &str) -> ChatResult<Vec<ChatMessage>> {
        self.messages
            .conversation(&viewer.id, peer)
            .await
            .map_err(ChatError::Lookup)
    }

    async fn discard_orphan(&self, attachment: Option<&AttachmentReference>) {
        if let Some(reference) = attachment {
            warn!(stored = %reference.stored_name, "discarding attachment of unsaved message");
            self.attachments.discard(reference).await;
        }
    }
}
