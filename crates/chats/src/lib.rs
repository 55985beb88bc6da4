//! # relaychat chats crate
//!
//! The real-time core of relaychat: the registry of live connections and the
//! presence broadcasts it drives, the relay that persists and forwards
//! one-to-one messages, and the sink that stores inline attachments.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relaychat_chats::{AttachmentSink, MessageRelay, PresenceRegistry};
//!
//! let presence = PresenceRegistry::new();
//! let relay = MessageRelay::new(users, messages, AttachmentSink::from_config(&uploads), presence);
//! let outcome = relay.relay(&sender, outgoing).await?;
//! ```

pub mod attachment;
pub mod presence;
pub mod protocol;
pub mod relay;
pub mod types;

pub use attachment::{AttachmentError, AttachmentReference, AttachmentSink};
pub use presence::{BusyGuard, ConnectionHandle, PresenceRegistry};
pub use protocol::{
    ClientFrame, DeliveredMessage, InlineFile, OutgoingMessage, PresenceEntry, ServerFrame,
};
pub use relay::{MessageRelay, RelayOutcome};
pub use types::{ChatError, ChatResult};
