//! # relaychat client crate
//!
//! Talks to a relaychat server: [`ApiClient`] covers the REST routes and
//! [`ChatSession`] keeps a chat socket open, reconnecting with exponential
//! backoff when it drops.
//!
//! ```rust,ignore
//! let api = ApiClient::new("http://127.0.0.1:4000")?;
//! let session = api.login("alice", "secret").await?;
//!
//! let (commands_tx, commands_rx) = tokio::sync::mpsc::channel(32);
//! let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(32);
//! let chat = ChatSession::new(api.websocket_url()?, session.token, ReconnectPolicy::default());
//! tokio::spawn(async move { chat.run(commands_rx, events_tx).await });
//! ```

pub mod api;
pub mod backoff;
pub mod error;
pub mod session;

pub use api::{ApiClient, Person, Profile, SessionInfo};
pub use backoff::{Backoff, ReconnectPolicy};
pub use error::ClientError;
pub use session::{ChatSession, ClientCommand, ClientEvent};
pub use relaychat_chats::{InlineFile, OutgoingMessage, PresenceEntry};
