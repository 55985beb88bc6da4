//! Shared application state for the gateway

use sqlx::SqlitePool;
use relaychat_auth::Authenticator;
use relaychat_chats::{AttachmentSink, MessageRelay, PresenceRegistry};
use relaychat_config::{AppConfig, WebSocketConfig};
use relaychat_database::{MessageRepository, UserRepository};

/// How the session cookie is written and read.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    /// Registration, login and token resolution
    pub authenticator: Authenticator,
    /// User directory
    pub users: UserRepository,
    /// Message relay, which also owns the presence registry and attachment sink
    pub relay: MessageRelay,
    pub cookie: CookieSettings,
    pub websocket: WebSocketConfig,
    pub cors_origins: Vec<String>,
}

impl GatewayState {
    pub fn new(pool: SqlitePool, config: &AppConfig) -> Self {
        let users = UserRepository::new(pool.clone());
        let relay = MessageRelay::new(
            users.clone(),
            MessageRepository::new(pool.clone()),
            AttachmentSink::from_config(&config.uploads),
            PresenceRegistry::new(),
        );

        Self {
            authenticator: Authenticator::new(pool.clone(), &config.auth),
            pool,
            users,
            relay,
            cookie: CookieSettings {
                name: config.auth.cookie_name.clone(),
                secure: config.auth.cookie_secure,
            },
            websocket: config.websocket.clone(),
            cors_origins: config.http.cors_origins.clone(),
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        self.relay.presence()
    }

    pub fn attachments(&self) -> &AttachmentSink {
        self.relay.attachments()
    }
}
