//! # relaychat gateway crate
//!
//! HTTP and WebSocket surface of relaychat. Routes requests to the auth and
//! chats crates and serves stored attachments.
//!
//! ## Routes
//!
//! - `POST /register`, `POST /login`, `POST /logout`, `GET /profile`
//! - `GET /people`, `GET /online`, `GET /messages/:user_id`
//! - `GET /uploads/<name>` for stored attachments
//! - `GET /ws` for the chat socket
//! - `GET /health`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relaychat_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::new(pool, &config);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:4000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod credentials;
pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use state::{CookieSettings, GatewayState};

use axum::{middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let uploads = ServeDir::new(state.attachments().root());
    let cors = middleware::create_cors_middleware(&state.cors_origins);
    let arc_state = Arc::new(state);

    Router::new()
        .merge(rest::create_rest_routes().with_state(arc_state.clone()))
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        .nest_service("/uploads", uploads)
        .layer(cors)
        .layer(middleware::create_trace_middleware())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
