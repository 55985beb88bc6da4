//! REST API endpoints for the gateway

pub mod auth;
pub mod health;
pub mod message;
pub mod people;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::state::GatewayState;

/// Create all REST API routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/profile", get(auth::profile))
        .route("/people", get(people::list_people))
        .route("/online", get(people::online))
        .route("/messages/:user_id", get(message::conversation))
}
