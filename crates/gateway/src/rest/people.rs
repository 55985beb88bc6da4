//! Directory and presence endpoints

use axum::{extract::State, Json};
use relaychat_chats::ServerFrame;
use relaychat_database::User;
use serde::Serialize;
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct PersonResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
}

impl From<User> for PersonResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.public_id,
            username: user.username,
        }
    }
}

/// Every registered user, in registration order.
pub async fn list_people(
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Json<Vec<PersonResponse>>> {
    let users = state.users.list_all().await?;
    Ok(Json(users.into_iter().map(PersonResponse::from).collect()))
}

/// The same `{online: [...]}` snapshot that live connections receive.
pub async fn online(State(state): State<Arc<GatewayState>>) -> Json<ServerFrame> {
    Json(ServerFrame::Presence {
        online: state.presence().snapshot().await,
    })
}
