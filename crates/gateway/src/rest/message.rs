//! Conversation history

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use relaychat_chats::DeliveredMessage;
use std::sync::Arc;

use crate::credentials::authenticate;
use crate::error::GatewayResult;
use crate::state::GatewayState;

/// Messages exchanged between the caller and `user_id`, oldest first.
pub async fn conversation(
    State(state): State<Arc<GatewayState>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> GatewayResult<Json<Vec<DeliveredMessage>>> {
    let identity = authenticate(&state, &headers, None)?;
    let messages = state.relay.history(&identity, &user_id).await?;

    Ok(Json(messages.iter().map(DeliveredMessage::from).collect()))
}
