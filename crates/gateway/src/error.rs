//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relaychat_auth::AuthError;
use relaychat_chats::ChatError;
use relaychat_database::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::DatabaseError(_) | GatewayError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredential(reason) => GatewayError::AuthenticationFailed(reason),
            AuthError::InvalidCredentials => {
                GatewayError::AuthenticationFailed("invalid username or password".to_string())
            }
            AuthError::UsernameTaken => {
                GatewayError::InvalidRequest("username is already taken".to_string())
            }
            AuthError::InvalidInput(message) => GatewayError::InvalidRequest(message),
            AuthError::Database(error) => error.into(),
            AuthError::PasswordHash(error) => GatewayError::InternalError(error.to_string()),
            AuthError::TokenEncoding(error) => GatewayError::InternalError(error.to_string()),
        }
    }
}

impl From<ChatError> for GatewayError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::UnknownRecipient(id) => GatewayError::NotFound(format!("user {id}")),
            error if error.is_client_error() => GatewayError::InvalidRequest(error.to_string()),
            ChatError::PersistenceFailure(error) | ChatError::Lookup(error) => error.into(),
            error => GatewayError::InternalError(error.to_string()),
        }
    }
}

impl From<DatabaseError> for GatewayError {
    fn from(error: DatabaseError) -> Self {
        GatewayError::DatabaseError(error.to_string())
    }
}
