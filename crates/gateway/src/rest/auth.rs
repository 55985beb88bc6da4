//! Account and session endpoints

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use relaychat_auth::{Identity, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::credentials::authenticate;
use crate::error::GatewayResult;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub username: String,
    pub token: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.identity.id,
            username: session.identity.username,
            token: session.token,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_id: String,
    pub username: String,
}

impl From<Identity> for ProfileResponse {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.id,
            username: identity.username,
        }
    }
}

pub async fn register(
    State(state): State<Arc<GatewayState>>,
    jar: CookieJar,
    Json(request): Json<CredentialsRequest>,
) -> GatewayResult<(StatusCode, CookieJar, Json<SessionResponse>)> {
    let session = state
        .authenticator
        .register(&request.username, &request.password)
        .await?;

    let jar = jar.add(session_cookie(&state, session.token.clone()));
    Ok((StatusCode::CREATED, jar, Json(session.into())))
}

pub async fn login(
    State(state): State<Arc<GatewayState>>,
    jar: CookieJar,
    Json(request): Json<CredentialsRequest>,
) -> GatewayResult<(CookieJar, Json<SessionResponse>)> {
    let session = state
        .authenticator
        .login(&request.username, &request.password)
        .await?;

    let jar = jar.add(session_cookie(&state, session.token.clone()));
    Ok((jar, Json(session.into())))
}

/// Tokens are stateless, so logging out only clears the cookie.
pub async fn logout(State(state): State<Arc<GatewayState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar.remove(Cookie::build((state.cookie.name.clone(), "")).path("/"));
    (jar, StatusCode::NO_CONTENT)
}

pub async fn profile(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> GatewayResult<Json<ProfileResponse>> {
    let identity = authenticate(&state, &headers, None)?;
    Ok(Json(identity.into()))
}

fn session_cookie(state: &GatewayState, token: String) -> Cookie<'static> {
    // Cross-site cookies are only accepted by browsers when marked secure.
    let same_site = if state.cookie.secure {
        SameSite::None
    } else {
        SameSite::Lax
    };

    Cookie::build((state.cookie.name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(state.cookie.secure)
        .same_site(same_site)
        .build()
}
