//! REST calls against a relaychat server.

use relaychat_chats::{DeliveredMessage, ServerFrame};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Person {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub username: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

/// Thin wrapper over the server's REST routes.
///
/// The underlying client keeps a cookie store, so after `login` or
/// `register` the session cookie authenticates later calls as well.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<SessionInfo, ClientError> {
        self.credentials("register", username, password).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionInfo, ClientError> {
        self.credentials("login", username, password).await
    }

    /// Identity behind the stored session cookie.
    pub async fn profile(&self) -> Result<Profile, ClientError> {
        let response = self
            .client
            .get(format!("{}/profile", self.base_url))
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn people(&self) -> Result<Vec<Person>, ClientError> {
        let response = self
            .client
            .get(format!("{}/people", self.base_url))
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn online(&self) -> Result<ServerFrame, ClientError> {
        let response = self
            .client
            .get(format!("{}/online", self.base_url))
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn history(&self, token: &str, peer_id: &str) -> Result<Vec<DeliveredMessage>, ClientError> {
        let response = self
            .client
            .get(format!("{}/messages/{peer_id}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    /// The chat socket address matching this server's scheme.
    pub fn websocket_url(&self) -> Result<String, ClientError> {
        let socket_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(ClientError::InvalidUrl(self.base_url.clone()));
        };
        Ok(format!("{socket_base}/ws"))
    }

    async fn credentials(
        &self,
        route: &str,
        username: &str,
        password: &str,
    ) -> Result<SessionInfo, ClientError> {
        let response = self
            .client
            .post(format!("{}/{route}", self.base_url))
            .json(&Credentials { username, password })
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }
}

async fn expect_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);

    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}
