#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{body::Body, http::Request, response::Response, Router};
use http_body_util::BodyExt;
use relaychat_auth::Session;
use relaychat_config::AppConfig;
use relaychat_database::initialize_database;
use relaychat_gateway::{create_router, GatewayState};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestContext {
    pub state: GatewayState,
    pub router: Router,
    _dir: TempDir,
}

impl TestContext {
    pub async fn new() -> TestResult<Self> {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> TestResult<Self> {
        let dir = TempDir::new()?;
        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", dir.path().join("gateway.sqlite").display());
        config.database.max_connections = 4;
        config.uploads.directory = dir.path().join("uploads").display().to_string();
        adjust(&mut config);

        let pool = initialize_database(&config.database).await?;
        let state = GatewayState::new(pool, &config);
        let router = create_router(state.clone());

        Ok(Self {
            state,
            router,
            _dir: dir,
        })
    }

    pub async fn register(&self, username: &str) -> TestResult<Session> {
        Ok(self.state.authenticator.register(username, PASSWORD).await?)
    }

    /// Serve the router on an ephemeral port for clients that need a real socket.
    pub async fn serve(&self) -> TestResult<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = self.router.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(addr)
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> TestResult<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?)
}

pub async fn body_bytes(response: Response) -> TestResult<Vec<u8>> {
    Ok(response.into_body().collect().await?.to_bytes().to_vec())
}

pub async fn body_json(response: Response) -> TestResult<Value> {
    Ok(serde_json::from_slice(&body_bytes(response).await?)?)
}
