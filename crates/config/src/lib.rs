use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "relaychat.toml",
    "config/relaychat.toml",
    "crates/config/relaychat.toml",
    "../relaychat.toml",
    "../config/relaychat.toml",
    "../crates/config/relaychat.toml",
];

/// Secret used when nothing else is configured. Tokens signed with it are only
/// fit for local development.
pub const DEVELOPMENT_JWT_SECRET: &str = "relaychat-development-secret-change-me";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub uploads: UploadsConfig,
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    /// Origins allowed to make credentialed requests. Empty allows any origin
    /// without credentials. Only settable from a configuration file.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 4000,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://relaychat.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    #[serde(default = "AuthConfig::default_token_ttl")]
    pub token_ttl_seconds: u64,
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_secure: bool,
}

impl AuthConfig {
    const fn default_token_ttl() -> u64 {
        86_400
    }

    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            issuer: "relaychat".to_string(),
            token_ttl_seconds: Self::default_token_ttl(),
            cookie_name: "token".to_string(),
            cookie_secure: false,
        }
    }
}

/// Where inline attachments end up and how large they may be.
///
/// ```
/// use relaychat_config::UploadsConfig;
///
/// let uploads = UploadsConfig::default();
/// assert_eq!(uploads.directory, "uploads");
/// assert_eq!(uploads.max_attachment_bytes, 10 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    pub directory: String,
    pub max_attachment_bytes: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            directory: "uploads".to_string(),
            max_attachment_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    pub ping_interval_seconds: u64,
    pub outbound_buffer: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval_seconds: 30,
            outbound_buffer: 64,
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use relaychat_config::load;
///
/// std::env::remove_var("RELAYCHAT_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("http.cors_origins", defaults.http.cors_origins.clone())?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret.clone())?
        .set_default("auth.issuer", defaults.auth.issuer.clone())?
        .set_default(
            "auth.token_ttl_seconds",
            clamp_to_i64(defaults.auth.token_ttl_seconds),
        )?
        .set_default("auth.cookie_name", defaults.auth.cookie_name.clone())?
        .set_default("auth.cookie_secure", defaults.auth.cookie_secure)?
        .set_default("uploads.directory", defaults.uploads.directory.clone())?
        .set_default(
            "uploads.max_attachment_bytes",
            clamp_to_i64(defaults.uploads.max_attachment_bytes),
        )?
        .set_default(
            "websocket.ping_interval_seconds",
            clamp_to_i64(defaults.websocket.ping_interval_seconds),
        )?
        .set_default(
            "websocket.outbound_buffer",
            clamp_to_i64(defaults.websocket.outbound_buffer as u64),
        )?;

    let environment_overrides = config::Environment::with_prefix("RELAYCHAT")
        .prefix_separator("__")
        .separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("RELAYCHAT_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via RELAYCHAT_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.token_ttl_seconds > i64::MAX as u64 {
        config.auth.token_ttl_seconds = i64::MAX as u64;
    }
    if config.websocket.outbound_buffer == 0 {
        config.websocket.outbound_buffer = 1;
    }

    debug!(
        http.address = %config.http.address,
        http.port = config.http.port,
        database.url = %config.database.url,
        uploads.directory = %config.uploads.directory,
        "loaded backend configuration"
    );
    Ok(config)
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
