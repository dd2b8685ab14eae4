use std::env;
use std::sync::Arc;

use color_eyre::eyre::{eyre, WrapErr};

use crate::oauth::exchange::TokenExchanger;
use crate::oauth::state_store::StateStore;
use crate::tokens::TokenStore;

/// Default Fyers v3 endpoints.
const DEFAULT_AUTHORIZE_URL: &str = "https://api-t1.fyers.in/api/v3/generate-authcode";
const DEFAULT_TOKEN_URL: &str = "https://api-t1.fyers.in/api/v3/validate-authcode";

/// Immutable application configuration, read once at startup.
///
/// Missing credentials are a startup-fatal error, never a runtime one.
#[derive(Clone, Debug)]
pub struct FyersConfig {
    /// Fyers app id (the OAuth client identifier).
    pub app_id: String,
    /// Fyers app secret, only ever used to derive the exchange checksum.
    pub secret_key: String,
    /// Redirect URI registered with Fyers for this app.
    pub redirect_uri: String,
    /// Authorization endpoint the browser is redirected to.
    pub authorize_url: String,
    /// Token endpoint for the server-to-server code exchange.
    pub token_url: String,
    /// Directory token records are persisted under.
    pub data_dir: String,
    /// Host:port the HTTP server binds.
    pub listen_addr: String,
}

impl FyersConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let app_id = env::var("APP_ID")
            .or_else(|_| env::var("BROKER_API_KEY"))
            .map_err(|_| eyre!("Missing required environment variable APP_ID (or BROKER_API_KEY)"))?;
        let secret_key = env::var("SECRET_KEY")
            .or_else(|_| env::var("BROKER_API_SECRET"))
            .map_err(|_| {
                eyre!("Missing required environment variable SECRET_KEY (or BROKER_API_SECRET)")
            })?;
        let redirect_uri = env::var("REDIRECT_URI")
            .map_err(|_| eyre!("Missing required environment variable REDIRECT_URI"))?;

        let authorize_url = env::var("FYERS_AUTHORIZE_URL")
            .unwrap_or_else(|_| DEFAULT_AUTHORIZE_URL.to_string());
        let token_url =
            env::var("FYERS_TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string());

        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());

        Ok(Self {
            app_id,
            secret_key,
            redirect_uri,
            authorize_url,
            token_url,
            data_dir,
            listen_addr: format!("{}:{}", host, port),
        })
    }

    /// App id with everything past the first five characters starred out,
    /// safe to write to logs.
    pub fn masked_app_id(&self) -> String {
        if self.app_id.len() > 5 {
            format!("{}{}", &self.app_id[..5], "*".repeat(self.app_id.len() - 5))
        } else {
            self.app_id.clone()
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: FyersConfig,
    pub state_store: Arc<StateStore>,
    pub token_store: TokenStore,
    pub exchanger: TokenExchanger,
}

impl AppState {
    pub async fn from_env() -> color_eyre::Result<Self> {
        let config = FyersConfig::from_env()?;
        Self::new(config).await
    }

    pub async fn new(config: FyersConfig) -> color_eyre::Result<Self> {
        let token_store = TokenStore::new(format!("{}/tokens", config.data_dir));
        token_store
            .ensure_dir()
            .await
            .wrap_err("Failed to create token storage directory")?;

        // The provider is external and can hang. Bound the exchange call so a
        // stuck callback surfaces as a network error instead of pinning the
        // handler forever.
        let http = reqwest::ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(10))
            .use_rustls_tls()
            .build()
            .wrap_err("Failed to build HTTP client")?;

        let exchanger = TokenExchanger::new(http, config.token_url.clone());

        Ok(Self {
            config,
            state_store: Arc::new(StateStore::new()),
            token_store,
            exchanger,
        })
    }
}
