//! Client configuration read from the environment

use std::time::Duration;

use koyeb_core::api::{ApiError, ApiResult};

/// Default API endpoint
pub const DEFAULT_API_URL: &str = "https://app.koyeb.com";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings needed to talk to the Koyeb API
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL, without trailing slash
    pub api_url: String,
    /// Personal or organization API token
    pub token: String,
    /// Log request and response bodies at debug level
    pub debug: bool,
    pub user_agent: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("debug", &self.debug)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            debug: false,
            user_agent: default_user_agent(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build a configuration from `KOYEB_TOKEN`, `KOYEB_API_URL` and `KOYEB_DEBUG`
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let token = lookup("KOYEB_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::Configuration("Empty KOYEB_TOKEN environment variable".to_string())
            })?;

        let mut config = Self::new(token);
        if let Some(url) = lookup("KOYEB_API_URL").filter(|u| !u.is_empty()) {
            config = config.with_api_url(url);
        }
        config.debug = lookup("KOYEB_DEBUG").is_some_and(|v| v == "true");
        Ok(config)
    }

    /// Set the API URL. A bare host such as `app.koyeb.com` gets `https://`.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else {
            format!("https://{}", url)
        };
        self.api_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

fn default_user_agent() -> String {
    format!("terraform-provider-koyeb/{}", env!("CARGO_PKG_VERSION"))
}
