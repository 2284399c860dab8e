//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use datagate_core::{GatewayError, GatewayResult};
use url::Url;

/// Credentials for password login against the gateway.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub tenant_id: i64,
}

/// Configuration for [`GatewayClient`](crate::GatewayClient).
///
/// Construct through [`GatewayConfig::builder`]; the builder validates the
/// gateway url and fills in defaults for everything else.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base url of the gateway, without a trailing slash.
    pub gateway_url: String,
    /// Login credentials. Optional at construction; operations that need a
    /// fresh login fail with an authentication error when absent.
    pub credentials: Option<Credentials>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retries after the initial attempt.
    pub max_retries: usize,
    /// First backoff delay; doubles per retry, capped at 30s.
    pub base_backoff: Duration,
    /// Refresh the token proactively this long before expiry.
    pub refresh_lead_time: Duration,
    /// Treat the token as expired this long before its actual expiry.
    pub expiry_buffer: Duration,
    /// Where to persist the token between processes. `None` disables caching.
    pub cache_path: Option<PathBuf>,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl GatewayConfig {
    /// Start building a configuration for the given gateway url.
    pub fn builder(gateway_url: impl Into<String>) -> GatewayConfigBuilder {
        GatewayConfigBuilder::new(gateway_url)
    }
}

/// Builder for [`GatewayConfig`].
#[derive(Debug)]
pub struct GatewayConfigBuilder {
    gateway_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
    max_retries: usize,
    base_backoff: Duration,
    refresh_lead_time: Duration,
    expiry_buffer: Duration,
    cache_path: Option<PathBuf>,
    use_default_cache: bool,
    user_agent: String,
}

impl GatewayConfigBuilder {
    fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            credentials: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            refresh_lead_time: Duration::from_secs(300),
            expiry_buffer: Duration::from_secs(60),
            cache_path: None,
            use_default_cache: true,
            user_agent: concat!("datagate/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }

    /// Set login credentials.
    #[must_use]
    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        tenant_id: i64,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
            tenant_id,
        });
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries after the initial attempt. Zero disables retrying.
    #[must_use]
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    #[must_use]
    pub fn refresh_lead_time(mut self, lead: Duration) -> Self {
        self.refresh_lead_time = lead;
        self
    }

    #[must_use]
    pub fn expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    /// Persist the token at a specific path instead of the default
    /// `~/.datagate/token.json`.
    #[must_use]
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self.use_default_cache = false;
        self
    }

    /// Disable on-disk token caching entirely.
    #[must_use]
    pub fn disable_cache(mut self) -> Self {
        self.cache_path = None;
        self.use_default_cache = false;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Validate and assemble the configuration.
    ///
    /// # Errors
    /// Returns [`GatewayError::Validation`] if the gateway url is not an
    /// absolute http(s) url.
    pub fn build(self) -> GatewayResult<GatewayConfig> {
        let gateway_url = self.gateway_url.trim_end_matches('/').to_owned();
        let parsed = Url::parse(&gateway_url).map_err(|err| {
            GatewayError::Validation(format!("invalid gateway url '{gateway_url}': {err}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayError::Validation(format!(
                "gateway url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let cache_path = if self.use_default_cache {
            default_cache_path()
        } else {
            self.cache_path
        };

        Ok(GatewayConfig {
            gateway_url,
            credentials: self.credentials,
            timeout: self.timeout,
            max_retries: self.max_retries,
            base_backoff: self.base_backoff,
            refresh_lead_time: self.refresh_lead_time,
            expiry_buffer: self.expiry_buffer,
            cache_path,
            user_agent: self.user_agent,
        })
    }
}

fn default_cache_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".datagate").join("token.json"))
}
