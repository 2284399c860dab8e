//! Auth session: login, proactive refresh, and token caching.
//!
//! The session keeps at most one valid [`TokenState`] in memory and a copy in
//! the configured store. Concurrent callers share a single refresh guard, so
//! however many tasks ask for a token at once, at most one login or refresh
//! request is in flight.

use std::sync::Arc;

use datagate_core::{GatewayError, GatewayResult, TokenState, UserProfile};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::http::HttpTransport;
use crate::store::TokenStore;

/// Lifetime assumed for tokens whose JWT carries no decodable expiry.
const LOGIN_FALLBACK_LIFETIME_SECS: i64 = 8 * 60 * 60;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody<'a> {
    user_name: &'a str,
    password: &'a str,
    tenant_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    access_token: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Payload of the login/refresh envelope. Token fields use hyphenated names
/// on the wire.
#[derive(Deserialize)]
struct AuthData {
    #[serde(rename = "access-token")]
    access_token: String,
    #[serde(rename = "refresh-token")]
    refresh_token: Option<String>,
    #[serde(rename = "userData")]
    user: Option<UserProfile>,
    #[serde(default, deserialize_with = "roles_from_any")]
    roles: Vec<String>,
}

/// The gateway returns roles as either an array or one comma-separated
/// string. Normalize both to a trimmed, non-empty list.
fn roles_from_any<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RolesWire {
        List(Vec<String>),
        Joined(String),
    }

    let roles = match Option::<RolesWire>::deserialize(deserializer)? {
        Some(RolesWire::List(items)) => items,
        Some(RolesWire::Joined(joined)) => joined.split(',').map(str::to_owned).collect(),
        None => Vec::new(),
    };
    Ok(roles.into_iter().map(|r| r.trim().to_owned()).filter(|r| !r.is_empty()).collect())
}

/// Manages the token lifecycle for one gateway.
pub struct AuthSession {
    config: GatewayConfig,
    transport: HttpTransport,
    store: Arc<dyn TokenStore>,
    token: RwLock<Option<TokenState>>,
    /// Serializes the login/refresh slow path. Held only while deciding and
    /// performing a token replacement, never on the fast path.
    refresh_guard: Mutex<()>,
}

impl AuthSession {
    pub fn new(config: GatewayConfig, transport: HttpTransport, store: Arc<dyn TokenStore>) -> Self {
        Self { config, transport, store, token: RwLock::new(None), refresh_guard: Mutex::new(()) }
    }

    /// Get an access token that is valid for at least the configured refresh
    /// lead time, logging in or refreshing as needed.
    ///
    /// # Errors
    /// Returns [`GatewayError::Authentication`] when no valid token can be
    /// obtained (missing credentials, rejected login, failed refresh with a
    /// failed fallback login).
    pub async fn get_valid_token(&self) -> GatewayResult<String> {
        let lead = self.config.refresh_lead_time.as_secs() as i64;

        if let Some(token) = self.usable_token(lead).await {
            return Ok(token);
        }

        let _guard = self.refresh_guard.lock().await;

        // Another caller may have replaced the token while we waited.
        if let Some(token) = self.usable_token(lead).await {
            return Ok(token);
        }

        // First use in this process: a cached token may still be good.
        if self.token.read().await.is_none() {
            if let Some(cached) = self.load_cached_token(lead).await {
                let access = cached.access_token.clone();
                *self.token.write().await = Some(cached);
                return Ok(access);
            }
        }

        let can_refresh = {
            let token = self.token.read().await;
            token.as_ref().is_some_and(|t| t.refresh_token.is_some())
        };

        let state = if can_refresh {
            match self.refresh_locked().await {
                Ok(state) => state,
                Err(err) => {
                    warn!(error = %err, "token refresh failed, falling back to login");
                    self.login().await?
                }
            }
        } else {
            self.login().await?
        };

        Ok(state.access_token)
    }

    /// Authenticate against the gateway.
    ///
    /// Unless `force` is set, a still-valid in-memory or cached token is
    /// reused without a network call.
    ///
    /// # Errors
    /// Returns [`GatewayError::Authentication`] if credentials are missing or
    /// the gateway rejects them.
    pub async fn authenticate(&self, force: bool) -> GatewayResult<String> {
        let buffer = self.config.expiry_buffer.as_secs() as i64;

        if !force {
            if let Some(token) = self.usable_token(buffer).await {
                return Ok(token);
            }
        }

        let _guard = self.refresh_guard.lock().await;

        if !force {
            if let Some(token) = self.usable_token(buffer).await {
                return Ok(token);
            }
            if let Some(cached) = self.load_cached_token(buffer).await {
                let access = cached.access_token.clone();
                *self.token.write().await = Some(cached);
                return Ok(access);
            }
        }

        let state = self.login().await?;
        Ok(state.access_token)
    }

    /// Exchange the held refresh token for a new token pair.
    ///
    /// # Errors
    /// Returns [`GatewayError::Authentication`] when no refresh token is held
    /// or the gateway rejects the exchange.
    pub async fn refresh(&self) -> GatewayResult<String> {
        let _guard = self.refresh_guard.lock().await;
        let state = self.refresh_locked().await?;
        Ok(state.access_token)
    }

    /// Drop the in-memory token and clear the cache. Idempotent.
    pub async fn logout(&self) {
        *self.token.write().await = None;
        if let Err(err) = self.store.clear().await {
            warn!(error = %err, "failed to clear token cache on logout");
        }
        info!("logged out");
    }

    /// True when a token is held and not past its hard-expiry buffer.
    pub async fn is_authenticated(&self) -> bool {
        let buffer = self.config.expiry_buffer.as_secs() as i64;
        self.token.read().await.as_ref().is_some_and(|t| !t.is_expired(buffer))
    }

    /// Profile of the logged-in user, when the gateway returned one.
    pub async fn current_user(&self) -> Option<UserProfile> {
        self.token.read().await.as_ref().and_then(|t| t.user.clone())
    }

    /// Roles granted to the logged-in user.
    pub async fn current_roles(&self) -> Vec<String> {
        self.token.read().await.as_ref().map(|t| t.roles.clone()).unwrap_or_default()
    }

    /// Snapshot of the current token state.
    pub async fn token_state(&self) -> Option<TokenState> {
        self.token.read().await.clone()
    }

    /// Fast path: clone the access token if the held one is good for at
    /// least `margin_seconds` more.
    async fn usable_token(&self, margin_seconds: i64) -> Option<String> {
        let token = self.token.read().await;
        token
            .as_ref()
            .filter(|t| !t.is_expired(margin_seconds))
            .map(|t| t.access_token.clone())
    }

    async fn load_cached_token(&self, margin_seconds: i64) -> Option<TokenState> {
        match self.store.load().await {
            Ok(Some(token)) if !token.is_expired(margin_seconds) => {
                debug!("reusing cached token");
                Some(token)
            }
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "token cache load failed");
                None
            }
        }
    }

    /// POST `/auth/login` and install the resulting token state.
    async fn login(&self) -> GatewayResult<TokenState> {
        let creds = self.config.credentials.as_ref().ok_or_else(|| {
            GatewayError::Authentication(
                "username, password, and tenant id are required to log in".into(),
            )
        })?;

        let body = LoginBody {
            user_name: &creds.username,
            password: &creds.password,
            tenant_id: creds.tenant_id,
        };
        let url = format!("{}/auth/login", self.config.gateway_url);
        debug!(username = %creds.username, tenant_id = creds.tenant_id, "logging in");

        let response = self
            .transport
            .send(self.transport.request(Method::POST, &url).json(&body))
            .await
            .map_err(|err| auth_failure("login", err))?;

        let envelope: Envelope<AuthData> = response
            .json()
            .await
            .map_err(|err| GatewayError::Authentication(format!("malformed login response: {err}")))?;

        let data = envelope.data;
        let state = TokenState::with_fallback_lifetime(
            data.access_token,
            data.refresh_token,
            Some(LOGIN_FALLBACK_LIFETIME_SECS),
        )?
        .with_user(data.user)
        .with_roles(data.roles);

        self.install(state.clone()).await;
        info!("login succeeded");
        Ok(state)
    }

    /// POST `/auth/refresh` and replace the token state wholesale. Caller
    /// must hold the refresh guard.
    async fn refresh_locked(&self) -> GatewayResult<TokenState> {
        let (access, refresh, previous_expiry, user, roles) = {
            let token = self.token.read().await;
            let current = token.as_ref().ok_or_else(|| {
                GatewayError::Authentication("no token held; nothing to refresh".into())
            })?;
            let refresh = current.refresh_token.clone().ok_or_else(|| {
                GatewayError::Authentication("gateway issued no refresh token".into())
            })?;
            (
                current.access_token.clone(),
                refresh,
                current.expires_at,
                current.user.clone(),
                current.roles.clone(),
            )
        };

        let url = format!("{}/auth/refresh", self.config.gateway_url);
        debug!("refreshing access token");

        let response = self
            .transport
            .send(
                self.transport
                    .request(Method::POST, &url)
                    .json(&RefreshBody { access_token: &access, refresh_token: &refresh }),
            )
            .await
            .map_err(|err| auth_failure("refresh", err))?;

        let envelope: Envelope<AuthData> = response.json().await.map_err(|err| {
            GatewayError::Authentication(format!("malformed refresh response: {err}"))
        })?;

        let data = envelope.data;
        let mut state =
            TokenState::new(data.access_token, data.refresh_token.or(Some(refresh)))?
                .with_user(data.user.or(user))
                .with_roles(data.roles);
        if state.roles.is_empty() {
            state.roles = roles;
        }
        // An opaque rotated token keeps the previous expiry window.
        if state.expires_at.is_none() {
            state.expires_at = previous_expiry;
        }

        self.install(state.clone()).await;
        info!("access token refreshed");
        Ok(state)
    }

    async fn install(&self, state: TokenState) {
        if let Err(err) = self.store.save(&state).await {
            warn!(error = %err, "failed to persist token cache");
        }
        *self.token.write().await = Some(state);
    }
}

/// Login/refresh rejections surface as authentication failures rather than
/// generic api errors; transport classifications pass through untouched.
fn auth_failure(operation: &str, err: GatewayError) -> GatewayError {
    match err {
        GatewayError::Api { status, message } => {
            GatewayError::Authentication(format!("{operation} failed (HTTP {status}): {message}"))
        }
        GatewayError::RateLimit { message, .. } => {
            GatewayError::Authentication(format!("{operation} rate limited: {message}"))
        }
        other => other,
    }
}
