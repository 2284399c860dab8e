//! Token state with expiry tracking.
//!
//! A [`TokenState`] is created on successful login or refresh and replaced
//! wholesale on every refresh - it is never mutated field by field. Expiry is
//! derived from the access token's own JWT `exp` claim when the token is
//! decodable, with a caller-supplied fallback lifetime otherwise.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};

/// User metadata returned by the login endpoint.
///
/// Unknown fields are preserved in `extra` for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Access and refresh tokens with expiry metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenState {
    /// Bearer token for authenticated gateway requests. Never empty.
    pub access_token: String,

    /// Refresh token, when the gateway issued one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When this state was constructed (login or refresh time).
    pub issued_at: DateTime<Utc>,

    /// Absolute expiry. `None` means the expiry is unknown; such a token is
    /// treated as not-yet-expired by [`TokenState::is_expired`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Authenticated user profile, when the gateway returned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,

    /// Roles granted to the user. Order is preserved as received.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenState {
    /// Create a token state, deriving expiry from the access token's JWT
    /// `exp` claim when present.
    ///
    /// # Errors
    /// Returns [`GatewayError::Authentication`] if the access token is empty.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> GatewayResult<Self> {
        Self::with_fallback_lifetime(access_token, refresh_token, None)
    }

    /// Create a token state, falling back to `fallback_lifetime_secs` when
    /// the access token carries no decodable `exp` claim.
    ///
    /// The self-decoded claim wins over the fallback when both are available.
    ///
    /// # Errors
    /// Returns [`GatewayError::Authentication`] if the access token is empty.
    pub fn with_fallback_lifetime(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        fallback_lifetime_secs: Option<i64>,
    ) -> GatewayResult<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(GatewayError::Authentication(
                "gateway returned an empty access token".into(),
            ));
        }

        let issued_at = Utc::now();
        let expires_at = decode_jwt_expiry(&access_token)
            .or_else(|| fallback_lifetime_secs.map(|secs| issued_at + Duration::seconds(secs)));

        Ok(Self {
            access_token,
            refresh_token,
            issued_at,
            expires_at,
            user: None,
            roles: Vec::new(),
        })
    }

    /// Attach the user profile returned by login.
    #[must_use]
    pub fn with_user(mut self, user: Option<UserProfile>) -> Self {
        self.user = user;
        self
    }

    /// Attach the roles returned by login.
    #[must_use]
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    /// Check if the token is expired or will expire within `buffer_seconds`.
    ///
    /// A token with unknown expiry is never considered expired by this check;
    /// the auth session handles that case separately.
    #[must_use]
    pub fn is_expired(&self, buffer_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at - Duration::seconds(buffer_seconds),
            None => false,
        }
    }

    /// Check if the token falls inside the proactive-refresh window.
    ///
    /// Same predicate as [`TokenState::is_expired`], applied with the larger
    /// refresh lead time instead of the hard-expiry buffer.
    #[must_use]
    pub fn expires_soon(&self, lead_seconds: i64) -> bool {
        self.is_expired(lead_seconds)
    }

    /// Time remaining until expiry, floored at zero.
    ///
    /// Returns `None` when the expiry is unknown.
    #[must_use]
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).max(Duration::zero()))
    }
}

/// Extract the expiry timestamp from a JWT's payload without verifying its
/// signature.
///
/// This is a local scheduling hint, not an authentication check: the value is
/// only used to decide when to refresh proactively. Any malformation (wrong
/// segment count, bad base64, bad JSON, missing or non-numeric `exp`) yields
/// `None`.
#[must_use]
pub fn decode_jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    let _signature = segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::<Utc>::from_timestamp(exp, 0)
}
