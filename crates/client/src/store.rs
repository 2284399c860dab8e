//! Token persistence behind a storage seam.
//!
//! The store holds whatever it is given and returns whatever it holds; the
//! auth session decides whether a loaded token is still usable.

use std::path::PathBuf;

use async_trait::async_trait;
use datagate_core::{GatewayError, GatewayResult, TokenState};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Storage seam for token state.
///
/// Implementations must be safe to share across tasks. Call sites treat
/// `save`/`clear` failures as non-fatal and log them at warn.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the persisted token, if any.
    async fn load(&self) -> GatewayResult<Option<TokenState>>;

    /// Persist the token.
    async fn save(&self, token: &TokenState) -> GatewayResult<()>;

    /// Remove the persisted token. Idempotent.
    async fn clear(&self) -> GatewayResult<()>;
}

/// Token store backed by a JSON file.
///
/// A missing, unreadable, or unparseable file loads as `None` rather than an
/// error: a stale cache must never block a fresh login. On unix the file is
/// chmodded to 0o600, best effort.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> GatewayResult<Option<TokenState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "token cache unreadable");
                return Ok(None);
            }
        };

        match serde_json::from_slice::<TokenState>(&bytes) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                // Corrupt or written by an incompatible version.
                warn!(path = %self.path.display(), error = %err, "discarding unparseable token cache");
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &TokenState) -> GatewayResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                GatewayError::Config(format!(
                    "cannot create cache directory '{}': {err}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_vec_pretty(token)
            .map_err(|err| GatewayError::Config(format!("cannot serialize token: {err}")))?;
        tokio::fs::write(&self.path, json).await.map_err(|err| {
            GatewayError::Config(format!("cannot write token cache '{}': {err}", self.path.display()))
        })?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            if let Err(err) =
                tokio::fs::set_permissions(&self.path, Permissions::from_mode(0o600)).await
            {
                warn!(path = %self.path.display(), error = %err, "cannot restrict cache permissions");
            }
        }

        debug!(path = %self.path.display(), "token cached");
        Ok(())
    }

    async fn clear(&self) -> GatewayResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(GatewayError::Config(format!(
                "cannot remove token cache '{}': {err}",
                self.path.display()
            ))),
        }
    }
}

/// In-process token store for tests and embedded use.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<TokenState>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> GatewayResult<Option<TokenState>> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &TokenState) -> GatewayResult<()> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> GatewayResult<()> {
        *self.token.write().await = None;
        Ok(())
    }
}

/// Store that never persists anything; used when caching is disabled.
pub(crate) struct NullTokenStore;

#[async_trait]
impl TokenStore for NullTokenStore {
    async fn load(&self) -> GatewayResult<Option<TokenState>> {
        Ok(None)
    }

    async fn save(&self, _token: &TokenState) -> GatewayResult<()> {
        Ok(())
    }

    async fn clear(&self) -> GatewayResult<()> {
        Ok(())
    }
}
