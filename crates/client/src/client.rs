//! The gateway client: discovery, schemas, and queries.

use std::sync::Arc;

use datagate_core::entity::{metadata_path, query_path};
use datagate_core::{
    EntityCatalog, EntityDescriptor, EntitySchema, FieldMetadata, GatewayError, GatewayResult,
    QueryRequest, QueryResult, Record,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::auth::AuthSession;
use crate::config::GatewayConfig;
use crate::http::HttpTransport;
use crate::paginate::fetch_all;
use crate::store::{FileTokenStore, NullTokenStore, TokenStore};

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    data: Option<T>,
}

/// Async client for one gateway.
///
/// Owns an [`AuthSession`] and a pooled [`HttpTransport`]; every operation
/// obtains its bearer token from the session, so callers never handle tokens
/// directly. Construct one per gateway and share it - it is cheap to clone
/// the handle via `Arc` and there is no process-wide instance.
pub struct GatewayClient {
    gateway_url: String,
    transport: HttpTransport,
    session: Arc<AuthSession>,
}

impl GatewayClient {
    /// Build a client, persisting tokens at the configured cache path (or
    /// nowhere when caching is disabled).
    ///
    /// # Errors
    /// Returns [`GatewayError::Config`] if the transport cannot be built.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let store: Arc<dyn TokenStore> = match &config.cache_path {
            Some(path) => Arc::new(FileTokenStore::new(path.clone())),
            None => Arc::new(NullTokenStore),
        };
        Self::with_store(config, store)
    }

    /// Build a client with a custom token store.
    ///
    /// # Errors
    /// Returns [`GatewayError::Config`] if the transport cannot be built.
    pub fn with_store(config: GatewayConfig, store: Arc<dyn TokenStore>) -> GatewayResult<Self> {
        let transport = HttpTransport::new(&config)?;
        let gateway_url = config.gateway_url.clone();
        let session = Arc::new(AuthSession::new(config, transport.clone(), store));
        Ok(Self { gateway_url, transport, session })
    }

    /// The auth session, for login state inspection and manual control.
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Clear the token state and cache.
    pub async fn logout(&self) {
        self.session.logout().await;
    }

    /// List every entity the gateway exposes.
    pub async fn list_entities(&self) -> GatewayResult<EntityCatalog> {
        let url = format!("{}/api/v1/meta/apis", self.gateway_url);
        let response = self.authorized_get(&url).await?;
        let entities: Vec<EntityDescriptor> = decode_envelope(response).await?;
        debug!(count = entities.len(), "discovered entities");
        Ok(EntityCatalog { entities })
    }

    /// Fetch the field schema for an entity addressed as `{scope}/{name}`.
    ///
    /// # Errors
    /// Returns [`GatewayError::EntityNotFound`] for a 404; other failures are
    /// wrapped with metadata context.
    pub async fn entity_schema(&self, api_url: &str) -> GatewayResult<EntitySchema> {
        let path = metadata_path(api_url)?;
        let url = format!("{}{path}", self.gateway_url);

        let response = self
            .authorized_get(&url)
            .await
            .map_err(|err| not_found_or(err, api_url, |e, n| e.metadata_context(n)))?;
        let fields: Vec<FieldMetadata> = decode_envelope(response)
            .await
            .map_err(|err| err.metadata_context(api_url))?;
        Ok(EntitySchema { fields })
    }

    /// Run a query against an entity addressed as `{scope}/{name}`.
    ///
    /// # Errors
    /// Returns [`GatewayError::Validation`] for a malformed request,
    /// [`GatewayError::EntityNotFound`] for a 404; other failures are wrapped
    /// with query context.
    pub async fn query(&self, api_url: &str, request: QueryRequest) -> GatewayResult<QueryResult> {
        request.validate()?;
        let path = query_path(api_url)?;
        let url = format!("{}{path}", self.gateway_url);
        debug!(api_url, offset = request.offset, limit = request.limit, "querying entity");

        let token = self.session.get_valid_token().await?;
        let response = self
            .transport
            .send(self.transport.request(Method::POST, &url).bearer_auth(token).json(&request))
            .await
            .map_err(|err| not_found_or(err, api_url, |e, n| e.query_context(n)))?;

        response
            .json::<QueryResult>()
            .await
            .map_err(|err| decode_error(err).query_context(api_url))
    }

    /// Run a query and drain every matching page.
    ///
    /// Pagination starts at the request's offset with the request's limit as
    /// the page size; `cap` bounds the total records collected.
    pub async fn query_all(
        &self,
        api_url: &str,
        request: QueryRequest,
        cap: Option<usize>,
    ) -> GatewayResult<Vec<Record>> {
        request.validate()?;
        let base = request;

        fetch_all(base.offset, base.limit, cap, |offset, limit| {
            let page_request = QueryRequest { offset, limit, ..base.clone() };
            async move { Ok(self.query(api_url, page_request).await?.into_records()) }
        })
        .await
    }

    async fn authorized_get(&self, url: &str) -> GatewayResult<reqwest::Response> {
        let token = self.session.get_valid_token().await?;
        self.transport.send(self.transport.request(Method::GET, url).bearer_auth(token)).await
    }
}

/// Decode a `{"data": ...}` envelope, treating missing/null data as empty.
async fn decode_envelope<T>(response: reqwest::Response) -> GatewayResult<T>
where
    T: DeserializeOwned + Default,
{
    let envelope: Envelope<T> = response.json().await.map_err(decode_error)?;
    Ok(envelope.data.unwrap_or_default())
}

/// A 2xx with an undecodable body is a server-side contract violation, not a
/// transport fault; it must not re-enter any retry path.
fn decode_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Api { status: 200, message: format!("unparseable response body: {err}") }
}

fn not_found_or(
    err: GatewayError,
    api_url: &str,
    wrap: impl FnOnce(GatewayError, String) -> GatewayError,
) -> GatewayError {
    if err.status() == Some(404) {
        GatewayError::EntityNotFound(api_url.to_owned())
    } else {
        wrap(err, api_url.to_owned())
    }
}
