//! Async client for the datagate gateway.
//!
//! The entry point is [`GatewayClient`], built from a [`GatewayConfig`]. It
//! owns an [`AuthSession`] that keeps a valid bearer token available
//! (login, proactive refresh, on-disk caching) and a pooled transport with
//! bounded retries, and exposes the three gateway operations: entity
//! discovery, per-entity schemas, and data queries with pagination.
//!
//! ```no_run
//! use datagate_client::{GatewayClient, GatewayConfig};
//! use datagate_core::QueryRequest;
//!
//! # async fn run() -> datagate_core::GatewayResult<()> {
//! let config = GatewayConfig::builder("https://gateway.example.com")
//!     .credentials("analyst", "secret", 42)
//!     .build()?;
//! let client = GatewayClient::new(config)?;
//!
//! let catalog = client.list_entities().await?;
//! let request = QueryRequest::new().filter("status", "=", "active").limit(500)?;
//! let page = client.query("ops/auditTrail", request).await?;
//! println!("{} entities, {} audit rows", catalog.len(), page.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod paginate;
pub mod store;

pub use auth::AuthSession;
pub use client::GatewayClient;
pub use config::{Credentials, GatewayConfig, GatewayConfigBuilder};
pub use http::HttpTransport;
pub use paginate::fetch_all;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};

// Re-export the core types callers need to drive the client.
pub use datagate_core::{
    EntityCatalog, EntityDescriptor, EntitySchema, FieldMetadata, GatewayError, GatewayResult,
    QueryRequest, QueryResult, Record, TokenState,
};
