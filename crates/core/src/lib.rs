//! Core types for the datagate gateway SDK.
//!
//! Everything in this crate is pure data: token state with expiry tracking,
//! the generic query request builder, entity discovery and schema models, and
//! the error taxonomy shared by the whole SDK. No I/O happens here; the
//! `datagate-client` crate layers transport, caching, and the auth session on
//! top of these types.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod entity;
pub mod error;
pub mod metadata;
pub mod query;
pub mod token;

pub use entity::{EntityCatalog, EntityDescriptor};
pub use error::{ErrorCategory, GatewayError, GatewayResult};
pub use metadata::{EntitySchema, FieldKind, FieldMetadata};
pub use query::{
    FilterCriterion, FilterOperation, LogicalOperator, QueryRequest, QueryResult, Record,
    SortDirection, SortOrder,
};
pub use token::{decode_jwt_expiry, TokenState, UserProfile};
