//! Entity discovery: descriptors returned by the catalog endpoint and the
//! path helpers that turn them into metadata/query URLs.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// One queryable entity exposed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescriptor {
    /// Scope/category the entity belongs to (`config`, `data`, `ops`, ...).
    pub api_scope: String,
    /// Path identifying the entity, `{scope}/{name}`.
    pub api_url: String,
    /// Friendly display name.
    #[serde(rename = "externalAPIName")]
    pub name: String,
    /// What the entity contains, when the gateway provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntityDescriptor {
    /// Split `api_url` into `(scope, entity_name)`.
    ///
    /// A single-segment url maps both components to that segment, mirroring
    /// how the gateway addresses scope-level entities.
    #[must_use]
    pub fn path_components(&self) -> (&str, &str) {
        match self.api_url.split_once('/') {
            Some((scope, entity)) => (scope, entity),
            None => (self.api_url.as_str(), self.api_url.as_str()),
        }
    }

    /// Scope component of `api_url`.
    #[must_use]
    pub fn scope(&self) -> &str {
        self.path_components().0
    }

    /// Entity-name component of `api_url`.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        self.path_components().1
    }

    /// Path for fetching this entity's field schema.
    #[must_use]
    pub fn metadata_path(&self) -> String {
        let (scope, entity) = self.path_components();
        format!("/api/v1/meta/{scope}/{entity}")
    }

    /// Path for querying this entity's data.
    #[must_use]
    pub fn query_path(&self) -> String {
        let (scope, entity) = self.path_components();
        format!("/api/v1/{scope}/{entity}/query")
    }
}

/// Path for fetching an entity's field schema from its `{scope}/{name}` url.
///
/// # Errors
/// Returns [`GatewayError::Validation`] if the url is not a well-formed
/// two-segment path.
pub fn metadata_path(api_url: &str) -> GatewayResult<String> {
    let (scope, entity) = split_api_url(api_url)?;
    Ok(format!("/api/v1/meta/{scope}/{entity}"))
}

/// Path for querying an entity's data from its `{scope}/{name}` url.
///
/// # Errors
/// Returns [`GatewayError::Validation`] if the url is not a well-formed
/// two-segment path.
pub fn query_path(api_url: &str) -> GatewayResult<String> {
    let (scope, entity) = split_api_url(api_url)?;
    Ok(format!("/api/v1/{scope}/{entity}/query"))
}

fn split_api_url(api_url: &str) -> GatewayResult<(&str, &str)> {
    let (scope, entity) = api_url
        .split_once('/')
        .ok_or_else(|| bad_api_url(api_url))?;
    if scope.is_empty() || entity.is_empty() || entity.contains('/') {
        return Err(bad_api_url(api_url));
    }
    Ok((scope, entity))
}

fn bad_api_url(api_url: &str) -> GatewayError {
    GatewayError::Validation(format!(
        "api url must be '{{scope}}/{{entity}}', got '{api_url}'"
    ))
}

/// The full set of entities discovered from the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCatalog {
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
}

impl EntityCatalog {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities declared under `scope`.
    pub fn by_scope<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a EntityDescriptor> {
        self.entities.iter().filter(move |e| e.api_scope == scope)
    }

    /// Look up an entity by its exact `api_url`.
    #[must_use]
    pub fn find(&self, api_url: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.api_url == api_url)
    }

    /// Case-insensitive substring search over name, url, and description.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&EntityDescriptor> {
        let needle = query.to_lowercase();
        self.entities
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle)
                    || e.api_url.to_lowercase().contains(&needle)
                    || e.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Distinct scopes, sorted and deduplicated.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        let mut scopes: Vec<&str> = self.entities.iter().map(|e| e.api_scope.as_str()).collect();
        scopes.sort_unstable();
        scopes.dedup();
        scopes
    }
}
