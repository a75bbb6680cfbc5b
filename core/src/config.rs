//! Process-wide adapter configuration.
//!
//! Built once, validated by `TastypieClient::new`, then shared behind an
//! `Arc` and never mutated. Per-type tables are keyed by resource type name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::schema::EmbeddingMode;

pub const DEFAULT_NAMESPACE: &str = "api/v1";
pub const DEFAULT_SINCE: &str = "next";
pub const DEFAULT_META_KEY: &str = "meta";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Path prefix of every resource, e.g. `api/v1`.
    pub namespace: String,
    /// Optional scheme and host for cross-site requests.
    pub server_domain: Option<String>,
    /// Name of the cursor field inside the meta object.
    pub since: String,
    /// Default name of the meta object in collection envelopes.
    pub meta_key: String,
    /// Relationships serialized as nested payloads instead of URIs.
    pub embedded: BTreeMap<String, BTreeMap<String, EmbeddingMode>>,
    /// Wire keys that differ from the derived field key.
    pub aliases: BTreeMap<String, BTreeMap<String, String>>,
    /// Meta properties copied into extracted collections, local name to wire name.
    pub meta_properties: BTreeMap<String, String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            server_domain: None,
            since: DEFAULT_SINCE.to_string(),
            meta_key: DEFAULT_META_KEY.to_string(),
            embedded: BTreeMap::new(),
            aliases: BTreeMap::new(),
            meta_properties: BTreeMap::new(),
        }
    }
}

impl AdapterConfig {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::Configuration(e.to_string()))
    }

    pub fn with_server_domain(mut self, domain: &str) -> Self {
        self.server_domain = Some(domain.to_string());
        self
    }

    pub fn with_meta_key(mut self, meta_key: &str) -> Self {
        self.meta_key = meta_key.to_string();
        self
    }

    pub fn embed(mut self, resource: &str, field: &str) -> Self {
        self.embedded
            .entry(resource.to_string())
            .or_default()
            .insert(field.to_string(), EmbeddingMode::Always);
        self
    }

    pub fn alias(mut self, resource: &str, field: &str, wire_key: &str) -> Self {
        self.aliases
            .entry(resource.to_string())
            .or_default()
            .insert(field.to_string(), wire_key.to_string());
        self
    }

    pub fn map_meta(mut self, local: &str, wire: &str) -> Self {
        self.meta_properties
            .insert(local.to_string(), wire.to_string());
        self
    }

    pub fn embedding_for(&self, resource: &str, field: &str) -> Option<EmbeddingMode> {
        self.embedded
            .get(resource)
            .and_then(|fields| fields.get(field))
            .copied()
    }

    pub fn alias_for(&self, resource: &str, field: &str) -> Option<&str> {
        self.aliases
            .get(resource)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    /// Reject configurations the adapter cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.namespace.trim_matches('/').is_empty() {
            return Err(Error::Configuration(
                "namespace parameter is mandatory".to_string(),
            ));
        }
        if self.since.is_empty() {
            return Err(Error::Configuration(
                "cursor field name must not be empty".to_string(),
            ));
        }
        if self.meta_key.is_empty() {
            return Err(Error::Configuration("meta key must not be empty".to_string()));
        }
        Ok(())
    }
}
