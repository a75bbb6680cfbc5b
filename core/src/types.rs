//! Domain values that cross the adapter boundary.
//!
//! # Design
//! `Record` is the client-side view handed in by the store: attributes plus
//! the related records themselves. `Entity` is what comes back out of a
//! response: attributes plus relationship *identifiers* (or raw embedded
//! payloads). Neither outlives the call that produced it.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Error;

/// A client-side record as the store sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    client_id: Uuid,
    resource: String,
    id: Option<String>,
    attributes: Map<String, Value>,
    belongs_to: BTreeMap<String, Record>,
    has_many: BTreeMap<String, Vec<Record>>,
}

impl Record {
    /// A new, unsaved record of the named resource type.
    pub fn new(resource: &str) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            resource: resource.to_string(),
            id: None,
            attributes: Map::new(),
            belongs_to: BTreeMap::new(),
            has_many: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn with_belongs_to(mut self, key: &str, related: Record) -> Self {
        self.belongs_to.insert(key.to_string(), related);
        self
    }

    pub fn with_has_many(mut self, key: &str, related: Vec<Record>) -> Self {
        self.has_many.insert(key.to_string(), related);
        self
    }

    /// Stable identity for the lifetime of the client-side record, saved or not.
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// `None` until the server has assigned an id. An empty id counts as unsaved.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn belongs_to(&self, key: &str) -> Option<&Record> {
        self.belongs_to.get(key)
    }

    /// Related records in collection order; empty when none were set.
    pub fn has_many(&self, key: &str) -> &[Record] {
        self.has_many.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The id, or an error naming the resource when the record is unsaved.
    pub fn require_id(&self) -> Result<&str, Error> {
        self.id().ok_or_else(|| Error::MissingIdentifier {
            resource: self.resource.clone(),
        })
    }
}

/// A record decoded from a response payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entity {
    pub id: Option<String>,
    pub attributes: Map<String, Value>,
    /// Related id, or the raw value when it was not a URI.
    pub belongs_to: BTreeMap<String, Value>,
    pub has_many: BTreeMap<String, Vec<Value>>,
}

/// Result of decoding a single-resource response.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub entity: Entity,
    /// Set when the server assigned an id that differs from the client record's.
    pub reconciled_id: Option<String>,
}

/// Result of decoding a collection envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub entities: Vec<Entity>,
    /// The next-page token, when the server says there is one.
    pub cursor: Option<String>,
    /// Meta properties copied through the configured mapping.
    pub meta: Map<String, Value>,
}

/// What the store must do with a record once its request has settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Created or updated. `id` is the server-assigned identifier when known.
    Saved {
        id: Option<String>,
        entity: Option<Entity>,
    },
    Deleted,
    Failed(Error),
}
