//! Representation codec: records to wire payloads and back.
//!
//! # Design
//! Relationships travel either as resource URIs (`/api/v1/author/7/`) or, for
//! fields configured as embedded, as the related record's full payload.
//! Incoming URIs are reduced to their id by taking the second-to-last
//! `/`-delimited segment; all of that lives in [`deurlify`]. Anything that is
//! not a string passes through untouched, which is how embedded payloads come
//! back out.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::AdapterConfig;
use crate::cursor::reduce_cursor_to_query;
use crate::error::Error;
use crate::schema::{
    underscore, EmbeddingMode, RelationshipDescriptor, RelationshipKind, ResourceType, Schema,
};
use crate::types::{Collection, Entity, Extracted, Record};
use crate::url::UrlBuilder;

const OBJECTS_KEY: &str = "objects";

/// Conversion between records and the wire representation.
pub trait Serializer: Send + Sync {
    /// Flat payload for `record`. The primary key is written only when
    /// `include_id` is set, since request URLs already carry it.
    fn serialize(
        &self,
        resource: &ResourceType,
        record: &Record,
        include_id: bool,
    ) -> Result<Map<String, Value>, Error>;

    /// Wire value for one relationship, or `None` when the field must be
    /// left out of the payload.
    fn serialize_relationship(
        &self,
        resource: &ResourceType,
        record: &Record,
        relationship: &RelationshipDescriptor,
    ) -> Result<Option<Value>, Error>;

    fn deserialize_belongs_to(&self, raw: &Map<String, Value>, key: &str) -> Option<Value>;

    fn deserialize_has_many(&self, raw: &Map<String, Value>, key: &str) -> Result<Vec<Value>, Error>;

    fn extract_single(
        &self,
        resource: &ResourceType,
        payload: Value,
        record: Option<&Record>,
    ) -> Result<Extracted, Error>;

    fn extract_collection(&self, resource: &ResourceType, payload: Value) -> Result<Collection, Error>;
}

/// Reduce a resource URI to its identifier; pass every other value through.
///
/// `"/api/v1/book/42/"` becomes `"42"`. A non-empty string with no
/// second-to-last segment has no identifier and becomes `null`.
pub fn deurlify(value: &Value) -> Value {
    match value {
        Value::String(uri) if !uri.is_empty() => uri
            .split('/')
            .rev()
            .nth(1)
            .map(|id| Value::String(id.to_string()))
            .unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// Identifier named by a resource URI, if it names one.
pub fn id_from_uri(uri: &str) -> Option<String> {
    match deurlify(&Value::String(uri.to_string())) {
        Value::String(id) if !id.is_empty() => Some(id),
        _ => None,
    }
}

fn id_from_value(value: &Value) -> Result<Option<String>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::String(id) if id.is_empty() => Ok(None),
        Value::String(id) => Ok(Some(id.clone())),
        Value::Number(id) => Ok(Some(id.to_string())),
        other => Err(Error::Deserialization(format!(
            "primary key must be a string or a number, got {other}"
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct TastypieSerializer {
    config: Arc<AdapterConfig>,
    urls: UrlBuilder,
    schema: Arc<Schema>,
}

impl TastypieSerializer {
    pub fn new(config: Arc<AdapterConfig>, urls: UrlBuilder, schema: Arc<Schema>) -> Self {
        Self {
            config,
            urls,
            schema,
        }
    }

    /// Wire key for a field: the configured alias, else the underscored name.
    ///
    /// Belongs-to keys get no `_id` suffix; servers that want one declare it
    /// as an alias.
    pub fn key_for(&self, resource: &ResourceType, field: &str) -> String {
        self.config
            .alias_for(resource.name(), field)
            .map(str::to_string)
            .unwrap_or_else(|| underscore(field))
    }

    pub fn embedding_for(
        &self,
        resource: &ResourceType,
        relationship: &RelationshipDescriptor,
    ) -> EmbeddingMode {
        self.config
            .embedding_for(resource.name(), &relationship.key)
            .unwrap_or(relationship.embedding)
    }

    fn serialize_related(
        &self,
        target: &ResourceType,
        related: &Record,
        mode: EmbeddingMode,
    ) -> Result<Option<Value>, Error> {
        match mode {
            EmbeddingMode::Always => Ok(Some(Value::Object(self.serialize(target, related, true)?))),
            EmbeddingMode::Reference => Ok(related
                .id()
                .map(|id| Value::String(self.urls.resource_uri(&target.resource_path(), id)))),
        }
    }

    fn extract_record(&self, resource: &ResourceType, mut raw: Map<String, Value>) -> Result<Entity, Error> {
        let mut entity = Entity::default();
        if let Some(id) = raw.remove(resource.primary_key()) {
            entity.id = id_from_value(&id)?;
        }

        for relationship in resource.relationships() {
            let key = self.key_for(resource, &relationship.key);
            match relationship.kind {
                RelationshipKind::BelongsTo => {
                    if let Some(value) = self.deserialize_belongs_to(&raw, &key) {
                        entity.belongs_to.insert(relationship.key.clone(), value);
                    }
                }
                RelationshipKind::HasMany => {
                    let values = self.deserialize_has_many(&raw, &key)?;
                    entity.has_many.insert(relationship.key.clone(), values);
                }
            }
            raw.remove(&key);
        }

        let declared: BTreeMap<String, &str> = resource
            .attributes()
            .iter()
            .map(|name| (self.key_for(resource, name), name.as_str()))
            .collect();
        for (key, value) in raw {
            let name = declared.get(&key).map(|name| name.to_string()).unwrap_or(key);
            entity.attributes.insert(name, value);
        }
        Ok(entity)
    }

    fn copy_meta(&self, meta: &Map<String, Value>, collection: &mut Collection) {
        collection.cursor = meta
            .get(&self.config.since)
            .and_then(Value::as_str)
            .filter(|cursor| reduce_cursor_to_query(Some(cursor)).is_some())
            .map(str::to_string);
        for (local, wire) in &self.config.meta_properties {
            if let Some(value) = meta.get(wire) {
                collection.meta.insert(local.clone(), value.clone());
            }
        }
    }
}

impl Serializer for TastypieSerializer {
    fn serialize(
        &self,
        resource: &ResourceType,
        record: &Record,
        include_id: bool,
    ) -> Result<Map<String, Value>, Error> {
        let mut hash = Map::new();
        if include_id {
            if let Some(id) = record.id() {
                hash.insert(resource.primary_key().to_string(), Value::String(id.to_string()));
            }
        }
        for (name, value) in record.attributes() {
            if resource.relationship_for(name).is_none() {
                hash.insert(self.key_for(resource, name), value.clone());
            }
        }
        for relationship in resource.relationships() {
            if let Some(value) = self.serialize_relationship(resource, record, relationship)? {
                hash.insert(self.key_for(resource, &relationship.key), value);
            }
        }
        Ok(hash)
    }

    fn serialize_relationship(
        &self,
        resource: &ResourceType,
        record: &Record,
        relationship: &RelationshipDescriptor,
    ) -> Result<Option<Value>, Error> {
        let target = self.schema.get(&relationship.target)?;
        let mode = self.embedding_for(resource, relationship);
        match relationship.kind {
            RelationshipKind::BelongsTo => match record.belongs_to(&relationship.key) {
                Some(related) => self.serialize_related(target, related, mode),
                None => Ok(None),
            },
            RelationshipKind::HasMany => {
                let mut values = Vec::new();
                for related in record.has_many(&relationship.key) {
                    match self.serialize_related(target, related, mode)? {
                        Some(value) => values.push(value),
                        None => tracing::warn!(
                            resource = resource.name(),
                            field = %relationship.key,
                            client_id = %related.client_id(),
                            "skipping unsaved has-many member"
                        ),
                    }
                }
                Ok(Some(Value::Array(values)))
            }
        }
    }

    fn deserialize_belongs_to(&self, raw: &Map<String, Value>, key: &str) -> Option<Value> {
        raw.get(key).map(deurlify)
    }

    fn deserialize_has_many(&self, raw: &Map<String, Value>, key: &str) -> Result<Vec<Value>, Error> {
        match raw.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.iter().map(deurlify).collect()),
            Some(other) => Err(Error::Deserialization(format!(
                "has-many field `{key}` must be a list, got {other}"
            ))),
        }
    }

    fn extract_single(
        &self,
        resource: &ResourceType,
        payload: Value,
        record: Option<&Record>,
    ) -> Result<Extracted, Error> {
        let Value::Object(raw) = payload else {
            return Err(Error::Deserialization(format!(
                "{} response is not an object",
                resource.name()
            )));
        };
        let entity = self.extract_record(resource, raw)?;
        let reconciled_id = match (record, &entity.id) {
            (Some(record), Some(id)) if record.id() != Some(id.as_str()) => Some(id.clone()),
            _ => None,
        };
        Ok(Extracted {
            entity,
            reconciled_id,
        })
    }

    fn extract_collection(&self, resource: &ResourceType, payload: Value) -> Result<Collection, Error> {
        let Value::Object(mut envelope) = payload else {
            return Err(Error::Deserialization(format!(
                "{} collection response is not an object",
                resource.name()
            )));
        };
        let mut collection = Collection::default();

        let meta_key = resource.meta_key().unwrap_or(self.config.meta_key.as_str());
        match envelope.remove(meta_key) {
            None | Some(Value::Null) => {}
            Some(Value::Object(meta)) => self.copy_meta(&meta, &mut collection),
            Some(other) => {
                return Err(Error::Deserialization(format!(
                    "`{meta_key}` must be an object, got {other}"
                )))
            }
        }

        match envelope.remove(OBJECTS_KEY) {
            None | Some(Value::Null) => {}
            Some(Value::Array(objects)) => {
                for object in objects {
                    match object {
                        Value::Object(raw) => collection.entities.push(self.extract_record(resource, raw)?),
                        other => {
                            return Err(Error::Deserialization(format!(
                                "collection member is not an object: {other}"
                            )))
                        }
                    }
                }
            }
            Some(other) => {
                return Err(Error::Deserialization(format!(
                    "`{OBJECTS_KEY}` must be a list, got {other}"
                )))
            }
        }
        Ok(collection)
    }
}
