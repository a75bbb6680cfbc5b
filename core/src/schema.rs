//! Resource type metadata supplied by the host store.
//!
//! A `ResourceType` names an entity kind, its primary key, its declared
//! attributes and its relationships. The `Schema` is the lookup table the
//! codec consults when it follows a relationship to its target type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How a relationship travels on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingMode {
    /// A resource URI such as `/api/v1/author/7/`.
    #[default]
    #[serde(rename = "reference")]
    Reference,
    /// The related record's full payload, nested in place.
    #[serde(rename = "always", alias = "always-embedded")]
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    BelongsTo,
    HasMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub kind: RelationshipKind,
    /// Field name on the owning record.
    pub key: String,
    /// Name of the related resource type.
    pub target: String,
    /// Mode used when the adapter configuration says nothing for this field.
    pub embedding: EmbeddingMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    name: String,
    path: Option<String>,
    primary_key: String,
    attributes: Vec<String>,
    relationships: Vec<RelationshipDescriptor>,
    meta_key: Option<String>,
}

impl ResourceType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            primary_key: "id".to_string(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            meta_key: None,
        }
    }

    /// Use an explicit resource path instead of the one derived from the name.
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.trim_matches('/').to_string());
        self
    }

    pub fn with_primary_key(mut self, primary_key: &str) -> Self {
        self.primary_key = primary_key.to_string();
        self
    }

    pub fn with_meta_key(mut self, meta_key: &str) -> Self {
        self.meta_key = Some(meta_key.to_string());
        self
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.attributes.push(name.to_string());
        self
    }

    pub fn belongs_to(self, key: &str, target: &str) -> Self {
        self.relationship(RelationshipKind::BelongsTo, key, target, EmbeddingMode::Reference)
    }

    pub fn has_many(self, key: &str, target: &str) -> Self {
        self.relationship(RelationshipKind::HasMany, key, target, EmbeddingMode::Reference)
    }

    pub fn relationship(
        mut self,
        kind: RelationshipKind,
        key: &str,
        target: &str,
        embedding: EmbeddingMode,
    ) -> Self {
        self.relationships.push(RelationshipDescriptor {
            kind,
            key: key.to_string(),
            target: target.to_string(),
            embedding,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    pub fn relationship_for(&self, key: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|rel| rel.key == key)
    }

    pub fn meta_key(&self) -> Option<&str> {
        self.meta_key.as_deref()
    }

    /// The URL path segment for this type, already pluralized.
    pub fn resource_path(&self) -> String {
        match &self.path {
            Some(path) => path.clone(),
            None => pluralize(&root_for_type(&self.name)),
        }
    }
}

/// Resource paths are not pluralized in this dialect.
pub fn pluralize(name: &str) -> String {
    name.to_string()
}

/// Derive the root path segment from a type name: `App.BlogPost` becomes
/// `blog_post`.
pub fn root_for_type(type_name: &str) -> String {
    let short = type_name.rsplit('.').next().unwrap_or(type_name);
    underscore(short)
}

/// `firstName` and `first-name` both become `first_name`.
pub fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in name.chars() {
        if ch == '-' || ch == ' ' {
            out.push('_');
            prev_lower_or_digit = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower_or_digit {
            out.push('_');
        }
        prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// All resource types known to the adapter, by name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, ResourceType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, resource: ResourceType) -> Self {
        self.types.insert(resource.name.clone(), resource);
        self
    }

    pub fn get(&self, name: &str) -> Result<&ResourceType, Error> {
        self.types
            .get(name)
            .ok_or_else(|| Error::UnknownResourceType(name.to_string()))
    }
}
