//! Translation layer between a client-side record store and a REST API that
//! addresses resources by URI, wraps collections in a `meta`/`objects`
//! envelope and paginates with a next-page URL.
//!
//! # Overview
//! - `url` builds canonical, trailing-slash-terminated resource URLs.
//! - `codec` turns records into payloads (relationships as resource URIs or
//!   embedded payloads) and payloads back into entities.
//! - `cursor` reduces the server's next-page URL to an `offset` query.
//! - `client` builds requests and completes operations without I/O
//!   (host-does-IO pattern).
//! - `adapter` drives the client over an async `Transport` and reports every
//!   outcome to the host `Store`.
//!
//! # Design
//! Configuration is validated once, wrapped in an `Arc` and never mutated,
//! so one client can serve any number of concurrent operations. The core
//! fires no requests on its own and keeps no state between calls.

pub mod adapter;
pub mod client;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod http;
pub mod schema;
pub mod types;
pub mod url;

pub use adapter::{Adapter, Store, TastypieAdapter};
pub use client::TastypieClient;
pub use codec::{deurlify, Serializer, TastypieSerializer};
pub use config::AdapterConfig;
pub use cursor::{parse_cursor, reduce_cursor_to_query, OffsetQuery};
pub use error::{Error, TransportFailure};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use schema::{EmbeddingMode, RelationshipDescriptor, RelationshipKind, ResourceType, Schema};
pub use types::{Collection, Entity, Extracted, Record, Transition};
pub use url::UrlBuilder;
