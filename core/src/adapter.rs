//! Async operation dispatcher.
//!
//! # Design
//! `TastypieAdapter` strings the pure client together with a `Transport`:
//! build the request, await the single round-trip, complete it into a
//! `Transition`, then tell the store. Nothing is retried and nothing is
//! cancelled; a request runs until the transport settles it.
//!
//! A failure is reported to the store's error channel *and* returned to the
//! caller. Neither side can miss it.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::TastypieClient;
use crate::cursor::reduce_cursor_to_query;
use crate::error::{Error, TransportFailure};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::schema::ResourceType;
use crate::types::{Collection, Entity, Record, Transition};

/// The host store, as seen from the adapter.
///
/// Implementations own record lifecycle and identity maps; methods take
/// `&self` and are expected to synchronise internally.
pub trait Store: Send + Sync {
    /// The server assigned `id` to a record the client created.
    fn update_id(&self, record: &Record, id: &str);

    fn did_save_record(&self, record: &Record, entity: Option<&Entity>);

    fn did_delete_record(&self, record: &Record);

    fn record_became_error(&self, record: &Record, error: &Error);

    /// Register an entity decoded from a response.
    fn load(&self, resource: &ResourceType, entity: &Entity);

    /// The cursor registered by the previous `find_all`, if any.
    ///
    /// `None` makes `find_all` fetch the first page. A cursor with no offset
    /// means the type has no further pages and `find_all` sends nothing.
    fn since_for_type(&self, resource: &ResourceType) -> Option<String>;

    /// Only cursors that carry an offset are registered.
    fn register_since(&self, resource: &ResourceType, cursor: &str);

    fn register_meta(&self, _resource: &ResourceType, _meta: &Map<String, Value>) {}
}

/// Store verbs mapped onto HTTP requests.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn create_record(&self, store: &dyn Store, record: &Record) -> Result<Option<Entity>, Error>;

    async fn update_record(&self, store: &dyn Store, record: &Record) -> Result<Option<Entity>, Error>;

    async fn delete_record(&self, store: &dyn Store, record: &Record) -> Result<(), Error>;

    async fn find(&self, store: &dyn Store, resource: &str, id: &str) -> Result<Entity, Error>;

    async fn find_all(&self, store: &dyn Store, resource: &str) -> Result<Collection, Error>;

    async fn find_query(
        &self,
        store: &dyn Store,
        resource: &str,
        query: &[(String, String)],
    ) -> Result<Collection, Error>;

    async fn find_many(&self, store: &dyn Store, resource: &str, ids: &[String]) -> Result<Collection, Error>;
}

type Completer = fn(&TastypieClient, &Record, Result<HttpResponse, TransportFailure>) -> Transition;

pub struct TastypieAdapter<T> {
    client: TastypieClient,
    transport: T,
}

impl<T: Transport> TastypieAdapter<T> {
    pub fn new(client: TastypieClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &TastypieClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn round_trip(
        &self,
        request: Result<HttpRequest, Error>,
        record: &Record,
        complete: Completer,
    ) -> Transition {
        match request {
            Ok(request) => {
                let result = self.transport.send(request).await;
                complete(&self.client, record, result)
            }
            Err(err) => Transition::Failed(err),
        }
    }

    async fn fetch_collection(
        &self,
        store: &dyn Store,
        resource: &str,
        request: Result<HttpRequest, Error>,
    ) -> Result<Collection, Error> {
        let resource_type = self.client.resource(resource)?;
        let response = self.transport.send(request?).await;
        let collection = response
            .map_err(Error::from)
            .and_then(|response| self.client.parse_collection(resource, response))
            .inspect_err(|err| tracing::error!(%err, resource, "collection request failed"))?;
        for entity in &collection.entities {
            store.load(resource_type, entity);
        }
        if let Some(cursor) = &collection.cursor {
            store.register_since(resource_type, cursor);
        }
        if !collection.meta.is_empty() {
            store.register_meta(resource_type, &collection.meta);
        }
        Ok(collection)
    }
}

/// Hand the transition to the store, then to the caller.
fn settle(store: &dyn Store, record: &Record, transition: Transition) -> Result<Option<Entity>, Error> {
    match transition {
        Transition::Saved { id, entity } => {
            if let Some(id) = &id {
                store.update_id(record, id);
            }
            store.did_save_record(record, entity.as_ref());
            Ok(entity)
        }
        Transition::Deleted => {
            store.did_delete_record(record);
            Ok(None)
        }
        Transition::Failed(err) => {
            tracing::error!(%err, client_id = %record.client_id(), "record request failed");
            store.record_became_error(record, &err);
            Err(err)
        }
    }
}

#[async_trait]
impl<T: Transport> Adapter for TastypieAdapter<T> {
    #[tracing::instrument(skip_all, fields(resource = record.resource()))]
    async fn create_record(&self, store: &dyn Store, record: &Record) -> Result<Option<Entity>, Error> {
        let request = self.client.build_create(record);
        let transition = self
            .round_trip(request, record, TastypieClient::complete_create)
            .await;
        settle(store, record, transition)
    }

    #[tracing::instrument(skip_all, fields(resource = record.resource(), id = record.id()))]
    async fn update_record(&self, store: &dyn Store, record: &Record) -> Result<Option<Entity>, Error> {
        let request = self.client.build_update(record);
        let transition = self
            .round_trip(request, record, TastypieClient::complete_update)
            .await;
        settle(store, record, transition)
    }

    #[tracing::instrument(skip_all, fields(resource = record.resource(), id = record.id()))]
    async fn delete_record(&self, store: &dyn Store, record: &Record) -> Result<(), Error> {
        let request = self.client.build_delete(record);
        let transition = self
            .round_trip(request, record, TastypieClient::complete_delete)
            .await;
        settle(store, record, transition).map(|_| ())
    }

    #[tracing::instrument(skip(self, store))]
    async fn find(&self, store: &dyn Store, resource: &str, id: &str) -> Result<Entity, Error> {
        let resource_type = self.client.resource(resource)?;
        let request = self.client.build_find(resource, id)?;
        let entity = self
            .transport
            .send(request)
            .await
            .map_err(Error::from)
            .and_then(|response| self.client.parse_find(resource, response))
            .inspect_err(|err| tracing::error!(%err, "find failed"))?;
        store.load(resource_type, &entity);
        Ok(entity)
    }

    #[tracing::instrument(skip(self, store))]
    async fn find_all(&self, store: &dyn Store, resource: &str) -> Result<Collection, Error> {
        let since = store.since_for_type(self.client.resource(resource)?);
        if since.is_some() && reduce_cursor_to_query(since.as_deref()).is_none() {
            tracing::debug!("registered cursor has no further pages");
            return Ok(Collection::default());
        }
        let request = self.client.build_find_all(resource, since.as_deref());
        self.fetch_collection(store, resource, request).await
    }

    #[tracing::instrument(skip(self, store))]
    async fn find_query(
        &self,
        store: &dyn Store,
        resource: &str,
        query: &[(String, String)],
    ) -> Result<Collection, Error> {
        let request = self.client.build_find_query(resource, query);
        self.fetch_collection(store, resource, request).await
    }

    #[tracing::instrument(skip(self, store))]
    async fn find_many(&self, store: &dyn Store, resource: &str, ids: &[String]) -> Result<Collection, Error> {
        if ids.is_empty() {
            self.client.resource(resource)?;
            return Ok(Collection::default());
        }
        let request = self.client.build_find_many(resource, ids);
        self.fetch_collection(store, resource, request).await
    }
}
