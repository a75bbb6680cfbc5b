//! Test doubles for the adapter seams.
//!
//! `ScriptedTransport` answers requests from a queue of canned outcomes and
//! records every request it was asked to send. `RecordingStore` keeps a log
//! of every store callback so tests can assert exactly what happened.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tastypie_core::{
    Entity, Error, HttpRequest, HttpResponse, Record, ResourceType, Store, Transport,
    TransportFailure,
};
use uuid::Uuid;

#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<HttpResponse, TransportFailure>>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.outcomes.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(self, failure: TransportFailure) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(failure));
        self
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Panics if scripted outcomes were never consumed.
    pub fn verify(&self) {
        let remaining = self.outcomes.lock().unwrap().len();
        assert_eq!(remaining, 0, "{remaining} scripted outcome(s) never requested");
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.sent.lock().unwrap().push(request);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected request: no scripted outcome left")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    UpdatedId { client_id: Uuid, id: String },
    Saved { client_id: Uuid, entity: Option<Entity> },
    Deleted { client_id: Uuid },
    Errored { client_id: Uuid, error: Error },
    Loaded { resource: String, entity: Entity },
    Since { resource: String, cursor: String },
    Meta { resource: String, meta: Map<String, Value> },
}

#[derive(Default)]
pub struct RecordingStore {
    events: Mutex<Vec<StoreEvent>>,
    since: Mutex<HashMap<String, String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a previous session left `cursor` behind for `resource`.
    pub fn with_since(self, resource: &str, cursor: &str) -> Self {
        self.since
            .lock()
            .unwrap()
            .insert(resource.to_string(), cursor.to_string());
        self
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn loaded(&self, resource: &str) -> Vec<Entity> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::Loaded { resource: r, entity } if r == resource => Some(entity),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: StoreEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Store for RecordingStore {
    fn update_id(&self, record: &Record, id: &str) {
        self.push(StoreEvent::UpdatedId {
            client_id: record.client_id(),
            id: id.to_string(),
        });
    }

    fn did_save_record(&self, record: &Record, entity: Option<&Entity>) {
        self.push(StoreEvent::Saved {
            client_id: record.client_id(),
            entity: entity.cloned(),
        });
    }

    fn did_delete_record(&self, record: &Record) {
        self.push(StoreEvent::Deleted {
            client_id: record.client_id(),
        });
    }

    fn record_became_error(&self, record: &Record, error: &Error) {
        self.push(StoreEvent::Errored {
            client_id: record.client_id(),
            error: error.clone(),
        });
    }

    fn load(&self, resource: &ResourceType, entity: &Entity) {
        self.push(StoreEvent::Loaded {
            resource: resource.name().to_string(),
            entity: entity.clone(),
        });
    }

    fn since_for_type(&self, resource: &ResourceType) -> Option<String> {
        self.since.lock().unwrap().get(resource.name()).cloned()
    }

    fn register_since(&self, resource: &ResourceType, cursor: &str) {
        self.since
            .lock()
            .unwrap()
            .insert(resource.name().to_string(), cursor.to_string());
        self.push(StoreEvent::Since {
            resource: resource.name().to_string(),
            cursor: cursor.to_string(),
        });
    }

    fn register_meta(&self, resource: &ResourceType, meta: &Map<String, Value>) {
        self.push(StoreEvent::Meta {
            resource: resource.name().to_string(),
            meta: meta.clone(),
        });
    }
}
