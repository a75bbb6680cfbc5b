//! Stateless request builder and response completer for the resource API.
//!
//! # Design
//! `TastypieClient` holds only read-only configuration: the adapter config,
//! the URL builder, the schema and the serializer. Each operation is split
//! into a `build_*` method that produces an `HttpRequest` and a
//! `complete_*`/`parse_*` method that consumes the transport's outcome. The
//! caller executes the round-trip in between, so everything here is
//! deterministic and free of I/O.
//!
//! The record-level completers are total: every outcome, including a
//! transport failure or an unreadable body, maps to exactly one
//! `Transition`.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::codec::{id_from_uri, Serializer, TastypieSerializer};
use crate::config::AdapterConfig;
use crate::cursor::parse_cursor;
use crate::error::{Error, TransportFailure};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::schema::{ResourceType, Schema};
use crate::types::{Collection, Entity, Record, Transition};
use crate::url::UrlBuilder;

#[derive(Debug, Clone)]
pub struct TastypieClient {
    config: Arc<AdapterConfig>,
    urls: UrlBuilder,
    schema: Arc<Schema>,
    serializer: TastypieSerializer,
}

impl TastypieClient {
    /// Validate `config` once and freeze it for the client's lifetime.
    pub fn new(config: AdapterConfig, schema: Schema) -> Result<Self, Error> {
        config.validate()?;
        let urls = UrlBuilder::new(&config.namespace, config.server_domain.as_deref())?;
        let config = Arc::new(config);
        let schema = Arc::new(schema);
        let serializer = TastypieSerializer::new(config.clone(), urls.clone(), schema.clone());
        Ok(Self {
            config,
            urls,
            schema,
            serializer,
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    pub fn serializer(&self) -> &TastypieSerializer {
        &self.serializer
    }

    pub fn resource(&self, name: &str) -> Result<&ResourceType, Error> {
        self.schema.get(name)
    }

    pub fn build_url(&self, resource: &ResourceType, id: Option<&str>) -> String {
        self.urls.build_url(&resource.resource_path(), id, None)
    }

    pub fn build_create(&self, record: &Record) -> Result<HttpRequest, Error> {
        let resource = self.resource(record.resource())?;
        let body = self.serializer.serialize(resource, record, false)?;
        json_request(HttpMethod::Post, self.build_url(resource, None), &body)
    }

    pub fn build_update(&self, record: &Record) -> Result<HttpRequest, Error> {
        let resource = self.resource(record.resource())?;
        let id = record.require_id()?;
        let body = self.serializer.serialize(resource, record, false)?;
        json_request(HttpMethod::Put, self.build_url(resource, Some(id)), &body)
    }

    pub fn build_delete(&self, record: &Record) -> Result<HttpRequest, Error> {
        let resource = self.resource(record.resource())?;
        let id = record.require_id()?;
        Ok(bare_request(HttpMethod::Delete, self.build_url(resource, Some(id))))
    }

    pub fn build_find(&self, resource: &str, id: &str) -> Result<HttpRequest, Error> {
        let resource = self.resource(resource)?;
        if id.is_empty() {
            return Err(Error::MissingIdentifier {
                resource: resource.name().to_string(),
            });
        }
        Ok(bare_request(HttpMethod::Get, self.build_url(resource, Some(id))))
    }

    /// GET the collection, resuming at the offset carried by `since`, the
    /// cursor the store registered after the previous page. A cursor with no
    /// offset has no page to resume and fails with `MalformedCursor`.
    pub fn build_find_all(&self, resource: &str, since: Option<&str>) -> Result<HttpRequest, Error> {
        let resource = self.resource(resource)?;
        let mut path = self.build_url(resource, None);
        if let Some(since) = since {
            path.push('?');
            path.push_str(&parse_cursor(since)?.to_query_string());
        }
        Ok(bare_request(HttpMethod::Get, path))
    }

    pub fn build_find_query(
        &self,
        resource: &str,
        query: &[(String, String)],
    ) -> Result<HttpRequest, Error> {
        let resource = self.resource(resource)?;
        let mut path = self.build_url(resource, None);
        if !query.is_empty() {
            let pairs: Vec<String> = query
                .iter()
                .map(|(key, value)| {
                    format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
                })
                .collect();
            path.push('?');
            path.push_str(&pairs.join("&"));
        }
        Ok(bare_request(HttpMethod::Get, path))
    }

    /// GET several records at once through the `set/<id>;<id>/` sub-resource.
    pub fn build_find_many(&self, resource: &str, ids: &[String]) -> Result<HttpRequest, Error> {
        let resource = self.resource(resource)?;
        if ids.is_empty() {
            return Err(Error::MissingIdentifier {
                resource: resource.name().to_string(),
            });
        }
        Ok(bare_request(
            HttpMethod::Get,
            self.urls.set_url(&resource.resource_path(), ids),
        ))
    }

    pub fn complete_create(
        &self,
        record: &Record,
        result: Result<HttpResponse, TransportFailure>,
    ) -> Transition {
        self.complete_save(record, result)
    }

    pub fn complete_update(
        &self,
        record: &Record,
        result: Result<HttpResponse, TransportFailure>,
    ) -> Transition {
        self.complete_save(record, result)
    }

    pub fn complete_delete(
        &self,
        _record: &Record,
        result: Result<HttpResponse, TransportFailure>,
    ) -> Transition {
        match result.map_err(Error::from).and_then(|response| check_status(&response)) {
            Ok(()) => Transition::Deleted,
            Err(err) => Transition::Failed(err),
        }
    }

    pub fn parse_find(&self, resource: &str, response: HttpResponse) -> Result<Entity, Error> {
        let resource = self.resource(resource)?;
        check_status(&response)?;
        let payload = json_body(&response)?.unwrap_or_else(|| Value::Object(Map::new()));
        Ok(self.serializer.extract_single(resource, payload, None)?.entity)
    }

    pub fn parse_collection(&self, resource: &str, response: HttpResponse) -> Result<Collection, Error> {
        let resource = self.resource(resource)?;
        check_status(&response)?;
        let payload = json_body(&response)?.unwrap_or_else(|| Value::Object(Map::new()));
        self.serializer.extract_collection(resource, payload)
    }

    fn complete_save(
        &self,
        record: &Record,
        result: Result<HttpResponse, TransportFailure>,
    ) -> Transition {
        match result
            .map_err(Error::from)
            .and_then(|response| self.saved(record, &response))
        {
            Ok(transition) => transition,
            Err(err) => Transition::Failed(err),
        }
    }

    fn saved(&self, record: &Record, response: &HttpResponse) -> Result<Transition, Error> {
        let resource = self.resource(record.resource())?;
        check_status(response)?;
        match json_body(response)? {
            Some(payload) => {
                let extracted = self.serializer.extract_single(resource, payload, Some(record))?;
                Ok(Transition::Saved {
                    id: extracted.reconciled_id,
                    entity: Some(extracted.entity),
                })
            }
            // No body: the server may still name the new resource in `Location`.
            None => Ok(Transition::Saved {
                id: response
                    .header("Location")
                    .map(|location| format!("{}/", location.trim_end_matches('/')))
                    .and_then(|location| id_from_uri(&location))
                    .filter(|id| record.id() != Some(id.as_str())),
                entity: None,
            }),
        }
    }
}

fn bare_request(method: HttpMethod, path: String) -> HttpRequest {
    tracing::debug!(method = method.as_str(), url = %path, "built request");
    HttpRequest {
        method,
        path,
        headers: Vec::new(),
        body: None,
    }
}

fn json_request(method: HttpMethod, path: String, body: &Map<String, Value>) -> Result<HttpRequest, Error> {
    let body = serde_json::to_string(body).map_err(|e| Error::Serialization(e.to_string()))?;
    tracing::debug!(method = method.as_str(), url = %path, "built request");
    Ok(HttpRequest {
        method,
        path,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: Some(body),
    })
}

/// Any non-2xx status is a transport failure carrying the raw status and body.
fn check_status(response: &HttpResponse) -> Result<(), Error> {
    if response.is_success() {
        return Ok(());
    }
    Err(TransportFailure::Status {
        status: response.status,
        body: response.body.clone(),
    }
    .into())
}

fn json_body(response: &HttpResponse) -> Result<Option<Value>, Error> {
    if response.body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|e| Error::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .register(
                ResourceType::new("book")
                    .attribute("title")
                    .belongs_to("author", "author")
                    .has_many("tags", "tag"),
            )
            .register(ResourceType::new("author"))
            .register(ResourceType::new("tag"))
    }

    fn client() -> TastypieClient {
        TastypieClient::new(
            AdapterConfig::default().with_server_domain("http://localhost:3000/"),
            schema(),
        )
        .unwrap()
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn body_json(req: &HttpRequest) -> Value {
        serde_json::from_str(req.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn missing_namespace_fails_construction() {
        let err = TastypieClient::new(AdapterConfig::new(""), schema()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn build_create_posts_to_collection() {
        let record = Record::new("book")
            .with_attribute("title", json!("Dune"))
            .with_belongs_to("author", Record::new("author").with_id("7"));
        let req = client().build_create(&record).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/api/v1/book/");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        assert_eq!(
            body_json(&req),
            json!({"title": "Dune", "author": "/api/v1/author/7/", "tags": []})
        );
    }

    #[test]
    fn build_update_puts_to_item() {
        let record = Record::new("book").with_id("3").with_attribute("title", json!("Emma"));
        let req = client().build_update(&record).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "http://localhost:3000/api/v1/book/3/");
        assert_eq!(body_json(&req)["title"], "Emma");
        assert!(body_json(&req).get("id").is_none());
    }

    #[test]
    fn update_and_delete_need_an_id() {
        let record = Record::new("book");
        assert!(matches!(
            client().build_update(&record),
            Err(Error::MissingIdentifier { .. })
        ));
        assert!(matches!(
            client().build_delete(&record),
            Err(Error::MissingIdentifier { .. })
        ));
    }

    #[test]
    fn build_delete_has_no_body() {
        let req = client().build_delete(&Record::new("book").with_id("3")).unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "http://localhost:3000/api/v1/book/3/");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_find_many_uses_set_sub_resource() {
        let ids = vec!["1".to_string(), "4".to_string()];
        let req = client().build_find_many("book", &ids).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/api/v1/book/set/1;4/");
        assert!(client().build_find_many("book", &[]).is_err());
    }

    #[test]
    fn build_find_all_resumes_from_cursor() {
        let c = client();
        let first = c.build_find_all("book", None).unwrap();
        assert_eq!(first.path, "http://localhost:3000/api/v1/book/");
        let next = c
            .build_find_all("book", Some("/api/v1/book/?limit=20&offset=40"))
            .unwrap();
        assert_eq!(next.path, "http://localhost:3000/api/v1/book/?offset=40");
        let stale = c.build_find_all("book", Some("/api/v1/book/")).unwrap_err();
        assert!(matches!(stale, Error::MalformedCursor { .. }));
    }

    #[test]
    fn build_find_query_encodes_parameters() {
        let query = vec![
            ("title".to_string(), "War & Peace".to_string()),
            ("limit".to_string(), "5".to_string()),
        ];
        let req = client().build_find_query("book", &query).unwrap();
        assert_eq!(
            req.path,
            "http://localhost:3000/api/v1/book/?title=War%20%26%20Peace&limit=5"
        );
    }

    #[test]
    fn unknown_resource_is_rejected() {
        assert_eq!(
            client().build_find("magazine", "1").unwrap_err(),
            Error::UnknownResourceType("magazine".to_string())
        );
    }

    #[test]
    fn create_success_reconciles_server_id() {
        let record = Record::new("book");
        let transition = client().complete_create(
            &record,
            Ok(response(201, r#"{"id": 9, "title": "Dune", "author": "/api/v1/author/7/"}"#)),
        );
        let Transition::Saved { id, entity } = transition else {
            panic!("expected a saved transition");
        };
        assert_eq!(id.as_deref(), Some("9"));
        let entity = entity.unwrap();
        assert_eq!(entity.belongs_to["author"], "7");
    }

    #[test]
    fn create_with_empty_body_reads_location() {
        let record = Record::new("book");
        let mut resp = response(201, "");
        resp.headers
            .push(("Location".to_string(), "http://localhost:3000/api/v1/book/11/".to_string()));
        assert_eq!(
            client().complete_create(&record, Ok(resp)),
            Transition::Saved {
                id: Some("11".to_string()),
                entity: None
            }
        );
    }

    #[test]
    fn location_without_trailing_slash_still_names_the_id() {
        let record = Record::new("book");
        for location in ["http://h/api/v1/book/11", "/api/v1/book/11//"] {
            let mut resp = response(201, "");
            resp.headers.push(("Location".to_string(), location.to_string()));
            assert_eq!(
                client().complete_create(&record, Ok(resp)),
                Transition::Saved {
                    id: Some("11".to_string()),
                    entity: None
                },
                "{location}"
            );
        }
    }

    #[test]
    fn empty_id_never_targets_the_collection() {
        let c = client();
        let record = Record::new("book").with_id("");
        assert!(matches!(
            c.build_update(&record),
            Err(Error::MissingIdentifier { .. })
        ));
        assert!(matches!(
            c.build_delete(&record),
            Err(Error::MissingIdentifier { .. })
        ));
        assert!(matches!(
            c.build_find("book", ""),
            Err(Error::MissingIdentifier { .. })
        ));
    }

    #[test]
    fn create_failure_carries_raw_transport_error() {
        let record = Record::new("book");
        let transition = client().complete_create(&record, Ok(response(400, "bad title")));
        assert_eq!(
            transition,
            Transition::Failed(Error::Transport(TransportFailure::Status {
                status: 400,
                body: "bad title".to_string()
            }))
        );
    }

    #[test]
    fn update_network_failure_is_an_error_transition() {
        let record = Record::new("book").with_id("3");
        let failure = TransportFailure::Network("reset".to_string());
        assert_eq!(
            client().complete_update(&record, Err(failure.clone())),
            Transition::Failed(Error::Transport(failure))
        );
    }

    #[test]
    fn update_success_keeps_existing_id() {
        let record = Record::new("book").with_id("3");
        let transition =
            client().complete_update(&record, Ok(response(200, r#"{"id": 3, "title": "Emma"}"#)));
        let Transition::Saved { id, entity } = transition else {
            panic!("expected a saved transition");
        };
        assert_eq!(id, None);
        assert_eq!(entity.unwrap().attributes["title"], "Emma");
    }

    #[test]
    fn update_with_bad_json_fails() {
        let record = Record::new("book").with_id("3");
        let transition = client().complete_update(&record, Ok(response(200, "not json")));
        assert!(matches!(transition, Transition::Failed(Error::Deserialization(_))));
    }

    #[test]
    fn delete_outcomes() {
        let record = Record::new("book").with_id("3");
        let c = client();
        assert_eq!(c.complete_delete(&record, Ok(response(204, ""))), Transition::Deleted);
        let transition = c.complete_delete(&record, Ok(response(404, "")));
        let Transition::Failed(err) = transition else {
            panic!("expected a failed transition");
        };
        assert!(err.transport().unwrap().is_not_found());
    }

    #[test]
    fn parse_collection_extracts_envelope() {
        let body = r#"{"meta": {"next": "/api/v1/book/?offset=20"}, "objects": [{"id": 1}, {"id": 2}]}"#;
        let collection = client().parse_collection("book", response(200, body)).unwrap();
        assert_eq!(collection.entities.len(), 2);
        assert_eq!(collection.cursor.as_deref(), Some("/api/v1/book/?offset=20"));
    }

    #[test]
    fn parse_find_rejects_error_status() {
        let err = client().parse_find("book", response(500, "boom")).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportFailure::Status { status: 500, .. })
        ));
    }
}
