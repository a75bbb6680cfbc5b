use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const NAMESPACE: &str = "/api/v1";
pub const DEFAULT_LIMIT: usize = 20;

const PAGING_PARAMS: [&str; 3] = ["offset", "limit", "format"];

pub type Row = Map<String, Value>;

#[derive(Default)]
pub struct Tables {
    rows: HashMap<String, BTreeMap<u64, Row>>,
    next_id: u64,
}

pub type Db = Arc<RwLock<Tables>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    page_size: usize,
}

pub fn app() -> Router {
    app_with_page_size(DEFAULT_LIMIT)
}

pub fn app_with_page_size(page_size: usize) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Tables::default())),
        page_size: page_size.max(1),
    };
    Router::new()
        .route("/api/v1/{resource}/", get(list_resources).post(create_resource))
        .route("/api/v1/{resource}/set/{ids}/", get(get_resource_set))
        .route(
            "/api/v1/{resource}/{id}/",
            get(get_resource).put(update_resource).delete(delete_resource),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub fn resource_uri(resource: &str, id: u64) -> String {
    format!("{NAMESPACE}/{resource}/{id}/")
}

fn page_uri(resource: &str, limit: usize, offset: usize) -> String {
    format!("{NAMESPACE}/{resource}/?limit={limit}&offset={offset}")
}

fn parse_param(params: &HashMap<String, String>, name: &str, default: usize) -> Result<usize, StatusCode> {
    match params.get(name) {
        Some(raw) => raw.parse().map_err(|_| StatusCode::BAD_REQUEST),
        None => Ok(default),
    }
}

fn matches_filters(row: &Row, filters: &[(&String, &String)]) -> bool {
    filters.iter().all(|(key, wanted)| match row.get(key.as_str()) {
        Some(Value::String(value)) => value == *wanted,
        Some(other) => other.to_string() == **wanted,
        None => false,
    })
}

async fn list_resources(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let offset = parse_param(&params, "offset", 0)?;
    let limit = parse_param(&params, "limit", state.page_size)?.max(1);
    let filters: Vec<(&String, &String)> = params
        .iter()
        .filter(|(key, _)| !PAGING_PARAMS.contains(&key.as_str()))
        .collect();

    let db = state.db.read().await;
    let matching: Vec<&Row> = db
        .rows
        .get(&resource)
        .map(|table| table.values().filter(|row| matches_filters(row, &filters)).collect())
        .unwrap_or_default();
    let total = matching.len();
    let objects: Vec<Row> = matching.into_iter().skip(offset).take(limit).cloned().collect();

    let next = if offset + limit < total {
        Value::String(page_uri(&resource, limit, offset + limit))
    } else {
        Value::Null
    };
    let previous = if offset > 0 {
        Value::String(page_uri(&resource, limit, offset.saturating_sub(limit)))
    } else {
        Value::Null
    };

    Ok(Json(json!({
        "meta": {
            "limit": limit,
            "next": next,
            "offset": offset,
            "previous": previous,
            "total_count": total,
        },
        "objects": objects,
    })))
}

async fn create_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(mut input): Json<Row>,
) -> (StatusCode, [(header::HeaderName, String); 1], Json<Row>) {
    let mut db = state.db.write().await;
    db.next_id += 1;
    let id = db.next_id;
    let uri = resource_uri(&resource, id);
    input.insert("id".to_string(), json!(id));
    input.insert("resource_uri".to_string(), json!(uri));
    db.rows.entry(resource.clone()).or_default().insert(id, input.clone());
    tracing::debug!(%resource, id, "created");
    (StatusCode::CREATED, [(header::LOCATION, uri)], Json(input))
}

async fn get_resource(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Row>, StatusCode> {
    let id: u64 = id.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    let db = state.db.read().await;
    db.rows
        .get(&resource)
        .and_then(|table| table.get(&id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_resource(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(input): Json<Row>,
) -> Result<Json<Row>, StatusCode> {
    let id: u64 = id.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    let mut db = state.db.write().await;
    let row = db
        .rows
        .get_mut(&resource)
        .and_then(|table| table.get_mut(&id))
        .ok_or(StatusCode::NOT_FOUND)?;
    for (key, value) in input {
        if key != "id" && key != "resource_uri" {
            row.insert(key, value);
        }
    }
    Ok(Json(row.clone()))
}

async fn delete_resource(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    let id: u64 = id.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    let mut db = state.db.write().await;
    db.rows
        .get_mut(&resource)
        .and_then(|table| table.remove(&id))
        .map(|_| {
            tracing::debug!(%resource, id, "deleted");
            StatusCode::NO_CONTENT
        })
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_resource_set(
    State(state): State<AppState>,
    Path((resource, ids)): Path<(String, String)>,
) -> Json<Value> {
    let db = state.db.read().await;
    let table = db.rows.get(&resource);
    let mut objects = Vec::new();
    let mut not_found = Vec::new();
    for raw in ids.split(';').filter(|raw| !raw.is_empty()) {
        let row = raw
            .parse::<u64>()
            .ok()
            .and_then(|id| table.and_then(|table| table.get(&id)));
        match row {
            Some(row) => objects.push(Value::Object(row.clone())),
            None => not_found.push(Value::String(raw.to_string())),
        }
    }
    Json(json!({ "objects": objects, "not_found": not_found }))
}
