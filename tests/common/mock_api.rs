//! In-process stand-in for the modeling API
//!
//! Serves the routes the smoke scenario touches from an in-memory model. With
//! `batch` set, the collection routes accept array bodies and `ids` queries;
//! without it only the per-item routes work and batch attempts are rejected.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Server behavior switches
#[derive(Debug, Clone, Copy)]
pub struct MockOptions {
    pub batch: bool,
    pub model_loaded: bool,
    pub ready: bool,
    pub scripting: bool,
    /// Seed one view so the scenario does not create its own
    pub existing_view: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            batch: true,
            model_loaded: true,
            ready: true,
            scripting: true,
            existing_view: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub name: String,
    pub objects: Vec<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelState {
    pub elements: BTreeMap<String, Value>,
    pub relations: BTreeMap<String, Value>,
    pub views: BTreeMap<String, ViewState>,
    /// Snapshot of every entity at the moment it was deleted
    pub deleted: Vec<Value>,
    /// `METHOD /path` and response status of every request
    pub requests: Vec<(String, u16)>,
    pub saved: bool,
    next_id: u64,
}

impl ModelState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn entities(&mut self, kind: Kind) -> &mut BTreeMap<String, Value> {
        match kind {
            Kind::Element => &mut self.elements,
            Kind::Relation => &mut self.relations,
        }
    }

    fn create(&mut self, kind: Kind, item: &Value) -> Result<Value, String> {
        let Value::Object(fields) = item else {
            return Err("object expected".to_string());
        };
        if fields.get("type").and_then(Value::as_str).is_none() {
            return Err("type is required".to_string());
        }
        if kind == Kind::Relation {
            for end in ["sourceId", "targetId"] {
                let id = fields.get(end).and_then(Value::as_str).unwrap_or_default();
                if !self.elements.contains_key(id) {
                    return Err(format!("{end} '{id}' not found"));
                }
            }
        }

        let id = self.next_id(kind.prefix());
        let mut entity = fields.clone();
        entity.insert("id".to_string(), json!(id));
        let entity = Value::Object(entity);
        self.entities(kind).insert(id, entity.clone());
        Ok(entity)
    }

    fn update(&mut self, kind: Kind, id: &str, changes: &Value) -> Option<Value> {
        let entity = self.entities(kind).get_mut(id)?;
        if let (Value::Object(target), Value::Object(changes)) = (&mut *entity, changes) {
            for (key, value) in changes {
                if key != "id" {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        Some(entity.clone())
    }

    fn remove(&mut self, kind: Kind, id: &str) -> bool {
        match self.entities(kind).remove(id) {
            Some(entity) => {
                self.deleted.push(entity);
                true
            }
            None => false,
        }
    }

    fn place(&mut self, view_id: &str, kind: Kind, item: &Value) -> Result<Value, String> {
        let key = match kind {
            Kind::Element => "elementId",
            Kind::Relation => "relationId",
        };
        let target = item.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        if !self.entities(kind).contains_key(&target) {
            return Err(format!("{key} required"));
        }

        let object_id = self.next_id("obj");
        let mut object = match item {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        object.insert("objectId".to_string(), json!(object_id));
        let object = Value::Object(object);

        let view = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| format!("view '{view_id}' not found"))?;
        view.objects.push(object.clone());
        Ok(object)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Element,
    Relation,
}

impl Kind {
    fn prefix(&self) -> &'static str {
        match self {
            Kind::Element => "el",
            Kind::Relation => "rel",
        }
    }
}

#[derive(Clone)]
struct MockApi {
    options: MockOptions,
    model: Arc<Mutex<ModelState>>,
}

impl MockApi {
    fn lock(&self) -> MutexGuard<'_, ModelState> {
        self.model.lock().unwrap()
    }
}

/// Handle for a running mock server; stops it on drop
pub struct MockServer {
    port: u16,
    base_url: String,
    api: MockApi,
    join: JoinHandle<()>,
}

impl MockServer {
    pub async fn spawn(options: MockOptions) -> Self {
        let mut model = ModelState::default();
        if options.existing_view {
            model.views.insert(
                "view-0".to_string(),
                ViewState {
                    name: "Existing View".to_string(),
                    objects: Vec::new(),
                },
            );
        }
        let api = MockApi {
            options,
            model: Arc::new(Mutex::new(model)),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(api.clone());
        let join = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            port: addr.port(),
            base_url: format!("http://{addr}"),
            api,
            join,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn snapshot(&self) -> ModelState {
        self.api.lock().clone()
    }

    pub fn requests(&self) -> Vec<(String, u16)> {
        self.api.lock().requests.clone()
    }

    /// Insert an element under a caller-chosen id
    pub fn seed_element(&self, id: &str, name: &str) {
        self.api.lock().elements.insert(
            id.to_string(),
            json!({ "id": id, "type": "business-actor", "name": name }),
        );
    }

    /// Names of deleted entities, in deletion order
    pub fn deleted_names(&self) -> Vec<String> {
        self.api
            .lock()
            .deleted
            .iter()
            .filter_map(|e| e.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.join.abort();
    }
}

fn router(api: MockApi) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/openapi.json", get(openapi))
        .route("/types", get(types))
        .route("/script/engines", get(script_engines))
        .route("/script/run", post(script_run))
        .route("/folders", get(folders))
        .route("/elements", any(elements))
        .route("/elements/{id}", any(element))
        .route("/relations", any(relations))
        .route("/relations/{id}", any(relation))
        .route("/views", any(views))
        .route("/views/{id}", any(view))
        .route("/views/{id}/content", get(view_content))
        .route("/views/{id}/add-element", post(add_element))
        .route("/views/{id}/add-relation", post(add_relation))
        .route("/views/{id}/objects/{object_id}", any(view_object))
        .route("/model/save", post(save))
        .layer(middleware::from_fn_with_state(api.clone(), record))
        .with_state(api)
}

async fn record(State(api): State<MockApi>, request: Request, next: Next) -> Response {
    let line = format!("{} {}", request.method(), request.uri().path());
    let response = next.run(request).await;
    api.lock().requests.push((line, response.status().as_u16()));
    response
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    reply(status, json!({ "error": message.into() }))
}

fn parse(body: &Bytes) -> Option<Value> {
    serde_json::from_slice(body).ok()
}

async fn status(State(api): State<MockApi>) -> Response {
    if api.options.ready {
        reply(StatusCode::OK, json!({ "ok": true, "service": "archi-mcp" }))
    } else {
        fail(StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

async fn openapi() -> Response {
    reply(StatusCode::OK, json!({ "openapi": "3.0.1", "paths": {} }))
}

async fn types() -> Response {
    reply(
        StatusCode::OK,
        json!({
            "elements": ["business-actor", "business-role", "business-process"],
            "relations": ["association-relationship"],
        }),
    )
}

async fn script_engines(State(api): State<MockApi>) -> Response {
    reply(
        StatusCode::OK,
        json!({ "installed": api.options.scripting, "engines": ["ajs"] }),
    )
}

async fn script_run(State(api): State<MockApi>) -> Response {
    if api.options.scripting {
        reply(StatusCode::OK, json!({ "ok": true, "result": 1 }))
    } else {
        fail(StatusCode::NOT_IMPLEMENTED, "scripting plugin not installed")
    }
}

async fn folders(State(api): State<MockApi>) -> Response {
    if api.options.model_loaded {
        reply(StatusCode::OK, json!([{ "id": "folder-1", "name": "Business" }]))
    } else {
        fail(StatusCode::CONFLICT, "no active model")
    }
}

async fn elements(
    State(api): State<MockApi>,
    method: Method,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    collection(&api, Kind::Element, method, &query, &body)
}

async fn relations(
    State(api): State<MockApi>,
    method: Method,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    collection(&api, Kind::Relation, method, &query, &body)
}

async fn element(
    State(api): State<MockApi>,
    method: Method,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    item(&api, Kind::Element, method, &id, &body)
}

async fn relation(
    State(api): State<MockApi>,
    method: Method,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    item(&api, Kind::Relation, method, &id, &body)
}

fn collection(
    api: &MockApi,
    kind: Kind,
    method: Method,
    query: &[(String, String)],
    body: &Bytes,
) -> Response {
    let batch = api.options.batch;
    let body = parse(body);
    let mut model = api.lock();

    match (method, body) {
        (Method::POST, Some(Value::Array(items))) if batch => {
            let mut created = Vec::with_capacity(items.len());
            for item in &items {
                match model.create(kind, item) {
                    Ok(entity) => created.push(entity),
                    Err(e) => return fail(StatusCode::BAD_REQUEST, e),
                }
            }
            reply(StatusCode::CREATED, Value::Array(created))
        }
        (Method::POST, Some(Value::Array(_))) => {
            fail(StatusCode::BAD_REQUEST, "array body not supported")
        }
        (Method::POST, Some(item)) => match model.create(kind, &item) {
            Ok(entity) => reply(StatusCode::CREATED, entity),
            Err(e) => fail(StatusCode::BAD_REQUEST, e),
        },
        (Method::GET, _) if batch => {
            let found = query
                .iter()
                .filter(|(key, _)| key == "ids")
                .filter_map(|(_, id)| model.entities(kind).get(id).cloned())
                .collect();
            reply(StatusCode::OK, Value::Array(found))
        }
        (Method::PATCH, Some(Value::Array(items))) if batch => {
            let mut updated = Vec::with_capacity(items.len());
            for item in &items {
                let id = item.get("id").and_then(Value::as_str).unwrap_or_default();
                match model.update(kind, id, item) {
                    Some(entity) => updated.push(entity),
                    None => return fail(StatusCode::NOT_FOUND, format!("'{id}' not found")),
                }
            }
            reply(StatusCode::OK, Value::Array(updated))
        }
        (Method::DELETE, Some(Value::Array(items))) if batch => {
            let deleted = items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .filter(|id| model.remove(kind, id))
                .count();
            reply(StatusCode::OK, json!({ "deleted": deleted }))
        }
        _ => fail(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
    }
}

fn item(api: &MockApi, kind: Kind, method: Method, id: &str, body: &Bytes) -> Response {
    let body = parse(body);
    let mut model = api.lock();

    match method {
        Method::GET => match model.entities(kind).get(id) {
            Some(entity) => reply(StatusCode::OK, entity.clone()),
            None => fail(StatusCode::NOT_FOUND, format!("'{id}' not found")),
        },
        Method::PATCH => match model.update(kind, id, &body.unwrap_or(Value::Null)) {
            Some(entity) => reply(StatusCode::OK, entity),
            None => fail(StatusCode::NOT_FOUND, format!("'{id}' not found")),
        },
        Method::DELETE if model.remove(kind, id) => StatusCode::NO_CONTENT.into_response(),
        Method::DELETE => fail(StatusCode::NOT_FOUND, format!("'{id}' not found")),
        _ => fail(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
    }
}

async fn views(State(api): State<MockApi>, method: Method, body: Bytes) -> Response {
    let body = parse(&body);
    let mut model = api.lock();

    match method {
        Method::GET => {
            let listed = model
                .views
                .iter()
                .map(|(id, view)| json!({ "id": id, "name": view.name }))
                .collect();
            reply(StatusCode::OK, Value::Array(listed))
        }
        Method::POST => {
            let Some(name) = body
                .as_ref()
                .and_then(|b| b.get("name"))
                .and_then(Value::as_str)
            else {
                return fail(StatusCode::BAD_REQUEST, "name is required");
            };
            let id = model.next_id("view");
            model.views.insert(
                id.clone(),
                ViewState {
                    name: name.to_string(),
                    objects: Vec::new(),
                },
            );
            reply(StatusCode::CREATED, json!({ "id": id, "name": name }))
        }
        _ => fail(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
    }
}

async fn view(State(api): State<MockApi>, method: Method, Path(id): Path<String>) -> Response {
    let mut model = api.lock();

    match method {
        Method::GET => match model.views.get(&id) {
            Some(view) => reply(StatusCode::OK, json!({ "id": id, "name": view.name })),
            None => fail(StatusCode::NOT_FOUND, format!("view '{id}' not found")),
        },
        Method::DELETE => match model.views.remove(&id) {
            Some(view) => {
                model.deleted.push(json!({
                    "id": id,
                    "name": view.name,
                    "objects": view.objects,
                }));
                StatusCode::NO_CONTENT.into_response()
            }
            None => fail(StatusCode::NOT_FOUND, format!("view '{id}' not found")),
        },
        _ => fail(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
    }
}

async fn view_content(State(api): State<MockApi>, Path(id): Path<String>) -> Response {
    match api.lock().views.get(&id) {
        Some(view) => reply(StatusCode::OK, json!({ "id": id, "objects": view.objects })),
        None => fail(StatusCode::NOT_FOUND, format!("view '{id}' not found")),
    }
}

async fn add_element(State(api): State<MockApi>, Path(id): Path<String>, body: Bytes) -> Response {
    attach(&api, Kind::Element, &id, &body)
}

async fn add_relation(State(api): State<MockApi>, Path(id): Path<String>, body: Bytes) -> Response {
    attach(&api, Kind::Relation, &id, &body)
}

fn attach(api: &MockApi, kind: Kind, view_id: &str, body: &Bytes) -> Response {
    let batch = api.options.batch;
    let mut model = api.lock();

    match parse(body) {
        Some(Value::Array(items)) if batch => {
            let mut placed = Vec::with_capacity(items.len());
            for item in &items {
                match model.place(view_id, kind, item) {
                    Ok(object) => placed.push(object),
                    Err(e) => return fail(StatusCode::BAD_REQUEST, e),
                }
            }
            reply(StatusCode::CREATED, Value::Array(placed))
        }
        Some(item) => match model.place(view_id, kind, &item) {
            Ok(object) => reply(StatusCode::CREATED, object),
            Err(e) => fail(StatusCode::BAD_REQUEST, e),
        },
        None => fail(StatusCode::BAD_REQUEST, "invalid JSON"),
    }
}

async fn view_object(
    State(api): State<MockApi>,
    method: Method,
    Path((view_id, object_id)): Path<(String, String)>,
) -> Response {
    if method != Method::DELETE {
        return fail(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }
    let mut model = api.lock();
    let Some(view) = model.views.get_mut(&view_id) else {
        return fail(StatusCode::NOT_FOUND, format!("view '{view_id}' not found"));
    };
    let before = view.objects.len();
    view.objects
        .retain(|o| o.get("objectId").and_then(Value::as_str) != Some(object_id.as_str()));
    if view.objects.len() == before {
        return fail(StatusCode::NOT_FOUND, format!("object '{object_id}' not found"));
    }
    reply(StatusCode::OK, json!({ "deleted": object_id }))
}

async fn save(State(api): State<MockApi>) -> Response {
    api.lock().saved = true;
    reply(StatusCode::OK, json!({ "saved": true }))
}
