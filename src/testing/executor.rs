//! Capability-adaptive executor
//!
//! Element and relation operations exist in a batch form (array body or
//! multi-valued `ids` query on the collection route) and a per-item form. The
//! executor tries the batch form, and when the server rejects it, replays the
//! same items one request at a time. Either way the caller gets one result per
//! input item, in input order.
//!
//! Whether the batch form works is remembered per operation for the rest of
//! the run, so a rejected batch route is not probed again.

use std::collections::HashMap;
use std::fmt;

use serde_json::{json, Map, Value};

use crate::http::{ApiRequest, EndpointResult, ResponseShape, Transport};

use super::routes;
use super::step::StepRunner;

/// Model collections with batch routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Elements,
    Relations,
}

impl Collection {
    pub fn route(&self) -> &'static str {
        match self {
            Collection::Elements => routes::ELEMENTS,
            Collection::Relations => routes::RELATIONS,
        }
    }

    pub fn item_route(&self, id: &str) -> String {
        match self {
            Collection::Elements => routes::element(id),
            Collection::Relations => routes::relation(id),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Collection::Elements => "elements",
            Collection::Relations => "relations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Read,
    Patch,
    Delete,
}

/// What gets placed on a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachKind {
    Element,
    Relation,
}

impl AttachKind {
    pub fn route(&self, view_id: &str) -> String {
        match self {
            AttachKind::Element => routes::view_add_element(view_id),
            AttachKind::Relation => routes::view_add_relation(view_id),
        }
    }
}

/// An operation family whose batch support is tracked separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Bulk(Collection, Verb),
    Attach(AttachKind),
}

impl Operation {
    /// Whether `status` from the batch form counts as success
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            Operation::Bulk(_, Verb::Create) | Operation::Attach(_) => matches!(status, 200 | 201),
            Operation::Bulk(_, Verb::Read) | Operation::Bulk(_, Verb::Patch) => status == 200,
            Operation::Bulk(_, Verb::Delete) => (200..300).contains(&status),
        }
    }

    /// Whether one object in answer to a batch may stand for every item
    ///
    /// Creates and reads must return one entity per item, so a lone object
    /// only covers the first.
    pub fn shares_acknowledgement(&self) -> bool {
        !matches!(self, Operation::Bulk(_, Verb::Create | Verb::Read))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Bulk(collection, verb) => {
                let verb = match verb {
                    Verb::Create => "create",
                    Verb::Read => "read",
                    Verb::Patch => "patch",
                    Verb::Delete => "delete",
                };
                write!(f, "{verb} {}", collection.label())
            }
            Operation::Attach(AttachKind::Element) => f.write_str("attach elements to view"),
            Operation::Attach(AttachKind::Relation) => f.write_str("attach relations to view"),
        }
    }
}

/// Which form of an operation produced the results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Batch,
    PerItem,
}

/// Batch support learned during one run
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    known: HashMap<Operation, bool>,
}

impl Capabilities {
    /// `None` until the operation has been tried
    pub fn supports_batch(&self, op: Operation) -> Option<bool> {
        self.known.get(&op).copied()
    }

    pub fn record(&mut self, op: Operation, supported: bool) {
        if self.known.insert(op, supported) != Some(supported) {
            tracing::debug!(operation = %op, supported, "batch capability recorded");
        }
    }
}

/// Partial update of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub id: String,
    /// Fields to change, e.g. `{"name": "E1r"}`
    pub changes: Value,
}

impl Patch {
    pub fn new(id: impl Into<String>, changes: Value) -> Self {
        Self {
            id: id.into(),
            changes,
        }
    }

    /// Item of a batch PATCH body: the changes plus `id`
    pub fn batch_item(&self) -> Value {
        let mut item = match &self.changes {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        item.insert("id".to_string(), json!(self.id));
        Value::Object(item)
    }
}

/// Per-item results of an adaptive operation
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub path: ExecutionPath,
    /// One entry per input item, in input order
    pub results: Vec<EndpointResult>,
}

impl BatchOutcome {
    fn empty() -> Self {
        Self {
            path: ExecutionPath::Batch,
            results: Vec::new(),
        }
    }

    /// Split a batch response into per-item results
    ///
    /// A list body is matched to the inputs position by position. A single
    /// object is repeated for every item when `shared_ack` is set, and is
    /// otherwise the first item of a list.
    fn from_batch(response: EndpointResult, expected: usize, shared_ack: bool) -> Self {
        let status = response.status;
        let bodies = match ResponseShape::from(response.body) {
            ResponseShape::Single(body) if shared_ack => vec![body; expected],
            shape => {
                let mut items = shape.into_items();
                if items.len() != expected {
                    tracing::warn!(
                        expected,
                        received = items.len(),
                        "batch response length differs from request"
                    );
                    items.resize(expected, Value::Null);
                }
                items
            }
        };

        Self {
            path: ExecutionPath::Batch,
            results: bodies
                .into_iter()
                .map(|body| EndpointResult::new(status, body))
                .collect(),
        }
    }

    /// `id` of every result, in input order
    pub fn ids(&self) -> Vec<Option<String>> {
        self.results
            .iter()
            .map(|r| r.id().map(str::to_string))
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(EndpointResult::is_success)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Runs batch-or-per-item operations through the step runner
pub struct AdaptiveExecutor<'a, T: ?Sized> {
    transport: &'a T,
    steps: &'a StepRunner,
    capabilities: Capabilities,
}

impl<'a, T> AdaptiveExecutor<'a, T>
where
    T: Transport + ?Sized,
{
    pub fn new(transport: &'a T, steps: &'a StepRunner) -> Self {
        Self {
            transport,
            steps,
            capabilities: Capabilities::default(),
        }
    }

    pub fn supports_batch(&self, op: Operation) -> Option<bool> {
        self.capabilities.supports_batch(op)
    }

    pub fn transport(&self) -> &'a T {
        self.transport
    }

    pub fn steps(&self) -> &'a StepRunner {
        self.steps
    }

    /// A single logged request
    pub async fn request(&self, description: &str, request: ApiRequest) -> EndpointResult {
        self.steps
            .run(description, self.transport.send(request))
            .await
    }

    /// Create entities; per-item form posts each object to the collection
    pub async fn create(&mut self, collection: Collection, items: &[Value]) -> BatchOutcome {
        let route = collection.route();
        let batch = ApiRequest::post(route).json(Value::Array(items.to_vec()));
        let singles = items
            .iter()
            .map(|item| ApiRequest::post(route).json(item.clone()))
            .collect();
        self.execute(Operation::Bulk(collection, Verb::Create), batch, singles, None)
            .await
    }

    /// Read entities by id; per-item form is `GET /<collection>/{id}`
    pub async fn read(&mut self, collection: Collection, ids: &[String]) -> BatchOutcome {
        let batch = ApiRequest::get(collection.route()).query_many("ids", ids.iter().cloned());
        let singles = ids
            .iter()
            .map(|id| ApiRequest::get(collection.item_route(id)))
            .collect();
        self.execute(Operation::Bulk(collection, Verb::Read), batch, singles, None)
            .await
    }

    /// Update entities; per-item form is `PATCH /<collection>/{id}`
    pub async fn patch(&mut self, collection: Collection, patches: &[Patch]) -> BatchOutcome {
        let route = collection.route();
        let batch = ApiRequest::patch(route).json(Value::Array(
            patches.iter().map(Patch::batch_item).collect(),
        ));
        let singles = patches
            .iter()
            .map(|p| ApiRequest::patch(collection.item_route(&p.id)).json(p.changes.clone()))
            .collect();
        let probe = ApiRequest::patch(route).json(json!([]));
        self.execute(Operation::Bulk(collection, Verb::Patch), batch, singles, Some(probe))
            .await
    }

    /// Delete entities; per-item form is `DELETE /<collection>/{id}`
    pub async fn delete(&mut self, collection: Collection, ids: &[String]) -> BatchOutcome {
        let route = collection.route();
        let batch = ApiRequest::delete(route).json(Value::Array(
            ids.iter().map(|id| json!({ "id": id })).collect(),
        ));
        let singles = ids
            .iter()
            .map(|id| ApiRequest::delete(collection.item_route(id)))
            .collect();
        let probe = ApiRequest::delete(route).json(json!([]));
        self.execute(Operation::Bulk(collection, Verb::Delete), batch, singles, Some(probe))
            .await
    }

    /// Place elements or relations on a view; per-item form posts each object
    pub async fn attach(&mut self, view_id: &str, kind: AttachKind, items: &[Value]) -> BatchOutcome {
        let route = kind.route(view_id);
        let batch = ApiRequest::post(&route).json(Value::Array(items.to_vec()));
        let singles = items
            .iter()
            .map(|item| ApiRequest::post(&route).json(item.clone()))
            .collect();
        self.execute(Operation::Attach(kind), batch, singles, None)
            .await
    }

    async fn execute(
        &mut self,
        op: Operation,
        batch: ApiRequest,
        singles: Vec<ApiRequest>,
        probe: Option<ApiRequest>,
    ) -> BatchOutcome {
        let expected = singles.len();
        if expected == 0 {
            return BatchOutcome::empty();
        }

        // The probe only decides the path; its result is dropped
        if self.capabilities.supports_batch(op).is_none() {
            if let Some(probe) = probe {
                let description = format!("{} (capability probe)", probe.describe());
                let result = self.request(&description, probe).await;
                self.capabilities.record(op, op.accepts(result.status));
            }
        }

        if self.capabilities.supports_batch(op) != Some(false) {
            let batch_label = batch.describe();
            let description = format!("{batch_label} (batch of {expected})");
            let result = self.request(&description, batch).await;
            if op.accepts(result.status) {
                self.capabilities.record(op, true);
                return BatchOutcome::from_batch(result, expected, op.shares_acknowledgement());
            }
            self.capabilities.record(op, false);
            self.steps.note(&format!(
                "Batch {batch_label} not supported (HTTP {}), falling back to per-item",
                result.status
            ));
        } else {
            self.steps
                .note(&format!("Batch {op} unsupported, using per-item requests"));
        }

        let mut results = Vec::with_capacity(expected);
        for (i, request) in singles.into_iter().enumerate() {
            let description = format!("{} (item {}/{expected})", request.describe(), i + 1);
            results.push(self.request(&description, request).await);
        }
        BatchOutcome {
            path: ExecutionPath::PerItem,
            results,
        }
    }
}
