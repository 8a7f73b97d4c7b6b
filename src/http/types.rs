//! Request and result types shared by every API call

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// HTTP methods used against the modeling API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Ordered query parameters
///
/// A key given several values is serialized as a repeated parameter
/// (`ids=a&ids=b`), which is how the API accepts multi-id reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn push_many<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        for value in values {
            self.push(key, value);
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values recorded under `key`, in insertion order
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A single request against the API, relative to the base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Query,
    pub body: Option<Value>,
    /// Overrides the client's default timeout when set
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push(key, value);
        self
    }

    pub fn query_many<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.query.push_many(key, values);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Short form used in log lines, e.g. `PATCH /elements`
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Normalized outcome of one API call
///
/// `status` 0 means the request never produced an HTTP response (connection
/// refused, DNS failure, timeout); `body` then carries `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointResult {
    pub status: u16,
    pub body: Value,
}

impl EndpointResult {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn transport_failure(message: impl fmt::Display) -> Self {
        Self {
            status: 0,
            body: error_body(message),
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }

    /// Any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn status_in(&self, codes: &[u16]) -> bool {
        codes.contains(&self.status)
    }

    /// The entity identifier carried in the body's `id` field
    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    /// The `{status, body}` object printed for each step
    pub fn report(&self) -> Value {
        json!({ "status": self.status, "body": self.body })
    }
}

/// `{"error": message}`
pub fn error_body(message: impl fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

/// Body of a batch-or-singleton endpoint
///
/// Batch routes answer with an array, singular routes with one object; both
/// are flattened into an ordered sequence right after the call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    Single(Value),
    List(Vec<Value>),
}

impl From<Value> for ResponseShape {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => ResponseShape::List(items),
            other => ResponseShape::Single(other),
        }
    }
}

impl ResponseShape {
    pub fn into_items(self) -> Vec<Value> {
        match self {
            ResponseShape::Single(value) => vec![value],
            ResponseShape::List(items) => items,
        }
    }
}
