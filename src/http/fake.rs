//! Scripted transport for unit tests

use std::sync::Mutex;

use async_trait::async_trait;

use super::client::Transport;
use super::types::{ApiRequest, EndpointResult};

type Handler = Box<dyn Fn(&ApiRequest) -> EndpointResult + Send + Sync>;

/// Answers every request through a closure and records what was sent
pub struct FakeTransport {
    handler: Handler,
    sent: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> EndpointResult + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// `METHOD /path` of every request, in order
    pub fn log(&self) -> Vec<String> {
        self.sent().iter().map(ApiRequest::describe).collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> EndpointResult {
        let result = (self.handler)(&request);
        self.sent.lock().unwrap().push(request);
        result
    }

    fn base_url(&self) -> &str {
        "http://fake"
    }
}
