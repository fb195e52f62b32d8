//! In-memory transport for unit testing
//!
//! Replays canned responses keyed by method and URL and records every request
//! it receives, so callers can assert on exactly what the adapter sent.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::{DatasourceError, Result};

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<(Method, String), HttpResponse>,
    requests: Vec<HttpRequest>,
    failure: Option<String>,
}

/// Mock transport for unit testing
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method url` with a 200 and the given body.
    pub fn respond(&self, method: Method, url: impl Into<String>, data: Value) -> &Self {
        self.respond_with(method, url, HttpResponse::ok(data))
    }

    pub fn respond_with(
        &self,
        method: Method,
        url: impl Into<String>,
        response: HttpResponse,
    ) -> &Self {
        self.state
            .lock()
            .responses
            .insert((method, url.into()), response);
        self
    }

    /// Make every subsequent call fail with a transport error.
    pub fn fail_with(&self, message: impl Into<String>) -> &Self {
        self.state.lock().failure = Some(message.into());
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state.lock();
        debug!(method = %request.method, url = %request.url, "mock transport request");
        let key = (request.method, request.url.clone());
        state.requests.push(request);

        if let Some(message) = &state.failure {
            return Err(DatasourceError::transport(message.clone()));
        }

        state
            .responses
            .get(&key)
            .cloned()
            .ok_or_else(|| DatasourceError::transport(format!("no mock response for {} {}", key.0, key.1)))
    }
}
