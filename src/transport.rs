//! HTTP transport seam.
//!
//! The adapter never talks to the network itself. It hands fully-formed
//! [`HttpRequest`]s to a [`Transport`], which performs the call and returns
//! the status plus the parsed body. Timeouts belong to the transport.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::{DatasourceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
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
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub with_credentials: bool,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: BTreeMap::new(),
            with_credentials: false,
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: BTreeMap::new(),
            with_credentials: false,
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub data: Value,
}

impl HttpResponse {
    pub fn ok(data: Value) -> Self {
        Self { status: 200, data }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a shared `reqwest` client.
///
/// Error statuses (4xx/5xx) are surfaced as [`DatasourceError::UnexpectedStatus`];
/// any other status is returned to the caller together with its body. An empty
/// body is `null`; a non-empty body that is not JSON is a
/// [`DatasourceError::Decode`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("saymon-datasource/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DatasourceError::transport(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        // Browser credential semantics have no equivalent here; the flag is
        // carried so recording transports and proxies can honour it.
        trace!(
            with_credentials = request.with_credentials,
            "dispatching backend request"
        );

        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "backend request failed");
            DatasourceError::from(e)
        })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            warn!(url = %request.url, status = status.as_u16(), "backend returned error status");
            return Err(DatasourceError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let data = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| {
                warn!(url = %request.url, error = %e, "backend body is not JSON");
                DatasourceError::Decode(format!("backend body is not JSON: {}", e))
            })?
        };

        debug!(url = %request.url, status = status.as_u16(), "backend response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            data,
        })
    }
}
