//! Datasource adapter for the SAYMON monitoring REST API.
//!
//! Turns dashboard panel queries into SAYMON history requests, normalizes
//! the backend's response shapes into `{target, datapoints}` series, and
//! resolves template variables and tag keys/values for dashboard templating.

pub mod api;
pub mod config;
pub mod datasource;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod mock_transport;
pub mod models;
pub mod templating;
pub mod transport;

pub use config::{ConnectionConfig, QueryWindow, ServiceConfig};
pub use datasource::Datasource;
pub use error::{DatasourceError, Result};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

pub const SERVICE_NAME: &str = "saymon-datasource";
