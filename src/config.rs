use std::collections::BTreeMap;
use std::env;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::{DatasourceError, Result};

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// How requests authenticate against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    None,
    BasicHeader,
}

/// Which lookback window the history request asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryWindow {
    /// Always `from=1h-ago`, whatever range the host asked for.
    #[default]
    Fixed,
    /// Translate the host range into `from`/`to` epoch milliseconds.
    HostRange,
}

/// Connection settings for one backend instance.
///
/// Built once from the host's settings and never mutated afterwards; every
/// request dispatched by the adapter copies its headers and credential flag
/// from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    base_url: String,
    auth_mode: AuthMode,
    headers: BTreeMap<String, String>,
    with_credentials: bool,
}

impl ConnectionConfig {
    pub fn new(
        base_url: impl Into<String>,
        basic_auth: Option<String>,
        with_credentials: bool,
    ) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(DatasourceError::configuration("Base URL cannot be empty"));
        }

        let mut headers = BTreeMap::new();
        headers.insert(
            CONTENT_TYPE_HEADER.to_string(),
            "application/json".to_string(),
        );

        let auth_mode = match basic_auth {
            Some(auth) if !auth.is_empty() => {
                headers.insert(AUTHORIZATION_HEADER.to_string(), auth);
                AuthMode::BasicHeader
            }
            _ => AuthMode::None,
        };

        Ok(Self {
            base_url,
            auth_mode,
            headers,
            with_credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn with_credentials(&self) -> bool {
        self.with_credentials
    }
}

/// Configuration for the datasource service binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Backend base URL
    pub backend_url: String,

    /// Pre-encoded `Authorization` header value
    pub basic_auth: Option<String>,

    /// Forward credentials with backend requests
    pub with_credentials: bool,

    /// History lookback policy
    pub query_window: QueryWindow,

    /// Transport timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Emit JSON log lines instead of compact text
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            backend_url: String::new(),
            basic_auth: None,
            with_credentials: false,
            query_window: QueryWindow::Fixed,
            request_timeout_ms: 30000, // 30 seconds
            log_json: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables and defaults
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("SAYMON_URL") {
            config.backend_url = url;
        }

        if let Ok(auth) = env::var("SAYMON_BASIC_AUTH") {
            config.basic_auth = Some(auth);
        }

        if let Ok(with_credentials) = env::var("SAYMON_WITH_CREDENTIALS") {
            config.with_credentials = with_credentials.parse()?;
        }

        if let Ok(bind_addr) = env::var("SAYMON_BIND_ADDRESS") {
            config.bind_address = bind_addr;
        }

        if let Ok(honor) = env::var("SAYMON_HONOR_TIME_RANGE") {
            if honor.parse::<bool>()? {
                config.query_window = QueryWindow::HostRange;
            }
        }

        if let Ok(timeout) = env::var("SAYMON_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = timeout.parse()?;
        }

        if let Ok(log_json) = env::var("SAYMON_LOG_JSON") {
            config.log_json = log_json.parse()?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend_url.trim().is_empty() {
            return Err(anyhow!("SAYMON_URL must point at the backend"));
        }

        if self.bind_address.is_empty() {
            return Err(anyhow!("Bind address cannot be empty"));
        }

        if self.request_timeout_ms == 0 {
            return Err(anyhow!("Request timeout must be greater than 0"));
        }

        Ok(())
    }

    pub fn connection(&self) -> Result<ConnectionConfig> {
        ConnectionConfig::new(
            self.backend_url.clone(),
            self.basic_auth.clone(),
            self.with_credentials,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_without_auth() {
        let config = ConnectionConfig::new("http://saymon.local/", None, false).unwrap();

        assert_eq!(config.base_url(), "http://saymon.local");
        assert_eq!(config.auth_mode(), AuthMode::None);
        assert_eq!(config.headers().len(), 1);
        assert_eq!(
            config.headers().get(CONTENT_TYPE_HEADER).map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_basic_auth_header() {
        let config = ConnectionConfig::new(
            "http://saymon.local",
            Some("Basic dXNlcjpwYXNz".to_string()),
            true,
        )
        .unwrap();

        assert_eq!(config.auth_mode(), AuthMode::BasicHeader);
        assert!(config.with_credentials());
        assert_eq!(
            config.headers().get(AUTHORIZATION_HEADER).map(String::as_str),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn test_empty_auth_is_ignored() {
        let config =
            ConnectionConfig::new("http://saymon.local", Some(String::new()), false).unwrap();
        assert_eq!(config.auth_mode(), AuthMode::None);
        assert!(!config.headers().contains_key(AUTHORIZATION_HEADER));
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(ConnectionConfig::new("  ", None, false).is_err());
    }

    #[test]
    fn test_service_config_validation() {
        let mut config = ServiceConfig::default();
        assert!(config.validate().is_err());

        config.backend_url = "http://saymon.local".to_string();
        assert!(config.validate().is_ok());

        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    // The only test touching the process environment; keep it that way.
    #[test]
    fn test_load_reads_environment_flags() {
        const VARS: [&str; 4] = [
            "SAYMON_URL",
            "SAYMON_WITH_CREDENTIALS",
            "SAYMON_HONOR_TIME_RANGE",
            "SAYMON_REQUEST_TIMEOUT_MS",
        ];

        env::set_var("SAYMON_URL", "http://saymon.local");
        env::set_var("SAYMON_WITH_CREDENTIALS", "true");
        env::set_var("SAYMON_HONOR_TIME_RANGE", "true");
        let config = ServiceConfig::load().unwrap();

        assert_eq!(config.backend_url, "http://saymon.local");
        assert!(config.with_credentials);
        assert_eq!(config.query_window, QueryWindow::HostRange);
        assert!(config.connection().unwrap().with_credentials());

        env::set_var("SAYMON_HONOR_TIME_RANGE", "false");
        assert_eq!(ServiceConfig::load().unwrap().query_window, QueryWindow::Fixed);

        env::set_var("SAYMON_REQUEST_TIMEOUT_MS", "soon");
        assert!(ServiceConfig::load().is_err());

        for var in VARS {
            env::remove_var(var);
        }
    }
}
