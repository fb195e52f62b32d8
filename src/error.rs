use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasourceError {
    #[error("Multiple queries are not supported yet ({count} eligible targets)")]
    MultipleQueriesUnsupported { count: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected backend status: {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DatasourceError {
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Static label used for the failure counters.
    pub fn category(&self) -> &'static str {
        match self {
            DatasourceError::MultipleQueriesUnsupported { .. } => "multiple_queries",
            DatasourceError::Transport(_) => "transport",
            DatasourceError::UnexpectedStatus { .. } => "unexpected_status",
            DatasourceError::Decode(_) => "decode",
            DatasourceError::Configuration(_) => "configuration",
            DatasourceError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for DatasourceError {
    fn from(err: reqwest::Error) -> Self {
        DatasourceError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DatasourceError {
    fn from(err: serde_json::Error) -> Self {
        DatasourceError::Decode(err.to_string())
    }
}

impl From<prometheus::Error> for DatasourceError {
    fn from(err: prometheus::Error) -> Self {
        DatasourceError::Internal(err.to_string())
    }
}

impl IntoResponse for DatasourceError {
    fn into_response(self) -> Response {
        let status = match self {
            DatasourceError::MultipleQueriesUnsupported { .. } => StatusCode::BAD_REQUEST,
            // Malformed request bodies are rejected by the extractors, so a
            // decode failure here is always the backend's payload.
            DatasourceError::Transport(_)
            | DatasourceError::UnexpectedStatus { .. }
            | DatasourceError::Decode(_) => StatusCode::BAD_GATEWAY,
            DatasourceError::Configuration(_) | DatasourceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, DatasourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = DatasourceError::MultipleQueriesUnsupported { count: 2 }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = DatasourceError::transport("connection refused").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = DatasourceError::UnexpectedStatus { status: 503 }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = DatasourceError::Decode("expected value".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = DatasourceError::configuration("missing url").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_json_error_is_decode() {
        let err: DatasourceError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.category(), "decode");
    }
}
