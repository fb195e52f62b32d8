use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::ServiceConfig,
    datasource::Datasource,
    metrics,
    models::{QueryOptions, QueryResponse, SearchRequest, TextValue},
    templating::VariableInterpolator,
    transport::ReqwestTransport,
    DatasourceError, Result, SERVICE_NAME,
};

#[derive(Clone)]
pub struct AppState {
    pub datasource: Arc<Datasource>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(test_datasource))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .route("/query", post(query))
        .route("/search", post(search))
        .route("/tag-keys", post(tag_keys))
        .route("/tag-values", post(tag_values))
        .route("/annotations", post(annotations))
        .route("/objects/:object_id/metrics", get(list_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn test_datasource(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let response = match state.datasource.test_datasource().await? {
        Some(result) => (StatusCode::OK, Json(json!(result))),
        None => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "status": "error",
                "message": "Backend did not confirm connectivity",
                "title": "Error"
            })),
        ),
    };
    Ok(response)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
    }))
}

async fn prometheus_metrics() -> Result<impl IntoResponse> {
    let body = metrics::gather()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

async fn query(
    State(state): State<AppState>,
    Json(options): Json<QueryOptions>,
) -> Result<Json<QueryResponse>> {
    info!(targets = options.targets.len(), "Handling series query");
    Ok(Json(state.datasource.query(&options).await?))
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<TextValue>>> {
    let values = state
        .datasource
        .metric_find_query_scoped(&request.target, request.scoped_vars.as_ref())
        .await?;
    Ok(Json(values))
}

async fn tag_keys(
    State(state): State<AppState>,
    Json(options): Json<Value>,
) -> Result<Json<Vec<TextValue>>> {
    Ok(Json(state.datasource.get_tag_keys(&options).await?))
}

async fn tag_values(
    State(state): State<AppState>,
    Json(options): Json<Value>,
) -> Result<Json<Vec<TextValue>>> {
    Ok(Json(state.datasource.get_tag_values(&options).await?))
}

async fn annotations(State(state): State<AppState>, Json(options): Json<Value>) -> Json<Value> {
    state.datasource.annotation_query(&options);
    Json(json!([]))
}

async fn list_metrics(
    State(state): State<AppState>,
    Path(object_id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.datasource.list_metrics(&object_id).await?))
}

pub async fn start_server(config: ServiceConfig) -> Result<()> {
    let connection = config.connection()?;
    let transport = ReqwestTransport::new(Duration::from_millis(config.request_timeout_ms))?;
    let datasource = Datasource::new(
        connection,
        Arc::new(transport),
        Arc::new(VariableInterpolator::new()),
    )
    .with_query_window(config.query_window);

    let state = AppState {
        datasource: Arc::new(datasource),
    };

    let app = router(state);
    info!(
        backend = %config.backend_url,
        "Starting datasource service on {}", config.bind_address
    );

    let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
        DatasourceError::Internal(format!("Failed to bind to address: {}", e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| DatasourceError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
