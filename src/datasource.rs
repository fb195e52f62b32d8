//! The datasource adapter.
//!
//! Translates host panel queries into SAYMON REST calls and normalizes the
//! backend's response shapes into the host's series and templating formats.
//! Every backend call goes through [`Datasource::do_request`], which is the
//! only place connection headers and the credential flag are applied.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, QueryWindow};
use crate::metrics::{self, RequestTimer};
use crate::models::{
    Datapoint, MetricHistory, PanelQueryTarget, QueryOptions, QueryResponse, SearchRequest,
    SeriesResult, TestResult, TextValue,
};
use crate::templating::{InterpolationFormat, ScopedVars, TemplateSrv};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::{DatasourceError, Result};

const FIXED_LOOKBACK: &str = "1h-ago";

/// Shape of one templating item, checked in this order.
#[derive(Debug, PartialEq)]
enum ItemShape<'a> {
    /// Object carrying truthy `text` and `value` fields.
    Labelled { text: &'a Value, value: &'a Value },
    /// Any other object or array.
    Structured,
    /// Strings, numbers, booleans and null.
    Scalar,
}

impl<'a> ItemShape<'a> {
    fn classify(item: &'a Value) -> Self {
        if let Value::Object(fields) = item {
            if let (Some(text), Some(value)) = (fields.get("text"), fields.get("value")) {
                if is_truthy(text) && is_truthy(value) {
                    return ItemShape::Labelled { text, value };
                }
            }
        }

        match item {
            Value::Object(_) | Value::Array(_) => ItemShape::Structured,
            _ => ItemShape::Scalar,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_text_value(item: &Value, index: Value) -> TextValue {
    match ItemShape::classify(item) {
        ItemShape::Labelled { text, value } => TextValue {
            text: text.clone(),
            value: value.clone(),
        },
        ItemShape::Structured => TextValue {
            text: item.clone(),
            value: index,
        },
        ItemShape::Scalar => TextValue {
            text: item.clone(),
            value: item.clone(),
        },
    }
}

pub struct Datasource {
    config: ConnectionConfig,
    window: QueryWindow,
    transport: Arc<dyn Transport>,
    templates: Arc<dyn TemplateSrv>,
}

impl Datasource {
    pub fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        templates: Arc<dyn TemplateSrv>,
    ) -> Self {
        Self {
            config,
            window: QueryWindow::default(),
            transport,
            templates,
        }
    }

    pub fn with_query_window(mut self, window: QueryWindow) -> Self {
        self.window = window;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn query_window(&self) -> QueryWindow {
        self.window
    }

    /// Checks connectivity against the tags endpoint.
    ///
    /// Returns `Ok(None)` when the backend answers with anything but 200;
    /// callers must treat a missing descriptor as a failed check.
    pub async fn test_datasource(&self) -> Result<Option<TestResult>> {
        let url = format!("{}/node/api/tags", self.config.base_url());
        let response = self.do_request(HttpRequest::get(url), "tags").await?;

        if response.status == 200 {
            info!("Datasource connectivity check succeeded");
            Ok(Some(TestResult::success()))
        } else {
            warn!(status = response.status, "Datasource connectivity check got unexpected status");
            Ok(None)
        }
    }

    /// Fetches history for the single eligible target of a panel.
    pub async fn query(&self, options: &QueryOptions) -> Result<QueryResponse> {
        let targets = Self::build_query_parameters(options);

        let target = match targets.as_slice() {
            [] => {
                debug!("No eligible targets, skipping backend call");
                metrics::record_query("empty");
                return Ok(QueryResponse::empty());
            }
            [target] => *target,
            _ => {
                metrics::record_query("rejected");
                return Err(DatasourceError::MultipleQueriesUnsupported {
                    count: targets.len(),
                });
            }
        };

        metrics::record_query("issued");
        let url = self.history_url(target, options);
        let response = self.do_request(HttpRequest::get(url), "history").await?;

        let history: Vec<MetricHistory> = serde_json::from_value(response.data)?;
        let label = target.series_label();
        let data = history
            .into_iter()
            .map(|metric| SeriesResult {
                target: label.clone(),
                datapoints: metric.dps.into_iter().map(Datapoint::from).collect(),
            })
            .collect();

        Ok(QueryResponse { data })
    }

    fn history_url(&self, target: &PanelQueryTarget, options: &QueryOptions) -> String {
        let object_id = target.object_id.as_deref().unwrap_or_default();
        let metric_name = target.metric_name.as_deref().unwrap_or_default();

        let window = match (self.window, options.range) {
            (QueryWindow::HostRange, Some(range)) => format!(
                "from={}&to={}",
                range.from.timestamp_millis(),
                range.to.timestamp_millis()
            ),
            _ => format!("from={}", FIXED_LOOKBACK),
        };

        format!(
            "{}/node/api/objects/{}/history?{}&metrics={}",
            self.config.base_url(),
            object_id,
            window,
            metric_name
        )
    }

    /// Annotations are not supported by the backend integration.
    pub fn annotation_query(&self, _options: &Value) {}

    /// Lists metric names recorded for an object. The body is returned as sent.
    pub async fn list_metrics(&self, object_id: &str) -> Result<Value> {
        let url = format!(
            "{}/node/api/objects/{}/stat/metrics",
            self.config.base_url(),
            object_id
        );
        let response = self.do_request(HttpRequest::get(url), "stat_metrics").await?;
        Ok(response.data)
    }

    pub async fn metric_find_query(&self, query: &str) -> Result<Vec<TextValue>> {
        self.metric_find_query_scoped(query, None).await
    }

    /// Like [`Datasource::metric_find_query`], with request-scoped variables
    /// taking precedence over the interpolator's own.
    pub async fn metric_find_query_scoped(
        &self,
        query: &str,
        scoped_vars: Option<&ScopedVars>,
    ) -> Result<Vec<TextValue>> {
        let interpolated = SearchRequest {
            target: self
                .templates
                .replace(query, scoped_vars, InterpolationFormat::Regex),
            scoped_vars: None,
        };

        let url = format!("{}/search", self.config.base_url());
        let response = self
            .do_request(HttpRequest::post(url, serde_json::to_value(interpolated)?), "search")
            .await?;

        Ok(Self::map_to_text_value(&response.data))
    }

    pub async fn get_tag_keys(&self, options: &Value) -> Result<Vec<TextValue>> {
        let url = format!("{}/tag-keys", self.config.base_url());
        let response = self
            .do_request(HttpRequest::post(url, options.clone()), "tag_keys")
            .await?;

        Ok(Self::map_to_text_value(&response.data))
    }

    pub async fn get_tag_values(&self, options: &Value) -> Result<Vec<TextValue>> {
        let url = format!("{}/tag-values", self.config.base_url());
        let response = self
            .do_request(HttpRequest::post(url, options.clone()), "tag_values")
            .await?;

        Ok(Self::map_to_text_value(&response.data))
    }

    /// Normalizes an arbitrary backend list into `{text, value}` pairs.
    ///
    /// Per item: truthy `text` and `value` fields are used as-is; any other
    /// object keeps itself as the text and its position as the value; scalars
    /// serve as both. An object body is walked by its values with the keys as
    /// positions. Anything else yields no entries.
    pub fn map_to_text_value(data: &Value) -> Vec<TextValue> {
        match data {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| to_text_value(item, json!(i)))
                .collect(),
            Value::Object(fields) => fields
                .iter()
                .map(|(key, item)| to_text_value(item, json!(key)))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Targets that name both an object and a metric and are not hidden,
    /// in their original order.
    pub fn build_query_parameters(options: &QueryOptions) -> Vec<&PanelQueryTarget> {
        options
            .targets
            .iter()
            .filter(|target| {
                target.object_id.as_deref().is_some_and(|id| !id.is_empty())
                    && target.metric_name.as_deref().is_some_and(|name| !name.is_empty())
                    && !target.hide
            })
            .collect()
    }

    async fn do_request(
        &self,
        mut request: HttpRequest,
        endpoint: &'static str,
    ) -> Result<HttpResponse> {
        request.with_credentials = self.config.with_credentials();
        request.headers = self.config.headers().clone();

        debug!(method = %request.method, url = %request.url, "Sending backend request");
        let _timer = RequestTimer::new(endpoint, request.method.as_str());

        self.transport.send(request).await.map_err(|e| {
            warn!(endpoint, error = %e, "Backend request failed");
            metrics::record_request_failure(endpoint, e.category());
            e
        })
    }
}
