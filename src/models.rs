use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::templating::ScopedVars;

/// One query row authored in a dashboard panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelQueryTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub hide: bool,
}

impl PanelQueryTarget {
    pub fn new(object_id: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            ref_id: None,
            object_id: Some(object_id.into()),
            metric_name: Some(metric_name.into()),
            hide: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hide = true;
        self
    }

    /// Label used for the resulting series.
    pub fn series_label(&self) -> String {
        format!(
            "{}:{}",
            self.object_id.as_deref().unwrap_or_default(),
            self.metric_name.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Batch of targets plus the host's time and templating context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default)]
    pub targets: Vec<PanelQueryTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_data_points: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub scoped_vars: HashMap<String, Value>,
}

impl QueryOptions {
    pub fn with_targets(targets: Vec<PanelQueryTarget>) -> Self {
        Self {
            targets,
            ..Default::default()
        }
    }
}

/// A single sample as the host expects it: `[value, timestamp]`.
///
/// The timestamp keeps the backend's number representation, integer or float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint(pub Option<f64>, pub Number);

/// A single sample as the backend sends it: `[timestamp, value]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint(pub Number, pub Option<f64>);

impl From<HistoryPoint> for Datapoint {
    fn from(point: HistoryPoint) -> Self {
        Datapoint(point.1, point.0)
    }
}

/// One per-metric element of a history response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricHistory {
    #[serde(default)]
    pub dps: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResult {
    pub target: String,
    pub datapoints: Vec<Datapoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Vec<SeriesResult>,
}

impl QueryResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Normalized templating entry. `text` stays raw JSON because unshaped
/// backend objects are passed through as their own label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub text: Value,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: String,
    pub message: String,
    pub title: String,
}

impl TestResult {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: "Data source is working".to_string(),
            title: "Success".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub target: String,
    /// Variables to interpolate into `target`; only read on the HTTP surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoped_vars: Option<ScopedVars>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_deserializes_host_shape() {
        let target: PanelQueryTarget = serde_json::from_value(json!({
            "refId": "A",
            "objectId": "5a1b",
            "metricName": "cpu.load",
        }))
        .unwrap();

        assert_eq!(target.ref_id.as_deref(), Some("A"));
        assert_eq!(target.object_id.as_deref(), Some("5a1b"));
        assert!(!target.hide);
        assert_eq!(target.series_label(), "5a1b:cpu.load");
    }

    #[test]
    fn test_query_options_with_range() {
        let options: QueryOptions = serde_json::from_value(json!({
            "targets": [{"objectId": "o1", "metricName": "cpu", "hide": true}],
            "range": {"from": "2024-01-01T00:00:00Z", "to": "2024-01-01T01:00:00Z"},
            "maxDataPoints": 500
        }))
        .unwrap();

        assert_eq!(options.targets.len(), 1);
        assert!(options.targets[0].hide);
        assert_eq!(options.max_data_points, Some(500));
        let range = options.range.unwrap();
        assert_eq!((range.to - range.from).num_minutes(), 60);
    }

    #[test]
    fn test_history_point_reorients() {
        let history: MetricHistory =
            serde_json::from_value(json!({"dps": [[100, 0.5], [101, null]]})).unwrap();
        let points: Vec<Datapoint> = history.dps.into_iter().map(Datapoint::from).collect();

        assert_eq!(
            points,
            vec![
                Datapoint(Some(0.5), Number::from(100)),
                Datapoint(None, Number::from(101))
            ]
        );
        assert_eq!(
            serde_json::to_value(&points).unwrap(),
            json!([[0.5, 100], [null, 101]])
        );
    }

    #[test]
    fn test_float_timestamps_pass_through() {
        let history: MetricHistory = serde_json::from_value(json!({
            "dps": [[1700000000000.0, 0.5], [1700000060.5, 0.6]]
        }))
        .unwrap();
        let points: Vec<Datapoint> = history.dps.into_iter().map(Datapoint::from).collect();

        assert_eq!(
            serde_json::to_value(&points).unwrap(),
            json!([[0.5, 1700000000000.0], [0.6, 1700000060.5]])
        );
    }

    #[test]
    fn test_history_without_dps() {
        let history: MetricHistory = serde_json::from_value(json!({"metric": "cpu"})).unwrap();
        assert!(history.dps.is_empty());
    }
}
