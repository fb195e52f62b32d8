//! Dashboard template variable interpolation.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

lazy_static! {
    // `$name`, `${name}` and `[[name]]`
    static ref VARIABLE_PATTERN: Regex =
        Regex::new(r"\$(\w+)|\$\{(\w+)\}|\[\[(\w+)\]\]").expect("valid variable pattern");
}

/// A variable's current selection: `"web"` or `["web", "db"]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Single(String),
    Multi(Vec<String>),
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for VariableValue {
    fn from(values: Vec<String>) -> Self {
        VariableValue::Multi(values)
    }
}

pub type ScopedVars = HashMap<String, VariableValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationFormat {
    /// Regex-escaped; multiple values become an alternation group.
    Regex,
    /// Values joined with `|`, unescaped.
    Pipe,
    /// Values joined with `,`, unescaped.
    Raw,
}

impl InterpolationFormat {
    fn render(&self, value: &VariableValue) -> String {
        match (self, value) {
            (InterpolationFormat::Regex, VariableValue::Single(v)) => regex::escape(v),
            (InterpolationFormat::Regex, VariableValue::Multi(values)) => {
                let escaped: Vec<String> = values.iter().map(|v| regex::escape(v)).collect();
                if escaped.len() == 1 {
                    escaped.into_iter().next().unwrap_or_default()
                } else {
                    format!("({})", escaped.join("|"))
                }
            }
            (InterpolationFormat::Pipe, VariableValue::Single(v))
            | (InterpolationFormat::Raw, VariableValue::Single(v)) => v.clone(),
            (InterpolationFormat::Pipe, VariableValue::Multi(values)) => values.join("|"),
            (InterpolationFormat::Raw, VariableValue::Multi(values)) => values.join(","),
        }
    }
}

/// The host's templating service.
pub trait TemplateSrv: Send + Sync {
    fn replace(
        &self,
        target: &str,
        scoped_vars: Option<&ScopedVars>,
        format: InterpolationFormat,
    ) -> String;
}

/// Dashboard-level variables with scoped overrides.
#[derive(Debug, Clone, Default)]
pub struct VariableInterpolator {
    variables: HashMap<String, VariableValue>,
}

impl VariableInterpolator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.variables.insert(name.into(), value.into());
    }
}

impl TemplateSrv for VariableInterpolator {
    fn replace(
        &self,
        target: &str,
        scoped_vars: Option<&ScopedVars>,
        format: InterpolationFormat,
    ) -> String {
        VARIABLE_PATTERN
            .replace_all(target, |caps: &Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();

                scoped_vars
                    .and_then(|vars| vars.get(name))
                    .or_else(|| self.variables.get(name))
                    .map(|value| format.render(value))
                    // Unknown variables are left as written.
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpolator() -> VariableInterpolator {
        VariableInterpolator::new()
            .with_variable("host", "web.01")
            .with_variable(
                "metric",
                vec!["cpu".to_string(), "mem".to_string()],
            )
    }

    #[test]
    fn test_all_syntaxes_substituted() {
        let srv = interpolator();
        assert_eq!(
            srv.replace("$host ${host} [[host]]", None, InterpolationFormat::Raw),
            "web.01 web.01 web.01"
        );
    }

    #[test]
    fn test_regex_format_escapes_and_groups() {
        let srv = interpolator();
        assert_eq!(
            srv.replace("objects/$host/$metric", None, InterpolationFormat::Regex),
            r"objects/web\.01/(cpu|mem)"
        );
    }

    #[test]
    fn test_pipe_and_raw_join() {
        let srv = interpolator();
        assert_eq!(srv.replace("$metric", None, InterpolationFormat::Pipe), "cpu|mem");
        assert_eq!(srv.replace("$metric", None, InterpolationFormat::Raw), "cpu,mem");
    }

    #[test]
    fn test_scoped_vars_take_precedence() {
        let srv = interpolator();
        let mut scoped = ScopedVars::new();
        scoped.insert("host".to_string(), VariableValue::from("db"));

        assert_eq!(
            srv.replace("$host", Some(&scoped), InterpolationFormat::Regex),
            "db"
        );
    }

    #[test]
    fn test_scoped_vars_from_json() {
        let scoped: ScopedVars =
            serde_json::from_str(r#"{"host": "db.01", "metric": ["cpu", "mem"]}"#).unwrap();

        assert_eq!(
            VariableInterpolator::new().replace("$host/$metric", Some(&scoped), InterpolationFormat::Regex),
            r"db\.01/(cpu|mem)"
        );
    }

    #[test]
    fn test_unknown_variable_left_untouched() {
        let srv = interpolator();
        assert_eq!(
            srv.replace("$missing and [[other]]", None, InterpolationFormat::Regex),
            "$missing and [[other]]"
        );
    }
}
