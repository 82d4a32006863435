//! EXPLAIN output collector
//!
//! The EXPLAIN formatter itself is external; this is the property sink it
//! hands to a custom scan node. Properties keep insertion order.

use serde_json::{Map, Value};

/// Output format requested by the formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExplainFormat {
    #[default]
    Text,
    Json,
}

/// Property sink for one plan node
#[derive(Debug, Clone, Default)]
pub struct ExplainState {
    pub format: ExplainFormat,
    pub verbose: bool,
    properties: Vec<(String, Value)>,
}

impl ExplainState {
    pub fn new(format: ExplainFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Add a text property
    pub fn property_text(&mut self, label: &str, value: impl Into<String>) {
        self.properties
            .push((label.to_string(), Value::String(value.into())));
    }

    /// Add an integer property
    pub fn property_integer(&mut self, label: &str, value: i64) {
        self.properties.push((label.to_string(), Value::from(value)));
    }

    /// Add a list property
    pub fn property_list(&mut self, label: &str, values: Vec<String>) {
        self.properties.push((
            label.to_string(),
            Value::Array(values.into_iter().map(Value::String).collect()),
        ));
    }

    /// Look up a property by label
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v)
    }

    pub fn properties(&self) -> &[(String, Value)] {
        &self.properties
    }

    /// Render collected properties in the requested format
    pub fn render(&self) -> String {
        match self.format {
            ExplainFormat::Text => {
                let mut out = String::new();
                for (label, value) in &self.properties {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        Value::Array(items) => items
                            .iter()
                            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                            .collect::<Vec<_>>()
                            .join(", "),
                        other => other.to_string(),
                    };
                    out.push_str(&format!("  {}: {}\n", label, rendered));
                }
                out
            }
            ExplainFormat::Json => {
                let map: Map<String, Value> = self.properties.iter().cloned().collect();
                Value::Object(map).to_string()
            }
        }
    }
}
