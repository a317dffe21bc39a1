//! Key-pattern driven projection of JSON values.
//!
//! A rule set is compiled from a JSON array of rules:
//!
//! ```json
//! [
//!     {"pattern": "^user:", "fields": {"email": "$.contact.email"}},
//!     {"regex": "^order:", "fields": [{"name": "total", "query": "$.sum"}]}
//! ]
//! ```
//!
//! Every rule whose pattern matches a logical key contributes all of its
//! fields to one result object, `null` or `[]` for paths that resolve to
//! nothing. Rules are applied in declaration order, so a later rule
//! overwrites a field written by an earlier one.

mod path;

use std::collections::BTreeMap;

use bytes::Bytes;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use path::JsonPath;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("invalid filter config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

#[derive(Deserialize)]
struct RuleConfig {
    #[serde(alias = "regex")]
    pattern: String,
    fields: FieldsConfig,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldsConfig {
    Map(BTreeMap<String, String>),
    List(Vec<FieldConfig>),
}

#[derive(Deserialize)]
struct FieldConfig {
    name: String,
    #[serde(alias = "path")]
    query: String,
}

impl FieldsConfig {
    fn into_map(self) -> BTreeMap<String, String> {
        match self {
            FieldsConfig::Map(map) => map,
            // later entries with the same name win
            FieldsConfig::List(list) => list
                .into_iter()
                .map(|field| (field.name, field.query))
                .collect(),
        }
    }
}

struct Rule {
    pattern: Regex,
    fields: Vec<(String, JsonPath)>,
}

impl Rule {
    fn compile(config: RuleConfig) -> Result<Self, ProjectionError> {
        let pattern = Regex::new(&config.pattern).map_err(|source| ProjectionError::Pattern {
            pattern: config.pattern.clone(),
            source,
        })?;
        let fields = config
            .fields
            .into_map()
            .into_iter()
            .map(|(name, query)| JsonPath::parse(&query).map(|path| (name, path)))
            .collect::<Result<Vec<_>, ProjectionError>>()?;
        Ok(Self { pattern, fields })
    }
}

/// Compiled projection rules, immutable once built.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile a rule set. A blank config compiles to the empty set.
    pub fn parse(config: &str) -> Result<Self, ProjectionError> {
        if config.trim().is_empty() {
            return Ok(Self::empty());
        }
        let rules = serde_json::from_str::<Vec<RuleConfig>>(config)?
            .into_iter()
            .map(Rule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Compile a rule set, degrading to the empty set when `config` is
    /// malformed. Values are then passed through unfiltered.
    pub fn from_config(config: &str) -> Self {
        match Self::parse(config) {
            Ok(rules) => rules,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring malformed filter config");
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Collect the fields of every rule matching `key` out of `doc`.
    pub fn project_value(&self, key: &str, doc: &Value) -> Map<String, Value> {
        let mut result = Map::new();
        for rule in self.rules.iter().filter(|rule| rule.pattern.is_match(key)) {
            for (name, path) in &rule.fields {
                result.insert(name.clone(), path.query(doc));
            }
        }
        result
    }

    /// Project a raw value stored under `key`.
    ///
    /// Returns the serialized result object, or `None` when the value is not
    /// JSON or no rule with fields matched the key.
    pub fn project(&self, key: &str, value: &[u8]) -> Option<Bytes> {
        let doc: Value = match serde_json::from_slice(value) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::debug!(key, error = %err, "value is not json, skipping");
                return None;
            }
        };
        let result = self.project_value(key, &doc);
        if result.is_empty() {
            tracing::trace!(key, "no rule matched");
            return None;
        }
        serde_json::to_vec(&Value::Object(result))
            .ok()
            .map(Bytes::from)
    }
}
