//! Per-bidder parameter validation against JSON schemas.
//!
//! Supports the schema keywords bidder param files use: `type`, `required`,
//! `properties`, `minimum` and `minLength`. Other keywords are ignored.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use derive_more::Display;
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ExchangeError;

/// Schemas shipped with the crate, keyed by bidder code.
const BUNDLED_SCHEMAS: &[(&str, &str)] = &[("rubicon", include_str!("bidder-params/rubicon.json"))];

/// Validates the opaque `imp.ext.<bidder>` blob of a known bidder.
pub trait BidderParamValidator: Send + Sync {
    /// Violation messages for `params`; an empty set means valid.
    fn validate(&self, bidder: &str, params: &Value) -> BTreeSet<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    #[display("object")]
    Object,
    #[display("array")]
    Array,
    #[display("string")]
    String,
    #[display("integer")]
    Integer,
    #[display("number")]
    Number,
    #[display("boolean")]
    Boolean,
    #[display("null")]
    Null,
}

impl JsonType {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        let actual = Self::of(value);
        actual == self || (self == Self::Number && actual == Self::Integer)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(JsonType),
    Any(Vec<JsonType>),
}

impl SchemaType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Single(json_type) => json_type.accepts(value),
            Self::Any(json_types) => json_types.iter().any(|t| t.accepts(value)),
        }
    }

    fn expected(&self) -> String {
        match self {
            Self::Single(json_type) => json_type.to_string(),
            Self::Any(json_types) => json_types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// The schema subset understood by [`SchemaParamValidator`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSchema {
    #[serde(rename = "type")]
    pub schema_type: Option<SchemaType>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, ParamSchema>,
    pub minimum: Option<f64>,
    pub min_length: Option<usize>,
}

impl ParamSchema {
    fn check(&self, path: &str, value: &Value, messages: &mut BTreeSet<String>) {
        if let Some(schema_type) = &self.schema_type {
            if !schema_type.accepts(value) {
                messages.insert(format!(
                    "{path}: {} found, {} expected",
                    JsonType::of(value),
                    schema_type.expected()
                ));
                return;
            }
        }

        match value {
            Value::Object(object) => {
                for name in &self.required {
                    if !object.contains_key(name) {
                        messages.insert(format!("{path}.{name}: is missing but it is required"));
                    }
                }
                for (name, property) in &self.properties {
                    if let Some(child) = object.get(name) {
                        property.check(&format!("{path}.{name}"), child, messages);
                    }
                }
            }
            Value::Number(number) => {
                if let (Some(minimum), Some(actual)) = (self.minimum, number.as_f64()) {
                    if actual < minimum {
                        messages.insert(format!("{path}: must have a minimum value of {minimum}"));
                    }
                }
            }
            Value::String(string) => {
                if let Some(min_length) = self.min_length {
                    if string.chars().count() < min_length {
                        messages.insert(format!(
                            "{path}: must be at least {min_length} characters long"
                        ));
                    }
                }
            }
            Value::Null | Value::Bool(_) | Value::Array(_) => {}
        }
    }
}

/// Validates bidder params against per-bidder schemas parsed once at
/// construction.
#[derive(Debug, Clone, Default)]
pub struct SchemaParamValidator {
    schemas: HashMap<String, ParamSchema>,
}

impl SchemaParamValidator {
    #[must_use]
    pub fn new(schemas: HashMap<String, ParamSchema>) -> Self {
        Self { schemas }
    }

    /// Parse `(bidder code, schema JSON)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] naming the bidder whose schema
    /// is not valid JSON or uses an unsupported `type`.
    pub fn from_json(entries: &[(&str, &str)]) -> Result<Self, Report<ExchangeError>> {
        let mut schemas = HashMap::with_capacity(entries.len());
        for (bidder, json) in entries {
            let schema: ParamSchema =
                serde_json::from_str(json).change_context(ExchangeError::Configuration {
                    message: format!("Invalid param schema for bidder '{bidder}'"),
                })?;
            schemas.insert((*bidder).to_string(), schema);
        }
        log::debug!("Loaded {} bidder param schemas", schemas.len());
        Ok(Self::new(schemas))
    }

    /// Validator over the schemas shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] when a bundled schema is invalid.
    pub fn bundled() -> Result<Self, Report<ExchangeError>> {
        Self::from_json(BUNDLED_SCHEMAS)
    }

    #[must_use]
    pub fn schema(&self, bidder: &str) -> Option<&ParamSchema> {
        self.schemas.get(bidder)
    }
}

impl BidderParamValidator for SchemaParamValidator {
    fn validate(&self, bidder: &str, params: &Value) -> BTreeSet<String> {
        let mut messages = BTreeSet::new();
        match self.schema(bidder) {
            Some(schema) => schema.check("$", params, &mut messages),
            None => log::debug!("No param schema for bidder {bidder}, accepting params"),
        }
        messages
    }
}
