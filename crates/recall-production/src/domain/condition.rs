//! Production Conditions
//!
//! A condition tests one attribute of working-memory items with a typed
//! comparator. Attributes are a closed set of accessors over
//! [`WorkingMemoryItem`] plus free-form metadata keys.

use recall_common::{Result, ValidationError, WorkingMemoryItem};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute accessor over a working-memory item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "key")]
pub enum Attribute {
    Id,
    Content,
    ContentType,
    Activation,
    Salience,
    /// A key in the item's metadata map
    Metadata(String),
}

impl Attribute {
    /// Resolve an attribute by name
    ///
    /// `type` and `content_type` both address the content type. Anything that
    /// is not a built-in field is a metadata key; a `metadata.` prefix is
    /// stripped.
    pub fn from_name(name: &str) -> Self {
        match name {
            "id" => Attribute::Id,
            "content" => Attribute::Content,
            "type" | "content_type" => Attribute::ContentType,
            "activation" => Attribute::Activation,
            "salience" => Attribute::Salience,
            other => Attribute::Metadata(
                other.strip_prefix("metadata.").unwrap_or(other).to_string(),
            ),
        }
    }

    /// Read this attribute from an item
    pub fn read(&self, item: &WorkingMemoryItem) -> AttributeValue {
        match self {
            Attribute::Id => AttributeValue::Text(item.id.clone()),
            Attribute::Content => AttributeValue::Text(item.content.clone()),
            Attribute::ContentType => AttributeValue::Text(item.content_type.clone()),
            Attribute::Activation => AttributeValue::Number(item.activation),
            Attribute::Salience => AttributeValue::Number(item.salience),
            Attribute::Metadata(key) => item
                .metadata
                .get(key)
                .map(AttributeValue::from_json)
                .unwrap_or(AttributeValue::Missing),
        }
    }
}

/// Typed value read from an item
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Arrays and objects
    Json(Value),
    Missing,
}

impl AttributeValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Missing,
            Value::String(s) => AttributeValue::Text(s.clone()),
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => n
                .as_f64()
                .map(AttributeValue::Number)
                .unwrap_or_else(|| AttributeValue::Json(value.clone())),
            other => AttributeValue::Json(other.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Text(s) => Value::String(s.clone()),
            AttributeValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Json(v) => v.clone(),
            AttributeValue::Missing => Value::Null,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, AttributeValue::Missing)
    }

    /// Numeric view; text is parsed
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Textual view of scalars and JSON
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttributeValue::Text(s) => Some(s.clone()),
            AttributeValue::Number(n) => Some(n.to_string()),
            AttributeValue::Bool(b) => Some(b.to_string()),
            AttributeValue::Json(v) => Some(v.to_string()),
            AttributeValue::Missing => None,
        }
    }

    /// Kind name used by [`Comparator::TypeMatch`]
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Text(_) => "string",
            AttributeValue::Number(_) => "number",
            AttributeValue::Bool(_) => "boolean",
            AttributeValue::Json(Value::Array(_)) => "array",
            AttributeValue::Json(_) => "object",
            AttributeValue::Missing => "missing",
        }
    }
}

/// Comparison applied to an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    /// Substring, array membership or object key
    Contains,
    /// Inclusive `[low, high]`
    InRange,
    /// Value kind (`string`, `number`, `boolean`, `array`, `object`)
    TypeMatch,
    Exists,
    /// Satisfied only when no item has the attribute
    NotExists,
    Regex,
}

impl Comparator {
    /// Per-item test
    ///
    /// `NotExists` tests for presence here; the set-level inversion happens
    /// in matching.
    pub fn apply(&self, value: &AttributeValue, operand: &Value, pattern: Option<&Regex>) -> bool {
        if value.is_missing() {
            return false;
        }
        match self {
            Comparator::Equals => loosely_equal(value, operand),
            Comparator::NotEquals => !loosely_equal(value, operand),
            Comparator::GreaterThan => compare_numbers(value, operand, |a, b| a > b),
            Comparator::LessThan => compare_numbers(value, operand, |a, b| a < b),
            Comparator::Contains => contains(value, operand),
            Comparator::InRange => in_range(value, operand),
            Comparator::TypeMatch => operand
                .as_str()
                .map(|kind| normalize_kind(kind) == value.kind())
                .unwrap_or(false),
            Comparator::Exists | Comparator::NotExists => true,
            Comparator::Regex => match (pattern, value.as_text()) {
                (Some(re), Some(text)) => re.is_match(&text),
                _ => false,
            },
        }
    }
}

fn operand_number(operand: &Value) -> Option<f64> {
    match operand {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn operand_text(operand: &Value) -> String {
    match operand {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn loosely_equal(value: &AttributeValue, operand: &Value) -> bool {
    if value.to_json() == *operand {
        return true;
    }
    match (value.as_number(), operand_number(operand)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare_numbers(value: &AttributeValue, operand: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (value.as_number(), operand_number(operand)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn contains(value: &AttributeValue, operand: &Value) -> bool {
    match value {
        AttributeValue::Text(s) => s.contains(&operand_text(operand)),
        AttributeValue::Json(Value::Array(items)) => items.iter().any(|item| {
            item == operand || loosely_equal(&AttributeValue::from_json(item), operand)
        }),
        AttributeValue::Json(Value::Object(map)) => map.contains_key(&operand_text(operand)),
        _ => false,
    }
}

fn in_range(value: &AttributeValue, operand: &Value) -> bool {
    let Some((low, high)) = range_bounds(operand) else {
        return false;
    };
    value
        .as_number()
        .map(|n| n >= low && n <= high)
        .unwrap_or(false)
}

fn range_bounds(operand: &Value) -> Option<(f64, f64)> {
    match operand.as_array().map(Vec::as_slice) {
        Some([low, high]) => Some((operand_number(low)?, operand_number(high)?)),
        _ => None,
    }
}

fn normalize_kind(kind: &str) -> &str {
    match kind {
        "text" | "str" => "string",
        "bool" => "boolean",
        "float" | "int" | "integer" => "number",
        "list" => "array",
        "map" => "object",
        other => other,
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Literal(Value),
    /// Value bound by an earlier condition's `bind`
    Variable(String),
}

impl Operand {
    pub fn variable(name: impl Into<String>) -> Self {
        Operand::Variable(name.into())
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

/// One test in a production's left-hand side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: Attribute,
    pub comparator: Comparator,
    pub operand: Operand,
    /// Require that no item satisfies the test
    #[serde(default)]
    pub negated: bool,
    /// Capture the first satisfying item's value under this name
    #[serde(default)]
    pub bind: Option<String>,
}

impl Condition {
    pub fn new(attribute: Attribute, comparator: Comparator, operand: impl Into<Operand>) -> Self {
        Self {
            attribute,
            comparator,
            operand: operand.into(),
            negated: false,
            bind: None,
        }
    }

    pub fn equals(attribute: Attribute, value: impl Into<Value>) -> Self {
        Self::new(attribute, Comparator::Equals, Operand::Literal(value.into()))
    }

    pub fn not_equals(attribute: Attribute, value: impl Into<Value>) -> Self {
        Self::new(attribute, Comparator::NotEquals, Operand::Literal(value.into()))
    }

    pub fn greater_than(attribute: Attribute, value: impl Into<Value>) -> Self {
        Self::new(attribute, Comparator::GreaterThan, Operand::Literal(value.into()))
    }

    pub fn less_than(attribute: Attribute, value: impl Into<Value>) -> Self {
        Self::new(attribute, Comparator::LessThan, Operand::Literal(value.into()))
    }

    pub fn contains(attribute: Attribute, value: impl Into<Value>) -> Self {
        Self::new(attribute, Comparator::Contains, Operand::Literal(value.into()))
    }

    pub fn in_range(attribute: Attribute, low: f64, high: f64) -> Self {
        Self::new(attribute, Comparator::InRange, serde_json::json!([low, high]))
    }

    pub fn type_match(attribute: Attribute, kind: &str) -> Self {
        Self::new(attribute, Comparator::TypeMatch, Value::from(kind))
    }

    pub fn exists(attribute: Attribute) -> Self {
        Self::new(attribute, Comparator::Exists, Value::Null)
    }

    pub fn not_exists(attribute: Attribute) -> Self {
        Self::new(attribute, Comparator::NotExists, Value::Null)
    }

    pub fn regex(attribute: Attribute, pattern: &str) -> Self {
        Self::new(attribute, Comparator::Regex, Value::from(pattern))
    }

    /// Compare against a previously bound variable
    pub fn against(attribute: Attribute, comparator: Comparator, variable: &str) -> Self {
        Self::new(attribute, comparator, Operand::variable(variable))
    }

    pub fn negate(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn bind(mut self, variable: impl Into<String>) -> Self {
        self.bind = Some(variable.into());
        self
    }

    /// Whether the condition is satisfied by the absence of matching items
    pub fn is_negative(&self) -> bool {
        self.negated || self.comparator == Comparator::NotExists
    }

    /// Validate the operand and compile a regex pattern
    pub fn compile(&self) -> Result<Option<Regex>> {
        match (&self.comparator, &self.operand) {
            (Comparator::Regex, Operand::Literal(Value::String(pattern))) => Regex::new(pattern)
                .map(Some)
                .map_err(|e| {
                    ValidationError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    }
                    .into()
                }),
            (Comparator::Regex, _) => Err(ValidationError::InvalidParameter(
                "regex conditions need a literal string pattern".to_string(),
            )
            .into()),
            (Comparator::InRange, Operand::Literal(range)) => match range_bounds(range) {
                Some((low, high)) if low <= high => Ok(None),
                _ => Err(ValidationError::InvalidParameter(format!(
                    "in_range needs [low, high] with low <= high, got {}",
                    range
                ))
                .into()),
            },
            (Comparator::InRange, Operand::Variable(_)) => Err(ValidationError::InvalidParameter(
                "in_range needs a literal [low, high] operand".to_string(),
            )
            .into()),
            (Comparator::TypeMatch, Operand::Literal(v)) if !v.is_string() => {
                Err(ValidationError::InvalidParameter(format!(
                    "type_match needs a kind name, got {}",
                    v
                ))
                .into())
            }
            _ => Ok(None),
        }
    }
}
