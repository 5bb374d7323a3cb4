//! FILENAME: core/model/src/content.rs
//! PURPOSE: Schema-validated cell contents.
//! CONTEXT: A `Content` can only be built from a value its `Schema` accepts, so
//! every content flowing through the engine is valid by construction. Value
//! types describe what kind of data a schema holds and are used for type
//! inference over groups of cells.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::value::Value;

// ============================================================================
// VALUE TYPES
// ============================================================================

/// The kind of data held by a content. `Mixed`, `Categorical` and `Numerical`
/// are the general types the specific ones collapse into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Mixed,
    Categorical,
    Nominal,
    Ordinal,
    Numerical,
    Continuous,
    Discrete,
    Date,
}

impl ValueType {
    pub fn is_categorical(self) -> bool {
        matches!(self, ValueType::Categorical | ValueType::Nominal | ValueType::Ordinal)
    }

    pub fn is_numerical(self) -> bool {
        matches!(self, ValueType::Numerical | ValueType::Continuous | ValueType::Discrete)
    }

    /// Collapses a specific type onto its general family.
    pub fn general(self) -> ValueType {
        if self.is_categorical() {
            ValueType::Categorical
        } else if self.is_numerical() {
            ValueType::Numerical
        } else {
            self
        }
    }

    /// Least common type of two types. Commutative and associative.
    pub fn merge(self, other: ValueType) -> ValueType {
        if self == other {
            self
        } else if self.is_categorical() && other.is_categorical() {
            ValueType::Categorical
        } else if self.is_numerical() && other.is_numerical() {
            ValueType::Numerical
        } else {
            ValueType::Mixed
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Declares which values a content may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Unordered categories (strings).
    Nominal,
    /// Ordered categories (strings or longs).
    Ordinal,
    /// Integral numbers.
    Discrete,
    /// Real numbers; longs are widened.
    Continuous,
    Date,
}

impl Schema {
    pub fn name(&self) -> &'static str {
        match self {
            Schema::Nominal => "nominal",
            Schema::Ordinal => "ordinal",
            Schema::Discrete => "discrete",
            Schema::Continuous => "continuous",
            Schema::Date => "date",
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Schema::Nominal => ValueType::Nominal,
            Schema::Ordinal => ValueType::Ordinal,
            Schema::Discrete => ValueType::Discrete,
            Schema::Continuous => ValueType::Continuous,
            Schema::Date => ValueType::Date,
        }
    }

    /// Returns the value in this schema's canonical form, or an error if the
    /// value does not conform.
    pub fn conform(&self, value: Value) -> Result<Value> {
        match (self, value) {
            (Schema::Nominal, v @ Value::Str(_)) => Ok(v),
            (Schema::Ordinal, v @ (Value::Str(_) | Value::Long(_))) => Ok(v),
            (Schema::Discrete, v @ Value::Long(_)) => Ok(v),
            (Schema::Continuous, v @ Value::Double(_)) => Ok(v),
            (Schema::Continuous, Value::Long(l)) => Ok(Value::Double(l as f64)),
            (Schema::Date, v @ Value::Date(_)) => Ok(v),
            (schema, v) => Err(ModelError::SchemaMismatch {
                schema: *schema,
                value: v.to_string(),
            }),
        }
    }

    /// Parses text into a content of this schema.
    pub fn parse(&self, input: &str) -> Result<Content> {
        let parse_error = || ModelError::Parse {
            schema: *self,
            input: input.to_string(),
        };
        let value = match self {
            Schema::Nominal => Value::Str(input.to_string()),
            Schema::Ordinal => Value::infer(input),
            Schema::Discrete => Value::Long(input.trim().parse().map_err(|_| parse_error())?),
            Schema::Continuous => Value::Double(input.trim().parse().map_err(|_| parse_error())?),
            Schema::Date => Value::Date(Value::parse_date(input.trim()).ok_or_else(parse_error)?),
        };
        Content::new(*self, value)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Schema {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nominal" => Ok(Schema::Nominal),
            "ordinal" => Ok(Schema::Ordinal),
            "discrete" => Ok(Schema::Discrete),
            "continuous" => Ok(Schema::Continuous),
            "date" => Ok(Schema::Date),
            other => Err(ModelError::UnknownSchema(other.to_string())),
        }
    }
}

// ============================================================================
// CONTENT
// ============================================================================

/// A value together with the schema that validated it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawContent")]
pub struct Content {
    schema: Schema,
    value: Value,
}

/// Unvalidated wire form; deserialization goes through `Content::new`.
#[derive(Deserialize)]
struct RawContent {
    schema: Schema,
    value: Value,
}

impl TryFrom<RawContent> for Content {
    type Error = ModelError;

    fn try_from(raw: RawContent) -> Result<Self> {
        Content::new(raw.schema, raw.value)
    }
}

impl Content {
    /// Validates `value` against `schema`.
    pub fn new(schema: Schema, value: impl Into<Value>) -> Result<Self> {
        let value = schema.conform(value.into())?;
        Ok(Content { schema, value })
    }

    pub fn nominal(value: impl Into<String>) -> Self {
        Content {
            schema: Schema::Nominal,
            value: Value::Str(value.into()),
        }
    }

    pub fn discrete(value: i64) -> Self {
        Content {
            schema: Schema::Discrete,
            value: Value::Long(value),
        }
    }

    pub fn continuous(value: f64) -> Self {
        Content {
            schema: Schema::Continuous,
            value: Value::Double(value),
        }
    }

    pub fn date(value: NaiveDateTime) -> Self {
        Content {
            schema: Schema::Date,
            value: Value::Date(value),
        }
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }

    /// Re-validates this content's value under another schema. A value the
    /// target schema does not accept as is gets its canonical string
    /// re-parsed, so numbers can become categories and numeric text numbers.
    pub fn with_schema(&self, schema: Schema) -> Result<Content> {
        match Content::new(schema, self.value.clone()) {
            Ok(content) => Ok(content),
            Err(_) => schema.parse(&self.value.canonical()),
        }
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_validation() {
        assert!(Content::new(Schema::Discrete, 3).is_ok());
        assert!(Content::new(Schema::Discrete, 3.5).is_err());
        assert!(Content::new(Schema::Nominal, 3).is_err());
        assert!(Content::new(Schema::Ordinal, 3).is_ok());
    }

    #[test]
    fn test_continuous_widens_longs() {
        let content = Content::new(Schema::Continuous, 3).unwrap();
        assert_eq!(content.value(), &Value::Double(3.0));
        assert_eq!(content, Content::continuous(3.0));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Schema::Discrete.parse("12"), Ok(Content::discrete(12)));
        assert_eq!(Schema::Continuous.parse("1.5"), Ok(Content::continuous(1.5)));
        assert!(Schema::Discrete.parse("abc").is_err());
        assert!(Schema::Date.parse("2024-01-31").is_ok());
    }

    #[test]
    fn test_schema_names_roundtrip() {
        for schema in [
            Schema::Nominal,
            Schema::Ordinal,
            Schema::Discrete,
            Schema::Continuous,
            Schema::Date,
        ] {
            assert_eq!(schema.name().parse::<Schema>(), Ok(schema));
        }
        assert!("bogus".parse::<Schema>().is_err());
    }

    #[test]
    fn test_with_schema() {
        let text = Content::nominal("42");
        assert_eq!(text.with_schema(Schema::Discrete), Ok(Content::discrete(42)));
        assert!(Content::nominal("x").with_schema(Schema::Continuous).is_err());
        assert_eq!(
            Content::discrete(2).with_schema(Schema::Continuous),
            Ok(Content::continuous(2.0))
        );
    }

    #[test]
    fn test_with_schema_numeric_to_categorical() {
        assert_eq!(Content::discrete(10).with_schema(Schema::Nominal), Ok(Content::nominal("10")));
        assert_eq!(Content::continuous(2.5).with_schema(Schema::Nominal), Ok(Content::nominal("2.5")));
        assert_eq!(Content::discrete(7).with_schema(Schema::Ordinal), Content::new(Schema::Ordinal, 7));
        assert!(Content::continuous(2.5).with_schema(Schema::Discrete).is_err());
    }

    #[test]
    fn test_value_type_merge() {
        assert_eq!(ValueType::Nominal.merge(ValueType::Ordinal), ValueType::Categorical);
        assert_eq!(ValueType::Discrete.merge(ValueType::Continuous), ValueType::Numerical);
        assert_eq!(ValueType::Discrete.merge(ValueType::Nominal), ValueType::Mixed);
        assert_eq!(ValueType::Date.merge(ValueType::Date), ValueType::Date);
        assert_eq!(ValueType::Continuous.general(), ValueType::Numerical);
    }

    #[test]
    fn test_deserialization_validates() {
        let ok: std::result::Result<Content, _> =
            serde_json::from_str(r#"{"schema":"discrete","value":{"Long":4}}"#);
        assert_eq!(ok.ok(), Some(Content::discrete(4)));

        let bad: std::result::Result<Content, _> =
            serde_json::from_str(r#"{"schema":"discrete","value":{"Str":"four"}}"#);
        assert!(bad.is_err());
    }
}
