//! FILENAME: core/model/src/value.rs
//! PURPOSE: Defines the scalar value shared by coordinates and cell contents.
//! CONTEXT: A value is a string, a long, a double or a date. Values are ordered
//! by their canonical string rendering first (so "10" sorts before "9"), then by
//! variant, then structurally, which keeps `Ord` consistent with `Eq`.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical rendering of date values.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A coordinate or content value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Long(i64),
    Double(f64),
    Date(NaiveDateTime),
}

impl Value {
    /// Numeric view of the value. Longs are widened, everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The canonical string rendering, borrowed when the value already is a string.
    pub fn canonical(&self) -> Cow<'_, str> {
        match self {
            Value::Str(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Parses a date in either `DATE_FORMAT` or plain `%Y-%m-%d` form.
    pub fn parse_date(input: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(input, DATE_FORMAT)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(input, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }

    /// Infers a coordinate from text: integral text becomes a long, anything else a string.
    pub fn infer(input: &str) -> Value {
        match input.parse::<i64>() {
            Ok(l) => Value::Long(l),
            Err(_) => Value::Str(input.to_string()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Str(_) => 0,
            Value::Long(_) => 1,
            Value::Double(_) => 2,
            Value::Date(_) => 3,
        }
    }
}

/// Bit pattern of a double with every NaN collapsed onto one pattern.
fn double_bits(d: f64) -> u64 {
    if d.is_nan() {
        f64::NAN.to_bits()
    } else {
        d.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => double_bits(*a) == double_bits(*b),
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Str(s) => s.hash(state),
            Value::Long(l) => l.hash(state),
            Value::Double(d) => double_bits(*d).hash(state),
            Value::Date(d) => d.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical()
            .cmp(&other.canonical())
            .then_with(|| self.type_rank().cmp(&other.type_rank()))
            .then_with(|| match (self, other) {
                (Value::Double(a), Value::Double(b)) => {
                    f64::from_bits(double_bits(*a)).total_cmp(&f64::from_bits(double_bits(*b)))
                }
                (Value::Date(a), Value::Date(b)) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Long(l) => write!(f, "{}", l),
            Value::Double(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Long(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Date(value)
    }
}
