//! Scalar attribute values stored alongside vectors

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::ScalarType;

/// Attribute value for a scalar column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Boolean(_) => "Boolean",
            Value::Null => "Null",
        }
    }

    /// Whether this value may be stored in a column of `ty`
    pub fn fits(&self, ty: ScalarType) -> bool {
        matches!(
            (self, ty),
            (Value::Null, _)
                | (Value::String(_), ScalarType::String)
                | (Value::Integer(_), ScalarType::Integer)
                | (Value::Integer(_), ScalarType::Float)
                | (Value::Float(_), ScalarType::Float)
                | (Value::Boolean(_), ScalarType::Boolean)
        )
    }

    /// Converts into the stored representation for `ty` (integers widen into float columns)
    pub(crate) fn coerce(self, ty: ScalarType) -> Value {
        match (self, ty) {
            (Value::Integer(i), ScalarType::Float) => Value::Float(i as f64),
            (v, _) => v,
        }
    }

    /// Ordering between two non-null values of comparable types.
    ///
    /// Integers and floats compare numerically; `None` for anything else.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                let (a, b) = (self.as_float()?, other.as_float()?);
                a.partial_cmp(&b)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_and_coerce() {
        assert!(Value::from("a").fits(ScalarType::String));
        assert!(!Value::from("a").fits(ScalarType::Integer));
        assert!(Value::from(3i64).fits(ScalarType::Float));
        assert!(!Value::from(3.5).fits(ScalarType::Integer));
        assert!(Value::Null.fits(ScalarType::Boolean));

        assert_eq!(Value::from(3i64).coerce(ScalarType::Float), Value::Float(3.0));
        assert_eq!(Value::from(3i64).coerce(ScalarType::Integer), Value::Integer(3));
    }

    #[test]
    fn test_compare() {
        assert_eq!(Value::from(2i64).compare(&Value::from(2.5)), Some(Ordering::Less));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("b").compare(&Value::from(1i64)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(Value::from(None::<i64>).to_string(), "null");
        assert_eq!(Value::from(7i32).to_string(), "7");
    }
}
