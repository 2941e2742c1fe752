//! Hashable row keys for the no-duplicates policy

use crate::schema::Value;

/// Key column value in hashable form. Nulls have no key and never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RowKey {
    String(String),
    Integer(i64),
    /// Bit pattern, with `-0.0` folded into `0.0`
    Float(u64),
    Boolean(bool),
}

impl RowKey {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RowKey::String(s.clone())),
            Value::Integer(i) => Some(RowKey::Integer(*i)),
            Value::Float(f) => Some(RowKey::Float(if *f == 0.0 { 0 } else { f.to_bits() })),
            Value::Boolean(b) => Some(RowKey::Boolean(*b)),
            Value::Null => None,
        }
    }
}
