use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

///
/// ValueError
/// Raised when a stored string cannot be decoded under its declared kind.
///

#[remain::sorted]
#[derive(Debug, ThisError, Eq, PartialEq)]
pub enum ValueError {
    #[error("invalid bool storage value: '{raw}'")]
    BadBool { raw: String },

    #[error("invalid float storage value: '{raw}'")]
    BadFloat { raw: String },

    #[error("invalid int storage value: '{raw}'")]
    BadInt { raw: String },

    #[error("invalid timestamp storage value: '{raw}'")]
    BadTimestamp { raw: String },

    #[error("list values have no single-string storage form")]
    ListNotScalar,
}

///
/// FieldKind
/// Declared storage kind of a model field. Range support is a property
/// of the kind, decided here once and cached on the field descriptor.
///

#[remain::sorted]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FieldKind {
    Bool,
    Counter,
    Float,
    Int,
    List(Box<FieldKind>),
    Text,
    Timestamp,
}

impl FieldKind {
    /// Kinds whose values project onto a numeric score.
    #[must_use]
    pub const fn supports_range(&self) -> bool {
        matches!(self, Self::Counter | Self::Float | Self::Int | Self::Timestamp)
    }

    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Static name of the kind; list kinds drop their element.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Counter => "counter",
            Self::Float => "float",
            Self::Int => "int",
            Self::List(_) => "list",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Counter => write!(f, "counter"),
            Self::Float => write!(f, "float"),
            Self::Int => write!(f, "int"),
            Self::List(elem) => write!(f, "list<{elem}>"),
            Self::Text => write!(f, "text"),
            Self::Timestamp => write!(f, "timestamp"),
        }
    }
}

///
/// Value
/// Runtime value of a record field.
///
/// The scalar storage form is the single canonical string for a value:
/// record rows, index key segments, and sort weights all agree on it.
///

#[remain::sorted]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Bool(bool),
    Float(f64),
    Int(i64),
    List(Vec<Value>),
    Text(String),
    Timestamp(Timestamp),
}

impl Value {
    /// Whether this value agrees with a declared field kind.
    /// Counters hold plain ints; list values must agree element-wise.
    #[must_use]
    pub fn matches(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Self::Bool(_), FieldKind::Bool)
            | (Self::Float(_), FieldKind::Float)
            | (Self::Int(_), FieldKind::Counter | FieldKind::Int)
            | (Self::Text(_), FieldKind::Text)
            | (Self::Timestamp(_), FieldKind::Timestamp) => true,
            (Self::List(items), FieldKind::List(elem)) => {
                items.iter().all(|item| item.matches(elem))
            }
            _ => false,
        }
    }

    /// Canonical storage string. `None` for lists, which are stored
    /// element-wise and never as one string.
    #[must_use]
    pub fn scalar_storage(&self) -> Option<String> {
        match self {
            Self::Bool(true) => Some("1".to_string()),
            Self::Bool(false) => Some("0".to_string()),
            Self::Float(x) => Some(format!("{x:.6}")),
            Self::Int(n) => Some(n.to_string()),
            Self::List(_) => None,
            Self::Text(s) => Some(s.clone()),
            Self::Timestamp(t) => Some(t.get().to_string()),
        }
    }

    /// Numeric score used by range indices. `None` for kinds that do not
    /// support range queries.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(n) => Some(*n as f64),
            Self::Timestamp(t) => Some(t.get() as f64),
            Self::Bool(_) | Self::List(_) | Self::Text(_) => None,
        }
    }

    /// Decode a stored string under a declared kind.
    pub fn from_storage(kind: &FieldKind, raw: &str) -> Result<Self, ValueError> {
        match kind {
            FieldKind::Bool => match raw {
                "1" => Ok(Self::Bool(true)),
                "0" => Ok(Self::Bool(false)),
                _ => Err(ValueError::BadBool {
                    raw: raw.to_string(),
                }),
            },
            FieldKind::Counter | FieldKind::Int => {
                raw.parse::<i64>()
                    .map(Self::Int)
                    .map_err(|_| ValueError::BadInt {
                        raw: raw.to_string(),
                    })
            }
            FieldKind::Float => raw
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|_| ValueError::BadFloat {
                    raw: raw.to_string(),
                }),
            FieldKind::List(_) => Err(ValueError::ListNotScalar),
            FieldKind::Text => Ok(Self::Text(raw.to_string())),
            FieldKind::Timestamp => raw
                .parse::<u64>()
                .map(|secs| Self::Timestamp(Timestamp::from_seconds(secs)))
                .map_err(|_| ValueError::BadTimestamp {
                    raw: raw.to_string(),
                }),
        }
    }

    /// Kind label for error messages.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::List(_) => "list",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Timestamp> for Value {
    fn from(t: Timestamp) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_storage() {
        assert_eq!(Value::Bool(true).scalar_storage().unwrap(), "1");
        assert_eq!(Value::Bool(false).scalar_storage().unwrap(), "0");
    }

    #[test]
    fn test_float_storage_has_six_decimals() {
        assert_eq!(Value::Float(1.5).scalar_storage().unwrap(), "1.500000");
        assert_eq!(Value::Float(-0.25).scalar_storage().unwrap(), "-0.250000");
    }

    #[test]
    fn test_list_has_no_scalar_storage() {
        let list = Value::List(vec![Value::Int(1)]);
        assert!(list.scalar_storage().is_none());
    }

    #[test]
    fn test_storage_roundtrip_scalars() {
        let cases = vec![
            (FieldKind::Bool, Value::Bool(true)),
            (FieldKind::Int, Value::Int(-42)),
            (FieldKind::Counter, Value::Int(7)),
            (FieldKind::Float, Value::Float(2.125)),
            (FieldKind::Text, Value::Text("hello".to_string())),
            (
                FieldKind::Timestamp,
                Value::Timestamp(Timestamp::from_seconds(1_700_000_000)),
            ),
        ];

        for (kind, value) in cases {
            let raw = value.scalar_storage().expect("scalar storage");
            let back = Value::from_storage(&kind, &raw).expect("decode");
            assert_eq!(back, value, "kind {kind}");
        }
    }

    #[test]
    fn test_from_storage_rejects_garbage() {
        assert!(Value::from_storage(&FieldKind::Bool, "yes").is_err());
        assert!(Value::from_storage(&FieldKind::Int, "1.5").is_err());
        assert!(Value::from_storage(&FieldKind::Float, "abc").is_err());
        assert!(Value::from_storage(&FieldKind::Timestamp, "-1").is_err());
    }

    #[test]
    fn test_matches_kind() {
        assert!(Value::Int(1).matches(&FieldKind::Int));
        assert!(Value::Int(1).matches(&FieldKind::Counter));
        assert!(!Value::Int(1).matches(&FieldKind::Float));

        let tags = Value::List(vec![Value::from("a"), Value::from("b")]);
        assert!(tags.matches(&FieldKind::List(Box::new(FieldKind::Text))));
        assert!(!tags.matches(&FieldKind::List(Box::new(FieldKind::Int))));
    }

    #[test]
    fn test_score_projection() {
        assert_eq!(Value::Int(10).score(), Some(10.0));
        assert_eq!(Value::Float(1.25).score(), Some(1.25));
        assert_eq!(
            Value::Timestamp(Timestamp::from_seconds(5)).score(),
            Some(5.0)
        );
        assert!(Value::Text("x".to_string()).score().is_none());
        assert!(Value::Bool(true).score().is_none());
    }

    #[test]
    fn test_kind_display() {
        let kind = FieldKind::List(Box::new(FieldKind::Text));
        assert_eq!(kind.to_string(), "list<text>");
        assert_eq!(FieldKind::Timestamp.to_string(), "timestamp");
    }

    #[test]
    fn test_supports_range() {
        assert!(FieldKind::Int.supports_range());
        assert!(FieldKind::Counter.supports_range());
        assert!(FieldKind::Float.supports_range());
        assert!(FieldKind::Timestamp.supports_range());
        assert!(!FieldKind::Bool.supports_range());
        assert!(!FieldKind::Text.supports_range());
        assert!(!FieldKind::List(Box::new(FieldKind::Int)).supports_range());
    }
}
