// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::Labels;

/// The closed set of value kinds a closure or LAL expression can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Str(String),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn from_labels(labels: &Labels) -> Value {
        Value::Map(
            labels
                .iter()
                .map(|(k, v)| (k.clone(), Value::Str(v.clone())))
                .collect(),
        )
    }

    /// Extract a label map back out of a tag-map value. Non-string entries
    /// are rendered with their display form; null entries are dropped.
    pub fn to_labels(&self) -> Option<Labels> {
        let Value::Map(entries) = self else {
            return None;
        };

        let mut labels = Labels::new();
        for (key, value) in entries {
            if *value == Value::Null {
                continue;
            }
            labels.insert(key.clone(), value.to_string());
        }

        Some(labels)
    }

    /// Truthiness used by conditions: null, false, zero, the empty string,
    /// and the empty map are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Double(_))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Map(m) => {
                write!(f, "[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(entries) => Value::Map(
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), Value::from(v)))
                    .collect(),
            ),
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
        assert!(Value::Double(0.5).is_truthy());
    }

    #[test]
    fn test_json_conversion() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"code": 200, "msg": "ok", "flags": null}"#).unwrap();
        let value = Value::from(json);

        let Value::Map(entries) = &value else {
            panic!("expected a map");
        };
        assert_eq!(Some(&Value::Integer(200)), entries.get("code"));
        assert_eq!(Some(&Value::Str("ok".into())), entries.get("msg"));
        assert_eq!(Some(&Value::Null), entries.get("flags"));
    }
}
