//! XML-RPC value model.
//!
//! Struct members are kept in a `BTreeMap`, so encoded documents list members in
//! name order regardless of how a struct was built.

use std::collections::BTreeMap;
use std::fmt;

/// Map type backing [`Value::Struct`].
pub type StructMap = BTreeMap<String, Value>;

/// A decoded XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `<i4>` / `<int>`
    Int(i32),
    /// `<boolean>`
    Boolean(bool),
    /// `<string>`, or an untyped `<value>`
    String(String),
    /// `<double>`
    Double(f64),
    /// `<dateTime.iso8601>`, kept as sent
    DateTime(String),
    /// `<base64>`, decoded
    Base64(Vec<u8>),
    /// `<struct>`
    Struct(StructMap),
    /// `<array>`
    Array(Vec<Value>),
}

impl Value {
    /// Name of the XML-RPC type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Double(_) => "double",
            Value::DateTime(_) => "dateTime.iso8601",
            Value::Base64(_) => "base64",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
        }
    }

    /// Build a struct value from `(name, value)` pairs.
    pub fn structure<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Struct(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructMap> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a struct member.
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.as_struct().and_then(|m| m.get(member))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::Base64(v) => write!(f, "<{} bytes>", v.len()),
            Value::Struct(members) => {
                write!(f, "{{")?;
                for (i, (k, v)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<StructMap> for Value {
    fn from(v: StructMap) -> Self {
        Value::Struct(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_builder() {
        let value = Value::structure([("Login", Value::from("abc")), ("Rank", Value::from(3))]);

        assert_eq!(value.get("Login").and_then(Value::as_str), Some("abc"));
        assert_eq!(value.get("Rank").and_then(Value::as_i32), Some(3));
        assert!(value.get("Missing").is_none());
    }

    #[test]
    fn test_accessors_reject_other_types() {
        let value = Value::from("1");
        assert_eq!(value.as_i32(), None);
        assert_eq!(value.as_bool(), None);
        assert!(value.as_array().is_none());
    }

    #[test]
    fn test_int_widens_to_double() {
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
    }

    #[test]
    fn test_display() {
        let value = Value::Array(vec![Value::from(1), Value::from("a")]);
        assert_eq!(value.to_string(), "[1, \"a\"]");
    }
}
