//! Conversion between raw [`Value`]s and typed records.
//!
//! [`FromValue`] decodes a value into a Rust type and [`ToValue`] encodes it
//! back. Records are decoded through [`Fields`], which names the structure and
//! member in every error, and encoded through [`StructBuilder`].
//!
//! The same decode function backs an immediate call and its multicall
//! transformer, so both modes yield the same output for the same raw value.
//!
//! # Example
//!
//! ```
//! use gbxremote_client::codec::Value;
//! use gbxremote_client::marshal::{Fields, FromValue};
//!
//! let raw = Value::structure([("Code", Value::Int(4)), ("Name", Value::from("Running - Play"))]);
//! let mut fields = Fields::new("Status", raw).unwrap();
//! let code: i32 = fields.required("Code").unwrap();
//! assert_eq!(code, 4);
//!
//! let err = i32::from_value(Value::from("4")).unwrap_err();
//! assert!(err.to_string().contains("int"));
//! ```

mod secure;
mod structures;

pub use secure::{needs_marker, secure, secure_all, strip, strip_all, strip_value, SECURE_MARKER};
pub use structures::{
    CallVoteRatio, ListEntry, MapInfo, NetworkStats, PlayerInfo, PlayerNetInfo, PlayerRanking,
    ScriptInfo, ScriptParamDesc, ServerOptions, Status, SystemInfo, Version,
};

use crate::codec::{StructMap, Value};
use crate::error::{GbxError, Result};

/// Decode a raw value into `Self`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

/// Encode `self` as a raw value.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

fn mismatch(target: &str, expected: &str, found: &Value) -> GbxError {
    GbxError::marshal(
        target,
        format!("expected {}, got {}", expected, found.type_name()),
    )
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        value.as_i32().ok_or_else(|| mismatch("int", "int", &value))
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| mismatch("boolean", "boolean", &value))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| mismatch("double", "double", &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", "string", &other)),
        }
    }
}

impl FromValue for StructMap {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Struct(members) => Ok(members),
            other => Err(mismatch("struct", "struct", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("array", "array", &other)),
        }
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for i32 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

/// Decode a string and remove one leading secure marker.
pub fn decode_text(value: Value) -> Result<String> {
    String::from_value(value).map(|s| strip(&s).to_string())
}

/// Decode an array of strings, removing one leading marker from each.
pub fn decode_text_list(value: Value) -> Result<Vec<String>> {
    Vec::<String>::from_value(value).map(strip_all)
}

/// Member-by-member reader over a struct value.
///
/// Errors name the member as `Structure.Member`.
pub struct Fields {
    structure: &'static str,
    members: StructMap,
}

impl Fields {
    /// # Errors
    ///
    /// `Marshal` naming `structure` if `value` is not a struct.
    pub fn new(structure: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Struct(members) => Ok(Self { structure, members }),
            other => Err(mismatch(structure, "struct", &other)),
        }
    }

    fn target(&self, name: &str) -> String {
        format!("{}.{}", self.structure, name)
    }

    fn decode<T>(&self, name: &str, value: Value, decode: impl FnOnce(Value) -> Result<T>) -> Result<T> {
        decode(value).map_err(|e| match e {
            GbxError::Marshal { detail, .. } => GbxError::marshal(self.target(name), detail),
            other => other,
        })
    }

    /// Take a member that must be present.
    pub fn required<T: FromValue>(&mut self, name: &str) -> Result<T> {
        self.required_with(name, T::from_value)
    }

    /// Take a member that must be present, decoding it with `decode`.
    pub fn required_with<T>(&mut self, name: &str, decode: impl FnOnce(Value) -> Result<T>) -> Result<T> {
        let value = self
            .members
            .remove(name)
            .ok_or_else(|| GbxError::marshal(self.target(name), "missing"))?;
        self.decode(name, value, decode)
    }

    /// Take a member that may be absent.
    pub fn optional<T: FromValue>(&mut self, name: &str) -> Result<Option<T>> {
        match self.members.remove(name) {
            Some(value) => self.decode(name, value, T::from_value).map(Some),
            None => Ok(None),
        }
    }

    /// Take a member, falling back to `T::default()` when absent.
    pub fn or_default<T: FromValue + Default>(&mut self, name: &str) -> Result<T> {
        Ok(self.optional(name)?.unwrap_or_default())
    }

    /// Take a required text member, stripping its secure marker.
    pub fn text(&mut self, name: &str) -> Result<String> {
        self.required_with(name, decode_text)
    }

    /// Take an optional text member, stripping its secure marker.
    pub fn optional_text(&mut self, name: &str) -> Result<Option<String>> {
        match self.members.remove(name) {
            Some(value) => self.decode(name, value, decode_text).map(Some),
            None => Ok(None),
        }
    }
}

/// Builder for struct values.
#[derive(Debug, Default)]
pub struct StructBuilder {
    members: StructMap,
}

impl StructBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<T: ToValue + ?Sized>(mut self, name: &str, value: &T) -> Self {
        self.members.insert(name.to_string(), value.to_value());
        self
    }

    /// Add a member only when `value` is `Some`.
    pub fn optional<T: ToValue>(self, name: &str, value: &Option<T>) -> Self {
        match value {
            Some(v) => self.field(name, v),
            None => self,
        }
    }

    /// Add a text member, secured for transport.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.members
            .insert(name.to_string(), Value::String(secure(value)));
        self
    }

    pub fn build(self) -> Value {
        Value::Struct(self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_decoding() {
        assert_eq!(i32::from_value(Value::Int(7)).unwrap(), 7);
        assert!(bool::from_value(Value::Boolean(true)).unwrap());
        assert_eq!(f64::from_value(Value::Int(2)).unwrap(), 2.0);
        assert_eq!(String::from_value(Value::from("a")).unwrap(), "a");
    }

    #[test]
    fn test_primitive_mismatch_is_marshal_error() {
        let err = i32::from_value(Value::from("7")).unwrap_err();
        match err {
            GbxError::Marshal { target, detail } => {
                assert_eq!(target, "int");
                assert_eq!(detail, "expected int, got string");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_vec_decoding() {
        let raw = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(Vec::<i32>::from_value(raw).unwrap(), vec![1, 2]);

        let bad = Value::Array(vec![Value::Int(1), Value::from("2")]);
        assert!(Vec::<i32>::from_value(bad).is_err());
    }

    #[test]
    fn test_fields_name_missing_member() {
        let raw = Value::structure([("Code", Value::Int(4))]);
        let mut fields = Fields::new("Status", raw).unwrap();

        let err = fields.required::<String>("Name").unwrap_err();
        match err {
            GbxError::Marshal { target, detail } => {
                assert_eq!(target, "Status.Name");
                assert_eq!(detail, "missing");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fields_name_invalid_member() {
        let raw = Value::structure([("Code", Value::from("four"))]);
        let mut fields = Fields::new("Status", raw).unwrap();

        let err = fields.required::<i32>("Code").unwrap_err();
        assert!(matches!(
            err,
            GbxError::Marshal { ref target, .. } if target == "Status.Code"
        ));
    }

    #[test]
    fn test_fields_rejects_non_struct() {
        let err = Fields::new("Version", Value::Int(1)).err().unwrap();
        assert!(matches!(err, GbxError::Marshal { ref target, .. } if target == "Version"));
    }

    #[test]
    fn test_optional_and_default() {
        let raw = Value::structure([("Login", Value::from("abc"))]);
        let mut fields = Fields::new("ListEntry", raw).unwrap();

        assert_eq!(fields.optional::<String>("IPAddress").unwrap(), None);
        assert_eq!(fields.or_default::<i32>("Flags").unwrap(), 0);
        assert_eq!(fields.optional::<String>("Login").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_builder_secures_text() {
        let value = StructBuilder::new()
            .text("Name", "Café")
            .text("Plain", "abc")
            .field("Count", &3)
            .optional::<i32>("Absent", &None)
            .build();

        assert_eq!(value.get("Name"), Some(&Value::from("\u{FEFF}Café")));
        assert_eq!(value.get("Plain"), Some(&Value::from("abc")));
        assert_eq!(value.get("Count"), Some(&Value::Int(3)));
        assert!(value.get("Absent").is_none());

        let mut fields = Fields::new("Test", value).unwrap();
        assert_eq!(fields.text("Name").unwrap(), "Café");
    }
}
