//! Native Values
//!
//! Representasi dinamis dari data yang di-encode/decode oleh descriptor.
//! Satu enum untuk semua kind supaya descriptor bisa dipakai sebagai data
//! (tanpa generated code per type).

/// Opaque OS/IPC handle, ditransmisikan lewat index di handle table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// Opaque associated endpoint, dibuat dan di-resolve oleh
/// `AssociatedGroupController`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AssociatedEndpointHandle(pub u64);

impl AssociatedEndpointHandle {
    /// Placeholder untuk endpoint yang gagal dibuat controller
    pub const INVALID: AssociatedEndpointHandle = AssociatedEndpointHandle(u64::MAX);

    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// Handle + version pair for an interface pointer field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfacePtrInfo {
    pub handle: Handle,
    pub version: u32,
}

/// Endpoint + version pair for an associated interface field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssociatedInterfacePtrInfo {
    pub endpoint: AssociatedEndpointHandle,
    pub version: u32,
}

/// Struct value: named fields
///
/// Perbandingan tidak peduli urutan field.
#[derive(Clone, Debug, Default)]
pub struct StructValue {
    fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Builder-style `set`
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing an existing one with the same name.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for StructValue {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(name, v)| other.get(name) == Some(v))
    }
}

/// Union value: exactly one active field
#[derive(Clone, Debug, PartialEq)]
pub struct UnionValue {
    pub field: String,
    pub value: Box<Value>,
}

impl UnionValue {
    pub fn new(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: Box::new(value.into()),
        }
    }
}

/// Dynamic value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Null pointer, absent handle, or missing field
    Null,
    Bool(bool),
    /// Signed integers and enums
    Int(i64),
    Uint(u64),
    F32(f32),
    F64(f64),
    String(String),
    Array(Vec<Value>),
    /// Ordered association; keys unique
    Map(Vec<(Value, Value)>),
    Struct(StructValue),
    Union(UnionValue),
    Handle(Handle),
    Interface(InterfacePtrInfo),
    InterfaceRequest(Handle),
    AssociatedInterface(AssociatedInterfacePtrInfo),
    AssociatedInterfaceRequest(AssociatedEndpointHandle),
}

impl Value {
    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::F32(_) => "float",
            Value::F64(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
            Value::Union(_) => "union",
            Value::Handle(_) => "handle",
            Value::Interface(_) => "interface",
            Value::InterfaceRequest(_) => "interface request",
            Value::AssociatedInterface(_) => "associated interface",
            Value::AssociatedInterfaceRequest(_) => "associated interface request",
        }
    }

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of `Int` or `Uint` (if it fits).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Integer view of `Uint` or non-negative `Int`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&UnionValue> {
        match self {
            Value::Union(u) => Some(u),
            _ => None,
        }
    }

    /// Lookup in a `Map` value by key.
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Build a `Map` from pairs; a repeated key overwrites the earlier
    /// value in place.
    pub fn map_from<K, V, I>(pairs: I) -> Value
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries: Vec<(Value, Value)> = Vec::new();
        for (k, v) in pairs {
            insert_entry(&mut entries, k.into(), v.into());
        }
        Value::Map(entries)
    }
}

/// Last write wins, first position kept.
pub(crate) fn insert_entry(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, slot)) => *slot = value,
        None => entries.push((key, value)),
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $wide:ty, $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(<$wide>::from(v))
                }
            }
        )*
    };
}

impl_from_int!(Int, i64, i8, i16, i32, i64);
impl_from_int!(Uint, u64, u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
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

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Value::Struct(v)
    }
}

impl From<UnionValue> for Value {
    fn from(v: UnionValue) -> Self {
        Value::Union(v)
    }
}

impl From<Handle> for Value {
    fn from(v: Handle) -> Self {
        Value::Handle(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(-1i8), Value::Int(-1));
        assert_eq!(Value::from(7u16), Value::Uint(7));
        assert_eq!(Value::from("hé"), Value::String("hé".to_string()));
        assert_eq!(Value::from(None::<u32>), Value::Null);
        assert_eq!(
            Value::from(vec![1u8, 2]),
            Value::Array(vec![Value::Uint(1), Value::Uint(2)])
        );
    }

    #[test]
    fn test_map_last_write_wins() {
        let map = Value::map_from([("x", 1i32), ("y", 2), ("x", 3)]);
        let entries = map.as_map().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Value::from("x"));
        assert_eq!(map.map_get(&"x".into()), Some(&Value::Int(3)));
    }

    #[test]
    fn test_struct_value_set_replaces() {
        let mut s = StructValue::new().with("a", 1u32).with("b", "x");
        s.set("a", 2u32);

        assert_eq!(s.len(), 2);
        assert_eq!(s.get("a"), Some(&Value::Uint(2)));
        assert_eq!(s.get("missing"), None);
        assert_eq!(s, StructValue::new().with("b", "x").with("a", 2u32));
    }

    #[test]
    fn test_integer_views() {
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Uint(u64::MAX).as_i64(), None);
        assert_eq!(Value::Uint(5).as_i64(), Some(5));
    }
}
