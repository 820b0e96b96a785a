//! Type Descriptors
//!
//! Setiap descriptor adalah nilai immutable: `encoded_size` (ukuran inline
//! di container) + `encode` + `decode`. Descriptor komposit mendelegasikan
//! ke descriptor elemen secara rekursif. Pasangan nullable/non-nullable
//! digabung jadi satu variant dengan flag `nullable` (dokumentasi saja,
//! perilaku sama).

use std::sync::Arc;

use crate::error::{CodecError, Result};

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::layout::{align, ARRAY_HEADER_SIZE, MAP_DATA_SIZE, POINTER_SIZE, UNION_DATA_SIZE};
use super::structs::StructSpec;
use super::unions::UnionSpec;
use super::value::{AssociatedInterfacePtrInfo, InterfacePtrInfo, Value};

/// Anything that can be encoded at an `Encoder` cursor and decoded back.
pub trait MojomType {
    /// Bytes occupied inline by this type in its container.
    fn encoded_size(&self) -> usize;

    fn encode(&self, encoder: &mut Encoder<'_>, value: &Value) -> Result<()>;

    fn decode(&self, decoder: &mut Decoder<'_>) -> Result<Value>;

    /// Bytes of aligned out-of-line regions `value` adds beyond the inline
    /// `encoded_size`.
    fn out_of_line_size(&self, _value: &Value) -> Result<usize> {
        Ok(0)
    }

    /// Exact encoded size of `value` at the top of a fresh region: the
    /// aligned inline part plus every out-of-line region.
    fn compute_size(&self, value: &Value) -> Result<usize> {
        Ok(align(self.encoded_size()) + self.out_of_line_size(value)?)
    }

    /// Number of associated endpoints `value` will append to the message.
    fn associated_endpoint_count(&self, _value: &Value) -> usize {
        0
    }
}

/// Generated enum class: maps raw wire values to known values
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: String,
    pub values: Vec<i32>,
    /// Extensible enums replace unknown values with `default_value`.
    pub extensible: bool,
    pub default_value: Option<i32>,
}

impl EnumSpec {
    pub fn new(name: &str, values: &[i32]) -> Self {
        Self {
            name: name.to_string(),
            values: values.to_vec(),
            extensible: false,
            default_value: None,
        }
    }

    pub fn extensible(mut self, default_value: i32) -> Self {
        self.extensible = true;
        self.default_value = Some(default_value);
        self
    }

    #[inline(always)]
    pub fn is_known_enum_value(&self, raw: i32) -> bool {
        self.values.contains(&raw)
    }

    /// Unknown values map to the default of an extensible enum and pass
    /// through unchanged otherwise.
    pub fn to_known_enum_value(&self, raw: i32) -> i32 {
        if self.is_known_enum_value(raw) {
            return raw;
        }
        match (self.extensible, self.default_value) {
            (true, Some(default)) => default,
            _ => raw,
        }
    }
}

/// Field-level type descriptor
#[derive(Clone, Debug, PartialEq)]
pub enum Descriptor {
    /// Bool: 1 bit in structs and arrays, 1 byte standalone
    PackedBool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    Enum(Arc<EnumSpec>),
    String {
        nullable: bool,
    },
    PointerTo {
        cls: Arc<StructSpec>,
        nullable: bool,
    },
    ArrayOf {
        element: Box<Descriptor>,
        length: Option<usize>,
        nullable: bool,
    },
    MapOf {
        key: Box<Descriptor>,
        value: Box<Descriptor>,
        nullable: bool,
    },
    Handle {
        nullable: bool,
    },
    Interface {
        nullable: bool,
    },
    InterfaceRequest {
        nullable: bool,
    },
    AssociatedInterfacePtrInfo {
        nullable: bool,
    },
    AssociatedInterfaceRequest {
        nullable: bool,
    },
    Union {
        cls: Arc<UnionSpec>,
        nullable: bool,
    },
}

impl Descriptor {
    pub fn string() -> Self {
        Descriptor::String { nullable: false }
    }

    pub fn nullable_string() -> Self {
        Descriptor::String { nullable: true }
    }

    pub fn enum_of(cls: Arc<EnumSpec>) -> Self {
        Descriptor::Enum(cls)
    }

    pub fn pointer_to(cls: Arc<StructSpec>) -> Self {
        Descriptor::PointerTo {
            cls,
            nullable: false,
        }
    }

    pub fn nullable_pointer_to(cls: Arc<StructSpec>) -> Self {
        Descriptor::PointerTo {
            cls,
            nullable: true,
        }
    }

    pub fn array_of(element: Descriptor) -> Self {
        Descriptor::ArrayOf {
            element: Box::new(element),
            length: None,
            nullable: false,
        }
    }

    /// Fixed-length array
    pub fn array_of_length(element: Descriptor, length: usize) -> Self {
        Descriptor::ArrayOf {
            element: Box::new(element),
            length: Some(length),
            nullable: false,
        }
    }

    pub fn nullable_array_of(element: Descriptor) -> Self {
        Descriptor::ArrayOf {
            element: Box::new(element),
            length: None,
            nullable: true,
        }
    }

    pub fn map_of(key: Descriptor, value: Descriptor) -> Self {
        Descriptor::MapOf {
            key: Box::new(key),
            value: Box::new(value),
            nullable: false,
        }
    }

    pub fn nullable_map_of(key: Descriptor, value: Descriptor) -> Self {
        Descriptor::MapOf {
            key: Box::new(key),
            value: Box::new(value),
            nullable: true,
        }
    }

    pub fn handle() -> Self {
        Descriptor::Handle { nullable: false }
    }

    pub fn nullable_handle() -> Self {
        Descriptor::Handle { nullable: true }
    }

    pub fn interface() -> Self {
        Descriptor::Interface { nullable: false }
    }

    pub fn nullable_interface() -> Self {
        Descriptor::Interface { nullable: true }
    }

    pub fn interface_request() -> Self {
        Descriptor::InterfaceRequest { nullable: false }
    }

    pub fn nullable_interface_request() -> Self {
        Descriptor::InterfaceRequest { nullable: true }
    }

    pub fn associated_interface() -> Self {
        Descriptor::AssociatedInterfacePtrInfo { nullable: false }
    }

    pub fn nullable_associated_interface() -> Self {
        Descriptor::AssociatedInterfacePtrInfo { nullable: true }
    }

    pub fn associated_interface_request() -> Self {
        Descriptor::AssociatedInterfaceRequest { nullable: false }
    }

    pub fn nullable_associated_interface_request() -> Self {
        Descriptor::AssociatedInterfaceRequest { nullable: true }
    }

    pub fn union_of(cls: Arc<UnionSpec>) -> Self {
        Descriptor::Union {
            cls,
            nullable: false,
        }
    }

    pub fn nullable_union_of(cls: Arc<UnionSpec>) -> Self {
        Descriptor::Union {
            cls,
            nullable: true,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Descriptor::String { nullable }
            | Descriptor::PointerTo { nullable, .. }
            | Descriptor::ArrayOf { nullable, .. }
            | Descriptor::MapOf { nullable, .. }
            | Descriptor::Handle { nullable }
            | Descriptor::Interface { nullable }
            | Descriptor::InterfaceRequest { nullable }
            | Descriptor::AssociatedInterfacePtrInfo { nullable }
            | Descriptor::AssociatedInterfaceRequest { nullable }
            | Descriptor::Union { nullable, .. } => *nullable,
            _ => false,
        }
    }

    #[inline(always)]
    pub fn is_packed_bool(&self) -> bool {
        matches!(self, Descriptor::PackedBool)
    }

    /// Struct field alignment
    pub fn alignment(&self) -> usize {
        match self {
            Descriptor::Interface { .. } | Descriptor::AssociatedInterfacePtrInfo { .. } => 4,
            Descriptor::Union { .. } => 8,
            other => other.encoded_size(),
        }
    }

    /// Payload bytes of an array of `n` elements (tanpa header).
    pub fn array_payload_size(&self, n: usize) -> usize {
        if self.is_packed_bool() {
            (n + 7) / 8
        } else {
            self.encoded_size().saturating_mul(n)
        }
    }

    /// Lengths of nested fixed/unsized arrays, outermost first.
    pub fn dimensions(&self) -> Vec<Option<usize>> {
        match self {
            Descriptor::ArrayOf {
                element, length, ..
            } => {
                let mut dims = vec![*length];
                dims.extend(element.dimensions());
                dims
            }
            _ => Vec::new(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Descriptor::PackedBool => "bool",
            Descriptor::Int8 => "int8",
            Descriptor::Int16 => "int16",
            Descriptor::Int32 => "int32",
            Descriptor::Int64 => "int64",
            Descriptor::Uint8 => "uint8",
            Descriptor::Uint16 => "uint16",
            Descriptor::Uint32 => "uint32",
            Descriptor::Uint64 => "uint64",
            Descriptor::Float => "float",
            Descriptor::Double => "double",
            Descriptor::Enum(_) => "enum",
            Descriptor::String { .. } => "string",
            Descriptor::PointerTo { .. } => "struct",
            Descriptor::ArrayOf { .. } => "array",
            Descriptor::MapOf { .. } => "map",
            Descriptor::Handle { .. } => "handle",
            Descriptor::Interface { .. } => "interface",
            Descriptor::InterfaceRequest { .. } => "interface request",
            Descriptor::AssociatedInterfacePtrInfo { .. } => "associated interface",
            Descriptor::AssociatedInterfaceRequest { .. } => "associated interface request",
            Descriptor::Union { .. } => "union",
        }
    }

    fn mismatch(&self, value: &Value) -> CodecError {
        CodecError::TypeMismatch {
            expected: self.name(),
            found: value.kind_name(),
        }
    }

    fn signed(&self, value: &Value, min: i64, max: i64) -> Result<i64> {
        let v = match value {
            Value::Int(v) => *v,
            Value::Uint(v) => i64::try_from(*v).map_err(|_| self.out_of_range(v))?,
            _ => return Err(self.mismatch(value)),
        };
        if v < min || v > max {
            return Err(self.out_of_range(&v));
        }
        Ok(v)
    }

    /// Guard unsigned fields: negative input is an error, never a
    /// two's-complement bit pattern.
    fn unsigned(&self, value: &Value, max: u64) -> Result<u64> {
        let v = match value {
            Value::Uint(v) => *v,
            Value::Int(v) if *v < 0 => {
                return Err(CodecError::NegativeUnsigned {
                    field: self.name(),
                    value: *v,
                })
            }
            Value::Int(v) => *v as u64,
            _ => return Err(self.mismatch(value)),
        };
        if v > max {
            return Err(self.out_of_range(&v));
        }
        Ok(v)
    }

    fn float(&self, value: &Value) -> Result<f64> {
        match value {
            Value::F32(v) => Ok(f64::from(*v)),
            Value::F64(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::Uint(v) => Ok(*v as f64),
            _ => Err(self.mismatch(value)),
        }
    }

    fn out_of_range(&self, v: &dyn std::fmt::Display) -> CodecError {
        CodecError::OutOfRange {
            field: self.name(),
            value: v.to_string(),
        }
    }
}

impl MojomType for Descriptor {
    fn encoded_size(&self) -> usize {
        match self {
            Descriptor::PackedBool | Descriptor::Int8 | Descriptor::Uint8 => 1,
            Descriptor::Int16 | Descriptor::Uint16 => 2,
            Descriptor::Int32
            | Descriptor::Uint32
            | Descriptor::Float
            | Descriptor::Enum(_)
            | Descriptor::Handle { .. }
            | Descriptor::InterfaceRequest { .. }
            | Descriptor::AssociatedInterfaceRequest { .. } => 4,
            Descriptor::Int64 | Descriptor::Uint64 | Descriptor::Double => 8,
            Descriptor::String { .. }
            | Descriptor::PointerTo { .. }
            | Descriptor::ArrayOf { .. }
            | Descriptor::MapOf { .. } => POINTER_SIZE,
            Descriptor::Interface { .. } | Descriptor::AssociatedInterfacePtrInfo { .. } => 8,
            Descriptor::Union { .. } => UNION_DATA_SIZE,
        }
    }

    fn encode(&self, encoder: &mut Encoder<'_>, value: &Value) -> Result<()> {
        match self {
            Descriptor::PackedBool => match value {
                Value::Bool(b) => encoder.write_uint8(u8::from(*b)),
                _ => Err(self.mismatch(value)),
            },
            Descriptor::Int8 => encoder.write_int8(self.signed(value, i8::MIN.into(), i8::MAX.into())? as i8),
            Descriptor::Int16 => {
                encoder.write_int16(self.signed(value, i16::MIN.into(), i16::MAX.into())? as i16)
            }
            Descriptor::Int32 => {
                encoder.write_int32(self.signed(value, i32::MIN.into(), i32::MAX.into())? as i32)
            }
            Descriptor::Int64 => encoder.write_int64(self.signed(value, i64::MIN, i64::MAX)?),
            Descriptor::Uint8 => encoder.write_uint8(self.unsigned(value, u8::MAX.into())? as u8),
            Descriptor::Uint16 => encoder.write_uint16(self.unsigned(value, u16::MAX.into())? as u16),
            Descriptor::Uint32 => encoder.write_uint32(self.unsigned(value, u32::MAX.into())? as u32),
            Descriptor::Uint64 => encoder.write_uint64(self.unsigned(value, u64::MAX)?),
            Descriptor::Float => match value {
                Value::F32(v) => encoder.write_float(*v),
                _ => encoder.write_float(self.float(value)? as f32),
            },
            Descriptor::Double => encoder.write_double(self.float(value)?),
            Descriptor::Enum(_) => {
                encoder.write_int32(self.signed(value, i32::MIN.into(), i32::MAX.into())? as i32)
            }
            Descriptor::String { .. } => encoder.encode_string_pointer(value),
            Descriptor::PointerTo { cls, .. } => match value {
                Value::Null | Value::Struct(_) => encoder.encode_struct_pointer(cls.as_ref(), value),
                _ => Err(self.mismatch(value)),
            },
            Descriptor::ArrayOf {
                element, length, ..
            } => encoder.encode_array_pointer(element, value, *length),
            Descriptor::MapOf { key, value: v, .. } => encoder.encode_map_pointer(key, v, value),
            Descriptor::Handle { .. } => match value {
                Value::Null => encoder.encode_handle(None),
                Value::Handle(h) => encoder.encode_handle(Some(*h)),
                _ => Err(self.mismatch(value)),
            },
            Descriptor::Interface { .. } => {
                let (handle, version) = match value {
                    Value::Null => (None, 0),
                    Value::Interface(info) => (Some(info.handle), info.version),
                    _ => return Err(self.mismatch(value)),
                };
                encoder.encode_handle(handle)?;
                encoder.write_uint32(version)
            }
            Descriptor::InterfaceRequest { .. } => match value {
                Value::Null => encoder.encode_handle(None),
                Value::InterfaceRequest(h) | Value::Handle(h) => encoder.encode_handle(Some(*h)),
                _ => Err(self.mismatch(value)),
            },
            Descriptor::AssociatedInterfacePtrInfo { .. } => {
                let (endpoint, version) = match value {
                    Value::Null => (None, 0),
                    Value::AssociatedInterface(info) => (Some(info.endpoint), info.version),
                    _ => return Err(self.mismatch(value)),
                };
                encoder.encode_associated_endpoint_handle(endpoint)?;
                encoder.write_uint32(version)
            }
            Descriptor::AssociatedInterfaceRequest { .. } => match value {
                Value::Null => encoder.encode_associated_endpoint_handle(None),
                Value::AssociatedInterfaceRequest(e) => {
                    encoder.encode_associated_endpoint_handle(Some(*e))
                }
                _ => Err(self.mismatch(value)),
            },
            Descriptor::Union { cls, .. } => cls.encode(encoder, value),
        }
    }

    fn decode(&self, decoder: &mut Decoder<'_>) -> Result<Value> {
        Ok(match self {
            Descriptor::PackedBool => Value::Bool(decoder.read_uint8()? != 0),
            Descriptor::Int8 => Value::from(decoder.read_int8()?),
            Descriptor::Int16 => Value::from(decoder.read_int16()?),
            Descriptor::Int32 => Value::from(decoder.read_int32()?),
            Descriptor::Int64 => Value::from(decoder.read_int64()?),
            Descriptor::Uint8 => Value::from(decoder.read_uint8()?),
            Descriptor::Uint16 => Value::from(decoder.read_uint16()?),
            Descriptor::Uint32 => Value::from(decoder.read_uint32()?),
            Descriptor::Uint64 => Value::from(decoder.read_uint64()?),
            Descriptor::Float => Value::F32(decoder.read_float()?),
            Descriptor::Double => Value::F64(decoder.read_double()?),
            Descriptor::Enum(cls) => Value::from(cls.to_known_enum_value(decoder.read_int32()?)),
            Descriptor::String { .. } => decoder.decode_string_pointer()?,
            Descriptor::PointerTo { cls, .. } => decoder.decode_struct_pointer(cls.as_ref())?,
            Descriptor::ArrayOf {
                element, length, ..
            } => decoder.decode_array_pointer(element, *length)?,
            Descriptor::MapOf { key, value, .. } => decoder.decode_map_pointer(key, value)?,
            Descriptor::Handle { .. } => decoder.decode_handle()?.map_or(Value::Null, Value::Handle),
            Descriptor::Interface { .. } => {
                let handle = decoder.decode_handle()?;
                let version = decoder.read_uint32()?;
                handle.map_or(Value::Null, |handle| {
                    Value::Interface(InterfacePtrInfo { handle, version })
                })
            }
            Descriptor::InterfaceRequest { .. } => decoder
                .decode_handle()?
                .map_or(Value::Null, Value::InterfaceRequest),
            Descriptor::AssociatedInterfacePtrInfo { .. } => {
                let endpoint = decoder.decode_associated_endpoint_handle()?;
                let version = decoder.read_uint32()?;
                endpoint.map_or(Value::Null, |endpoint| {
                    Value::AssociatedInterface(AssociatedInterfacePtrInfo { endpoint, version })
                })
            }
            Descriptor::AssociatedInterfaceRequest { .. } => decoder
                .decode_associated_endpoint_handle()?
                .map_or(Value::Null, Value::AssociatedInterfaceRequest),
            Descriptor::Union { cls, .. } => cls.decode(decoder)?,
        })
    }

    fn out_of_line_size(&self, value: &Value) -> Result<usize> {
        if value.is_null() {
            return Ok(0);
        }
        match (self, value) {
            (Descriptor::String { .. }, Value::String(s)) => Ok(align(ARRAY_HEADER_SIZE + s.len())),
            (Descriptor::String { .. }, _) => Err(CodecError::NotAString),
            (Descriptor::PointerTo { cls, .. }, _) => cls.region_size(value),
            (Descriptor::ArrayOf { element, .. }, Value::Array(items)) => {
                let mut size = align(ARRAY_HEADER_SIZE + element.array_payload_size(items.len()));
                for item in items {
                    size += element.out_of_line_size(item)?;
                }
                Ok(size)
            }
            (Descriptor::ArrayOf { .. }, _) => Err(CodecError::NotAnArray),
            (Descriptor::MapOf { key, value: v, .. }, Value::Map(entries)) => {
                let n = entries.len();
                let mut size = MAP_DATA_SIZE
                    + align(ARRAY_HEADER_SIZE + key.array_payload_size(n))
                    + align(ARRAY_HEADER_SIZE + v.array_payload_size(n));
                for (k, val) in entries {
                    size += key.out_of_line_size(k)? + v.out_of_line_size(val)?;
                }
                Ok(size)
            }
            (Descriptor::MapOf { .. }, _) => Err(CodecError::NotAMap),
            (Descriptor::Union { cls, .. }, _) => cls.out_of_line_size(value),
            _ => Ok(0),
        }
    }

    fn associated_endpoint_count(&self, value: &Value) -> usize {
        match (self, value) {
            (Descriptor::AssociatedInterfacePtrInfo { .. }, Value::AssociatedInterface(_))
            | (Descriptor::AssociatedInterfaceRequest { .. }, Value::AssociatedInterfaceRequest(_)) => 1,
            (Descriptor::PointerTo { cls, .. }, _) => cls.associated_endpoint_count(value),
            (Descriptor::Union { cls, .. }, _) => cls.associated_endpoint_count(value),
            (Descriptor::ArrayOf { element, .. }, Value::Array(items)) => items
                .iter()
                .map(|item| element.associated_endpoint_count(item))
                .sum(),
            (Descriptor::MapOf { key, value: v, .. }, Value::Map(entries)) => entries
                .iter()
                .map(|(k, val)| key.associated_endpoint_count(k) + v.associated_endpoint_count(val))
                .sum(),
            _ => 0,
        }
    }
}
