//! Struct Classes
//!
//! Layout mengikuti aturan packing mojom: field ditempatkan (urut ordinal)
//! di celah pertama yang muat dengan alignment natural, bool berurutan
//! berbagi satu byte (1 bit per field). Setiap versi punya `packed_size`
//! sendiri; decoder menerima versi lebih lama atau lebih baru.
//!
//! ```text
//! [numberOfBytes:u32][version:u32][field bytes ...][pad ke kelipatan 8]
//! ```

use crate::core::buffer::slice_at;
use crate::error::{CodecError, Result};

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::layout::{align, align_to, STRUCT_HEADER_SIZE};
use super::types::{Descriptor, MojomType};
use super::value::{StructValue, Value};

/// One packed field
#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ordinal: u32,
    pub descriptor: Descriptor,
    /// Byte offset setelah struct header
    pub offset: usize,
    /// Bit index untuk bool; 0 untuk field lain
    pub bit: u8,
    pub min_version: u32,
    pub default: Option<Value>,
}

impl StructField {
    #[inline(always)]
    fn size(&self) -> usize {
        self.descriptor.encoded_size()
    }

    /// Value used when the field is absent from the input or from an
    /// older encoded version.
    fn default_value(&self) -> Value {
        if let Some(default) = &self.default {
            return default.clone();
        }
        match &self.descriptor {
            Descriptor::PackedBool => Value::Bool(false),
            Descriptor::Int8
            | Descriptor::Int16
            | Descriptor::Int32
            | Descriptor::Int64
            | Descriptor::Enum(_) => Value::Int(0),
            Descriptor::Uint8 | Descriptor::Uint16 | Descriptor::Uint32 | Descriptor::Uint64 => {
                Value::Uint(0)
            }
            Descriptor::Float => Value::F32(0.0),
            Descriptor::Double => Value::F64(0.0),
            _ => Value::Null,
        }
    }
}

/// Size of the struct as written by one version
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructVersion {
    pub version: u32,
    pub packed_size: usize,
}

/// Generated struct class
#[derive(Clone, Debug, PartialEq)]
pub struct StructSpec {
    name: String,
    /// Urut offset (urutan encode di wire)
    fields: Vec<StructField>,
    /// Ascending, selalu berisi version 0
    versions: Vec<StructVersion>,
}

impl StructSpec {
    pub fn builder(name: &str) -> StructSpecBuilder {
        StructSpecBuilder {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn versions(&self) -> &[StructVersion] {
        &self.versions
    }

    fn latest(&self) -> StructVersion {
        self.versions.last().copied().unwrap_or(StructVersion {
            version: 0,
            packed_size: STRUCT_HEADER_SIZE,
        })
    }

    /// Latest version written by `encode`.
    #[inline(always)]
    pub fn version(&self) -> u32 {
        self.latest().version
    }

    /// Header + fields of the latest version, aligned to 8.
    #[inline(always)]
    pub fn packed_size(&self) -> usize {
        self.latest().packed_size
    }

    /// Versi yang dikenal harus cocok persis; versi lebih baru minimal
    /// sebesar versi terbaru yang dikenal.
    pub fn is_header_valid(&self, size: u32, version: u32) -> bool {
        let size = size as usize;
        match self.versions.iter().rev().find(|v| v.version <= version) {
            Some(known) if known.version == version => size == known.packed_size,
            Some(known) => size >= known.packed_size,
            None => false,
        }
    }

    /// Bytes of the struct region plus everything it points to; 0 for null.
    pub fn region_size(&self, value: &Value) -> Result<usize> {
        if value.is_null() {
            return Ok(0);
        }
        Ok(align(self.packed_size()) + self.out_of_line_size(value)?)
    }

    fn struct_value<'v>(&self, value: &'v Value) -> Result<&'v StructValue> {
        value.as_struct().ok_or(CodecError::TypeMismatch {
            expected: "struct",
            found: value.kind_name(),
        })
    }

    fn field_value<'v>(field: &StructField, fields: &'v StructValue) -> std::borrow::Cow<'v, Value> {
        match fields.get(&field.name) {
            Some(v) => std::borrow::Cow::Borrowed(v),
            None => std::borrow::Cow::Owned(field.default_value()),
        }
    }
}

impl MojomType for StructSpec {
    fn encoded_size(&self) -> usize {
        self.packed_size()
    }

    fn encode(&self, encoder: &mut Encoder<'_>, value: &Value) -> Result<()> {
        let fields = self.struct_value(value)?;
        let start = encoder.next() - encoder.base();
        let packed_size = self.packed_size();

        encoder.write_uint32(packed_size as u32)?;
        encoder.write_uint32(self.version())?;

        for field in &self.fields {
            let v = Self::field_value(field, fields);
            let mut cursor = encoder.at(start + STRUCT_HEADER_SIZE + field.offset);
            if field.descriptor.is_packed_bool() {
                let bit = match &*v {
                    Value::Bool(b) => *b,
                    other => {
                        return Err(CodecError::TypeMismatch {
                            expected: "bool",
                            found: other.kind_name(),
                        })
                    }
                };
                cursor.write_bit(field.bit, bit)?;
            } else {
                field.descriptor.encode(&mut cursor, &v)?;
            }
        }

        encoder.skip(packed_size - STRUCT_HEADER_SIZE);
        Ok(())
    }

    fn decode(&self, decoder: &mut Decoder<'_>) -> Result<Value> {
        let start = decoder.next();
        let size = decoder.read_uint32()?;
        let version = decoder.read_uint32()?;
        if !self.is_header_valid(size, version) {
            return Err(CodecError::InvalidStructHeader {
                name: self.name.clone(),
                size,
                version,
            });
        }
        slice_at(decoder.bytes(), start, size as usize)?;
        decoder.claim_to(start + size as usize);

        let rel = start - decoder.base();
        let mut out = StructValue::new();
        for field in &self.fields {
            let v = if field.min_version > version {
                field.default_value()
            } else {
                let mut cursor = decoder.at(rel + STRUCT_HEADER_SIZE + field.offset);
                if field.descriptor.is_packed_bool() {
                    Value::Bool(cursor.read_bit(field.bit)?)
                } else {
                    field.descriptor.decode(&mut cursor)?
                }
            };
            out.set(&field.name, v);
        }

        decoder.skip(size as usize - STRUCT_HEADER_SIZE);
        Ok(Value::Struct(out))
    }

    fn out_of_line_size(&self, value: &Value) -> Result<usize> {
        let fields = self.struct_value(value)?;
        let mut size = 0;
        for field in &self.fields {
            size += field
                .descriptor
                .out_of_line_size(&Self::field_value(field, fields))?;
        }
        Ok(size)
    }

    fn associated_endpoint_count(&self, value: &Value) -> usize {
        let Some(fields) = value.as_struct() else {
            return 0;
        };
        self.fields
            .iter()
            .map(|f| {
                f.descriptor
                    .associated_endpoint_count(&Self::field_value(f, fields))
            })
            .sum()
    }
}

struct PendingField {
    name: String,
    descriptor: Descriptor,
    min_version: u32,
    default: Option<Value>,
}

/// Declares fields in ordinal order, then computes the packed layout.
pub struct StructSpecBuilder {
    name: String,
    fields: Vec<PendingField>,
}

impl StructSpecBuilder {
    pub fn field(self, name: &str, descriptor: Descriptor) -> Self {
        self.versioned_field(name, descriptor, 0)
    }

    /// Field added in struct version `min_version`
    pub fn versioned_field(mut self, name: &str, descriptor: Descriptor, min_version: u32) -> Self {
        self.fields.push(PendingField {
            name: name.to_string(),
            descriptor,
            min_version,
            default: None,
        });
        self
    }

    /// Default for the most recently declared field.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.default = Some(value.into());
        }
        self
    }

    pub fn build(self) -> StructSpec {
        let mut packed: Vec<StructField> = Vec::with_capacity(self.fields.len());

        for (ordinal, pending) in self.fields.into_iter().enumerate() {
            let mut field = StructField {
                name: pending.name,
                ordinal: ordinal as u32,
                descriptor: pending.descriptor,
                offset: 0,
                bit: 0,
                min_version: pending.min_version,
                default: pending.default,
            };
            if packed.is_empty() {
                packed.push(field);
                continue;
            }

            // Celah pertama setelah field i yang muat sebelum field i+1
            let mut slot = packed.len();
            for i in 0..packed.len() {
                let (offset, bit) = next_offset(&field, &packed[i]);
                let fits = match packed.get(i + 1) {
                    None => true,
                    Some(next) => offset + field.size() <= next.offset,
                };
                if fits {
                    field.offset = offset;
                    field.bit = bit;
                    slot = i + 1;
                    break;
                }
            }
            packed.insert(slot, field);
        }

        let mut version_numbers: Vec<u32> = packed.iter().map(|f| f.min_version).collect();
        version_numbers.push(0);
        version_numbers.sort_unstable();
        version_numbers.dedup();

        let versions = version_numbers
            .into_iter()
            .map(|version| {
                let end = packed
                    .iter()
                    .filter(|f| f.min_version <= version)
                    .map(|f| f.offset + f.size())
                    .max()
                    .unwrap_or(0);
                StructVersion {
                    version,
                    packed_size: STRUCT_HEADER_SIZE + align(end),
                }
            })
            .collect();

        StructSpec {
            name: self.name,
            fields: packed,
            versions,
        }
    }
}

/// Posisi pertama yang valid tepat setelah `last`.
fn next_offset(field: &StructField, last: &StructField) -> (usize, u8) {
    if field.descriptor.is_packed_bool() && last.descriptor.is_packed_bool() && last.bit < 7 {
        return (last.offset, last.bit + 1);
    }
    let offset = last.offset + last.size();
    (align_to(offset, field.descriptor.alignment()), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder::MessageData;
    use std::sync::Arc;

    fn offsets(spec: &StructSpec) -> Vec<(&str, usize, u8)> {
        spec.fields()
            .iter()
            .map(|f| (f.name.as_str(), f.offset, f.bit))
            .collect()
    }

    fn encode(spec: &StructSpec, value: &Value) -> MessageData {
        let mut data = MessageData::default();
        let mut enc = data.create_encoder(spec.encoded_size());
        spec.encode(&mut enc, value).unwrap();
        data
    }

    fn decode(spec: &StructSpec, data: &MessageData) -> Result<Value> {
        let mut dec = Decoder::new(
            data.buffer.as_bytes(),
            &data.handles,
            &data.associated_endpoint_handles,
            0,
        );
        spec.decode(&mut dec)
    }

    #[test]
    fn test_packing_fills_gaps() {
        let spec = StructSpec::builder("Gaps")
            .field("a", Descriptor::Int8)
            .field("b", Descriptor::Int32)
            .field("c", Descriptor::Int8)
            .build();

        let layout = offsets(&spec);
        assert!(layout.contains(&("a", 0, 0)));
        assert!(layout.contains(&("c", 1, 0)));
        assert!(layout.contains(&("b", 4, 0)));
        assert_eq!(spec.packed_size(), 16);
    }

    #[test]
    fn test_bools_share_a_byte() {
        let spec = StructSpec::builder("Flags")
            .field("a", Descriptor::PackedBool)
            .field("b", Descriptor::PackedBool)
            .field("c", Descriptor::Int32)
            .field("d", Descriptor::PackedBool)
            .build();

        let layout = offsets(&spec);
        assert!(layout.contains(&("a", 0, 0)));
        assert!(layout.contains(&("b", 0, 1)));
        assert!(layout.contains(&("d", 0, 2)));
        assert!(layout.contains(&("c", 4, 0)));
        assert_eq!(spec.packed_size(), 16);
    }

    #[test]
    fn test_empty_struct_is_header_only() {
        let spec = StructSpec::builder("Empty").build();
        assert_eq!(spec.packed_size(), 8);
        assert_eq!(spec.version(), 0);

        let data = encode(&spec, &Value::Struct(StructValue::new()));
        assert_eq!(data.buffer.as_bytes(), &[8, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_versions_and_sizes() {
        let spec = StructSpec::builder("Versioned")
            .field("a", Descriptor::Int32)
            .versioned_field("b", Descriptor::Int64, 1)
            .build();

        assert_eq!(
            spec.versions(),
            &[
                StructVersion {
                    version: 0,
                    packed_size: 16
                },
                StructVersion {
                    version: 1,
                    packed_size: 24
                },
            ]
        );
        assert!(spec.is_header_valid(16, 0));
        assert!(spec.is_header_valid(24, 1));
        assert!(spec.is_header_valid(32, 2));
        assert!(!spec.is_header_valid(24, 0));
        assert!(!spec.is_header_valid(16, 1));
        assert!(!spec.is_header_valid(16, 2));
    }

    #[test]
    fn test_older_reader_and_older_writer() {
        let v0 = StructSpec::builder("S").field("a", Descriptor::Int32).build();
        let v1 = StructSpec::builder("S")
            .field("a", Descriptor::Int32)
            .versioned_field("b", Descriptor::Int64, 1)
            .with_default(-7i64)
            .build();

        // newer writer, older reader
        let data = encode(&v1, &StructValue::new().with("a", 5i32).with("b", 9i64).into());
        let decoded = decode(&v0, &data).unwrap();
        assert_eq!(decoded, StructValue::new().with("a", 5i32).into());

        // older writer, newer reader: b takes its default
        let data = encode(&v0, &StructValue::new().with("a", 5i32).into());
        let decoded = decode(&v1, &data).unwrap();
        assert_eq!(
            decoded,
            StructValue::new().with("a", 5i32).with("b", -7i64).into()
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let spec = StructSpec::builder("Defaults")
            .field("count", Descriptor::Uint32)
            .field("name", Descriptor::nullable_string())
            .field("flag", Descriptor::PackedBool)
            .with_default(true)
            .build();

        let data = encode(&spec, &Value::Struct(StructValue::new()));
        let decoded = decode(&spec, &data).unwrap();
        let decoded = decoded.as_struct().unwrap();

        assert_eq!(decoded.get("count"), Some(&Value::Uint(0)));
        assert_eq!(decoded.get("name"), Some(&Value::Null));
        assert_eq!(decoded.get("flag"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let spec = StructSpec::builder("S").field("a", Descriptor::Int32).build();
        let mut data = encode(&spec, &StructValue::new().with("a", 1i32).into());
        data.buffer.set_u32(0, 12).unwrap();

        assert!(matches!(
            decode(&spec, &data),
            Err(CodecError::InvalidStructHeader { size: 12, .. })
        ));
    }

    #[test]
    fn test_truncated_region_rejected() {
        let spec = StructSpec::builder("S").field("a", Descriptor::Int32).build();
        let mut data = encode(&spec, &StructValue::new().with("a", 1i32).into());
        // claim a newer version that is larger than the buffer
        data.buffer.set_u32(0, 64).unwrap();
        data.buffer.set_u32(4, 3).unwrap();

        assert!(matches!(
            decode(&spec, &data),
            Err(CodecError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_nested_struct_pointer() {
        let inner = Arc::new(
            StructSpec::builder("Inner")
                .field("label", Descriptor::string())
                .build(),
        );
        let outer = StructSpec::builder("Outer")
            .field("id", Descriptor::Uint64)
            .field("inner", Descriptor::nullable_pointer_to(inner))
            .build();

        let value: Value = StructValue::new()
            .with("id", 1u64)
            .with("inner", StructValue::new().with("label", "ok"))
            .into();
        let data = encode(&outer, &value);
        assert_eq!(data.buffer.len(), outer.region_size(&value).unwrap());
        assert_eq!(decode(&outer, &data).unwrap(), value);

        let value: Value = StructValue::new()
            .with("id", 2u64)
            .with("inner", Value::Null)
            .into();
        let data = encode(&outer, &value);
        assert_eq!(decode(&outer, &data).unwrap(), value);
    }

    #[test]
    fn test_non_struct_value_rejected() {
        let spec = StructSpec::builder("S").build();
        let mut data = MessageData::default();
        let mut enc = data.create_encoder(spec.encoded_size());
        assert!(matches!(
            spec.encode(&mut enc, &Value::Uint(3)),
            Err(CodecError::TypeMismatch {
                expected: "struct",
                ..
            })
        ));
    }
}
