//! Union Classes
//!
//! ```text
//! [size:u32 = 16][tag:u32][data:8]     size 0 = null union
//! ```
//!
//! Data inline 8 byte; union di dalam union disimpan lewat pointer.

use crate::error::{CodecError, Result};

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::layout::{UNION_DATA_SIZE, UNION_HEADER_SIZE};
use super::types::{Descriptor, MojomType};
use super::value::{UnionValue, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct UnionField {
    pub name: String,
    pub ordinal: u32,
    pub descriptor: Descriptor,
}

/// Generated union class
#[derive(Clone, Debug, PartialEq)]
pub struct UnionSpec {
    name: String,
    fields: Vec<UnionField>,
}

impl UnionSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, ordinal: u32, descriptor: Descriptor) -> Self {
        self.fields.push(UnionField {
            name: name.to_string(),
            ordinal,
            descriptor,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[UnionField] {
        &self.fields
    }

    pub fn field_by_name(&self, name: &str) -> Option<&UnionField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_ordinal(&self, ordinal: u32) -> Option<&UnionField> {
        self.fields.iter().find(|f| f.ordinal == ordinal)
    }

    fn active(&self, value: &UnionValue) -> Result<&UnionField> {
        self.field_by_name(&value.field)
            .ok_or_else(|| CodecError::UnknownUnionField {
                union_name: self.name.clone(),
                field: value.field.clone(),
            })
    }
}

impl MojomType for UnionSpec {
    fn encoded_size(&self) -> usize {
        UNION_DATA_SIZE
    }

    fn encode(&self, encoder: &mut Encoder<'_>, value: &Value) -> Result<()> {
        let start = encoder.next();
        let union_value = match value {
            Value::Null => {
                encoder.write_uint32(0)?;
                encoder.write_uint32(0)?;
                return encoder.write_uint64(0);
            }
            Value::Union(u) => u,
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: "union",
                    found: other.kind_name(),
                })
            }
        };

        let field = self.active(union_value)?;
        encoder.write_uint32(UNION_DATA_SIZE as u32)?;
        encoder.write_uint32(field.ordinal)?;
        match &field.descriptor {
            Descriptor::Union { cls, .. } => encoder.encode_struct_pointer(cls.as_ref(), &union_value.value)?,
            descriptor => descriptor.encode(encoder, &union_value.value)?,
        }

        encoder.skip((start + UNION_DATA_SIZE).saturating_sub(encoder.next()));
        Ok(())
    }

    fn decode(&self, decoder: &mut Decoder<'_>) -> Result<Value> {
        let start = decoder.next();
        let size = decoder.read_uint32()?;
        let ordinal = decoder.read_uint32()?;
        if size == 0 {
            decoder.skip(UNION_DATA_SIZE - UNION_HEADER_SIZE);
            return Ok(Value::Null);
        }
        if size as usize != UNION_DATA_SIZE {
            return Err(CodecError::InvalidUnionHeader {
                name: self.name.clone(),
                size,
            });
        }
        decoder.claim_to(start + UNION_DATA_SIZE);

        let field = self
            .field_by_ordinal(ordinal)
            .ok_or_else(|| CodecError::UnknownUnionOrdinal {
                union_name: self.name.clone(),
                ordinal,
            })?;
        let value = match &field.descriptor {
            Descriptor::Union { cls, .. } => decoder.decode_struct_pointer(cls.as_ref())?,
            descriptor => descriptor.decode(decoder)?,
        };

        decoder.skip((start + UNION_DATA_SIZE).saturating_sub(decoder.next()));
        Ok(Value::Union(UnionValue {
            field: field.name.clone(),
            value: Box::new(value),
        }))
    }

    fn out_of_line_size(&self, value: &Value) -> Result<usize> {
        let union_value = match value {
            Value::Union(u) => u,
            _ => return Ok(0),
        };
        let field = self.active(union_value)?;
        match &field.descriptor {
            Descriptor::Union { cls, .. } if !union_value.value.is_null() => {
                Ok(UNION_DATA_SIZE + cls.out_of_line_size(&union_value.value)?)
            }
            descriptor => descriptor.out_of_line_size(&union_value.value),
        }
    }

    fn associated_endpoint_count(&self, value: &Value) -> usize {
        match value {
            Value::Union(u) => self
                .field_by_name(&u.field)
                .map_or(0, |f| f.descriptor.associated_endpoint_count(&u.value)),
            _ => 0,
        }
    }
}
