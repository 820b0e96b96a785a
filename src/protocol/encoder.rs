//! Encoder Cursor
//!
//! Mirror dari `Decoder`: tulis nilai berurutan di posisi `next`, dan
//! alokasi region baru (aligned) untuk field pointer. Child encoder
//! meminjam `MessageData` yang sama; posisi parent tidak berubah.

use crate::core::Buffer;
use crate::error::{CodecError, Result};

use super::layout::{align, ARRAY_HEADER_SIZE, ENCODED_INVALID_HANDLE_VALUE, MAP_DATA_SIZE};
use super::types::{Descriptor, MojomType};
use super::value::{AssociatedEndpointHandle, Handle, Value};

/// Shared state of one message under construction
///
/// Buffer dan kedua handle table dipakai bersama oleh semua cursor.
#[derive(Debug, Default)]
pub struct MessageData {
    pub buffer: Buffer,
    pub handles: Vec<Handle>,
    pub associated_endpoint_handles: Vec<AssociatedEndpointHandle>,
}

impl MessageData {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Buffer::with_capacity(capacity),
            handles: Vec::new(),
            associated_endpoint_handles: Vec::new(),
        }
    }

    /// Alokasi region aligned dan returns encoder di awal region
    pub fn create_encoder(&mut self, size: usize) -> Encoder<'_> {
        let pointer = self.buffer.alloc(align(size));
        Encoder::new(self, pointer)
    }
}

/// Write cursor over a message under construction
pub struct Encoder<'a> {
    data: &'a mut MessageData,
    base: usize,
    next: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(data: &'a mut MessageData, base: usize) -> Self {
        Self {
            data,
            base,
            next: base,
        }
    }

    #[inline(always)]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline(always)]
    pub fn next(&self) -> usize {
        self.next
    }

    #[inline(always)]
    pub fn skip(&mut self, offset: usize) {
        self.next += offset;
    }

    #[inline(always)]
    pub fn align(&mut self) {
        self.next = align(self.next);
    }

    /// Reborrowed cursor positioned `offset` bytes past `base`.
    #[inline(always)]
    pub fn at(&mut self, offset: usize) -> Encoder<'_> {
        Encoder {
            data: &mut *self.data,
            base: self.base,
            next: self.base + offset,
        }
    }

    #[inline(always)]
    fn write<const N: usize>(&mut self, bytes: [u8; N]) -> Result<()> {
        self.data.buffer.write_bytes(self.next, &bytes)?;
        self.next += N;
        Ok(())
    }

    #[inline(always)]
    pub fn write_int8(&mut self, val: i8) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_int16(&mut self, val: i16) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_int32(&mut self, val: i32) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_int64(&mut self, val: i64) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_uint8(&mut self, val: u8) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_uint16(&mut self, val: u16) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_uint32(&mut self, val: u32) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_uint64(&mut self, val: u64) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_float(&mut self, val: f32) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    #[inline(always)]
    pub fn write_double(&mut self, val: f64) -> Result<()> {
        self.write(val.to_le_bytes())
    }

    /// Set/clear bit `bit` of the byte at the cursor (cursor tidak maju).
    pub fn write_bit(&mut self, bit: u8, val: bool) -> Result<()> {
        let byte = self.data.buffer.get_u8(self.next)?;
        let byte = if val { byte | (1 << bit) } else { byte & !(1 << bit) };
        self.data.buffer.set_u8(self.next, byte)
    }

    /// Tulis offset relatif `pointer - next`; `None` = null pointer.
    pub fn encode_pointer(&mut self, pointer: Option<usize>) -> Result<()> {
        let offset = match pointer {
            None => 0,
            Some(pointer) => pointer
                .checked_sub(self.next)
                .ok_or(CodecError::PointerOverflow {
                    position: self.next,
                    offset: pointer as u64,
                })? as u64,
        };
        self.write_uint64(offset)
    }

    /// Alokasi region `align(size)`, tulis pointer ke region itu, dan
    /// returns encoder untuk region baru.
    pub fn create_and_encode_encoder(&mut self, size: usize) -> Result<Encoder<'_>> {
        let pointer = self.data.buffer.alloc(align(size));
        self.encode_pointer(Some(pointer))?;
        Ok(Encoder::new(&mut *self.data, pointer))
    }

    pub fn encode_handle(&mut self, handle: Option<Handle>) -> Result<()> {
        match handle {
            Some(handle) => {
                self.data.handles.push(handle);
                let index = (self.data.handles.len() - 1) as u32;
                self.write_uint32(index)
            }
            None => self.write_uint32(ENCODED_INVALID_HANDLE_VALUE),
        }
    }

    pub fn encode_associated_endpoint_handle(
        &mut self,
        endpoint: Option<AssociatedEndpointHandle>,
    ) -> Result<()> {
        match endpoint {
            Some(endpoint) => {
                self.data.associated_endpoint_handles.push(endpoint);
                let index = (self.data.associated_endpoint_handles.len() - 1) as u32;
                self.write_uint32(index)
            }
            None => self.write_uint32(ENCODED_INVALID_HANDLE_VALUE),
        }
    }

    /// Tulis array header + UTF-8 bytes di cursor.
    pub fn encode_string(&mut self, val: &str) -> Result<()> {
        let number_of_elements = val.len();
        self.write_uint32(array_len(ARRAY_HEADER_SIZE + number_of_elements)?)?;
        self.write_uint32(array_len(number_of_elements)?)?;
        self.data.buffer.write_bytes(self.next, val.as_bytes())?;
        self.next += number_of_elements;
        Ok(())
    }

    /// Tulis array header lalu elemen-elemen.
    ///
    /// `number_of_elements`/`encoded_size` default ke nilai yang dihitung
    /// dari `val` dan descriptor elemen.
    pub fn encode_array(
        &mut self,
        element: &Descriptor,
        val: &[Value],
        number_of_elements: Option<usize>,
        encoded_size: Option<usize>,
    ) -> Result<()> {
        let number_of_elements = number_of_elements.unwrap_or(val.len());
        let encoded_size = encoded_size
            .unwrap_or(ARRAY_HEADER_SIZE + element.array_payload_size(number_of_elements));
        self.write_uint32(array_len(encoded_size)?)?;
        self.write_uint32(array_len(number_of_elements)?)?;

        if element.is_packed_bool() {
            let mut byte = 0u8;
            for i in 0..number_of_elements {
                if truthy(val.get(i))? {
                    byte |= 1 << (i % 8);
                }
                if i % 8 == 7 || i == number_of_elements - 1 {
                    self.write_uint8(byte)?;
                    byte = 0;
                }
            }
        } else {
            for i in 0..number_of_elements {
                element.encode(self, val.get(i).unwrap_or(&Value::Null))?;
            }
        }
        Ok(())
    }

    pub fn encode_struct<T: MojomType + ?Sized>(&mut self, cls: &T, val: &Value) -> Result<()> {
        cls.encode(self, val)
    }

    pub fn encode_struct_pointer<T: MojomType + ?Sized>(&mut self, cls: &T, val: &Value) -> Result<()> {
        if val.is_null() {
            return self.encode_pointer(None);
        }
        let mut encoder = self.create_and_encode_encoder(cls.encoded_size())?;
        cls.encode(&mut encoder, val)
    }

    pub fn encode_array_pointer(
        &mut self,
        element: &Descriptor,
        val: &Value,
        length: Option<usize>,
    ) -> Result<()> {
        let items = match val {
            Value::Null => return self.encode_pointer(None),
            Value::Array(items) => items,
            _ => return Err(CodecError::NotAnArray),
        };
        if let Some(expected) = length {
            if expected != items.len() {
                return Err(CodecError::ArrayLengthMismatch {
                    expected,
                    found: items.len(),
                });
            }
        }

        let number_of_elements = items.len();
        let encoded_size = ARRAY_HEADER_SIZE + element.array_payload_size(number_of_elements);
        let mut encoder = self.create_and_encode_encoder(encoded_size)?;
        encoder.encode_array(element, items, Some(number_of_elements), Some(encoded_size))
    }

    pub fn encode_string_pointer(&mut self, val: &Value) -> Result<()> {
        let s = match val {
            Value::Null => return self.encode_pointer(None),
            Value::String(s) => s,
            _ => return Err(CodecError::NotAString),
        };
        let mut encoder = self.create_and_encode_encoder(ARRAY_HEADER_SIZE + s.len())?;
        encoder.encode_string(s)
    }

    /// Struct header `{24, 0}` lalu pointer ke array keys dan values.
    pub fn encode_map(
        &mut self,
        key: &Descriptor,
        value: &Descriptor,
        entries: &[(Value, Value)],
    ) -> Result<()> {
        let (keys, values): (Vec<Value>, Vec<Value>) = entries.iter().cloned().unzip();
        self.write_uint32(MAP_DATA_SIZE as u32)?;
        self.write_uint32(0)?;
        self.encode_array_pointer(key, &Value::Array(keys), None)?;
        self.encode_array_pointer(value, &Value::Array(values), None)
    }

    pub fn encode_map_pointer(
        &mut self,
        key: &Descriptor,
        value: &Descriptor,
        val: &Value,
    ) -> Result<()> {
        let entries = match val {
            Value::Null => return self.encode_pointer(None),
            Value::Map(entries) => entries,
            _ => return Err(CodecError::NotAMap),
        };
        let mut encoder = self.create_and_encode_encoder(MAP_DATA_SIZE)?;
        encoder.encode_map(key, value, entries)
    }
}

/// Array header fields are u32 on the wire.
fn array_len(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| CodecError::OutOfRange {
        field: "array length",
        value: n.to_string(),
    })
}

/// Element truthiness for packed bool arrays; missing = false.
fn truthy(val: Option<&Value>) -> Result<bool> {
    match val {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(CodecError::TypeMismatch {
            expected: "bool",
            found: other.kind_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decoder::Decoder;

    #[test]
    fn test_pointer_relative_offset() {
        let mut data = MessageData::default();
        {
            let mut enc = data.create_encoder(16);
            enc.skip(8);
            let mut child = enc.create_and_encode_encoder(4).unwrap();
            child.write_uint32(7).unwrap();
            assert_eq!(child.base(), 16);
        }

        // pointer field at 8, region at 16
        assert_eq!(data.buffer.get_u64(8).unwrap(), 8);
        assert_eq!(data.buffer.get_u32(16).unwrap(), 7);
        assert_eq!(data.buffer.len(), 24);
    }

    #[test]
    fn test_null_pointer_writes_zero() {
        let mut data = MessageData::default();
        data.buffer.alloc(8);
        data.buffer.set_u64(0, u64::MAX).unwrap();

        Encoder::new(&mut data, 0).encode_pointer(None).unwrap();
        assert_eq!(data.buffer.get_u64(0).unwrap(), 0);
    }

    #[test]
    fn test_signed_roundtrip() {
        let mut data = MessageData::default();
        {
            let mut enc = data.create_encoder(8);
            enc.write_int8(-1).unwrap();
            enc.skip(3);
            enc.write_int32(-1).unwrap();
        }

        let mut dec = Decoder::new(data.buffer.as_bytes(), &[], &[], 0);
        assert_eq!(dec.read_int8().unwrap(), -1);
        dec.skip(3);
        assert_eq!(dec.read_int32().unwrap(), -1);
    }

    #[test]
    fn test_handles_are_appended() {
        let mut data = MessageData::default();
        {
            let mut enc = data.create_encoder(12);
            enc.encode_handle(Some(Handle(100))).unwrap();
            enc.encode_handle(None).unwrap();
            enc.encode_handle(Some(Handle(200))).unwrap();
        }

        assert_eq!(data.handles, vec![Handle(100), Handle(200)]);
        assert_eq!(data.buffer.get_u32(0).unwrap(), 0);
        assert_eq!(data.buffer.get_u32(4).unwrap(), ENCODED_INVALID_HANDLE_VALUE);
        assert_eq!(data.buffer.get_u32(8).unwrap(), 1);
    }

    #[test]
    fn test_write_bit_preserves_neighbours() {
        let mut data = MessageData::default();
        let mut enc = data.create_encoder(8);
        enc.write_bit(0, true).unwrap();
        enc.write_bit(3, true).unwrap();
        enc.write_bit(0, false).unwrap();

        assert_eq!(data.buffer.get_u8(0).unwrap(), 0b1000);
    }

    #[test]
    fn test_type_guards() {
        let mut data = MessageData::default();
        let mut enc = data.create_encoder(8);

        assert!(matches!(
            enc.encode_array_pointer(&Descriptor::Int32, &Value::from("no"), None),
            Err(CodecError::NotAnArray)
        ));
        assert!(matches!(
            enc.encode_string_pointer(&Value::Uint(1)),
            Err(CodecError::NotAString)
        ));
        assert!(matches!(
            enc.encode_map_pointer(&Descriptor::Int32, &Descriptor::Int32, &Value::Array(vec![])),
            Err(CodecError::NotAMap)
        ));
    }

    #[test]
    fn test_array_length_over_u32_rejected() {
        let too_many = u32::MAX as usize + 1;
        let mut data = MessageData::default();
        let mut enc = data.create_encoder(8);

        let err = enc
            .encode_array(&Descriptor::Uint8, &[], Some(too_many), Some(8))
            .unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { field: "array length", .. }));

        let err = enc
            .at(0)
            .encode_array(&Descriptor::Uint8, &[], Some(1), Some(too_many))
            .unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { .. }));
    }

    #[test]
    fn test_packed_bool_partial_byte() {
        let bits = vec![true, false, true, true, false, false, false, false, true, true];
        let mut data = MessageData::default();
        {
            let mut enc = data.create_encoder(8);
            enc.encode_array_pointer(&Descriptor::PackedBool, &Value::from(bits.clone()), None)
                .unwrap();
        }

        // header 8 + ceil(10/8) = 10 bytes
        assert_eq!(data.buffer.get_u32(8).unwrap(), 10);
        assert_eq!(data.buffer.get_u32(12).unwrap(), 10);
        assert_eq!(data.buffer.get_u8(16).unwrap(), 0b0000_1101);
        assert_eq!(data.buffer.get_u8(17).unwrap(), 0b0000_0011);

        let mut dec = Decoder::new(data.buffer.as_bytes(), &[], &[], 0);
        let decoded = dec.decode_array_pointer(&Descriptor::PackedBool, None).unwrap();
        assert_eq!(decoded, Value::from(bits));
    }
}
