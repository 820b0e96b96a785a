//! Bounds-Checked Decoder Cursor
//!
//! Decoder adalah view `Copy` di atas satu flat buffer. Setiap pointer
//! melahirkan decoder baru (`decode_and_create_decoder`) dengan posisi
//! sendiri; posisi parent tidak berubah.
//!
//! Semua decoder turunan berbagi satu watermark `claimed`: region
//! out-of-line harus mulai di atau setelah watermark, jadi dua pointer ke
//! region yang sama ditolak dan total kerja decode linear terhadap input.

use std::cell::Cell;
use std::rc::Rc;

use crate::core::buffer::{read_bytes, slice_at};
use crate::error::{CodecError, Result};

use super::layout::{
    align, ALIGNMENT, ARRAY_HEADER_SIZE, MAP_DATA_SIZE, MAX_RECURSION_DEPTH, STRUCT_HEADER_SIZE,
};
use super::types::{Descriptor, MojomType};
use super::value::{insert_entry, AssociatedEndpointHandle, Handle, Value};

/// Read cursor over a serialized message
#[derive(Clone, Debug)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    claimed: Rc<Cell<usize>>,
    handles: &'a [Handle],
    associated_endpoint_handles: &'a [AssociatedEndpointHandle],
    base: usize,
    next: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    /// Membuat decoder di posisi `base`
    pub fn new(
        bytes: &'a [u8],
        handles: &'a [Handle],
        associated_endpoint_handles: &'a [AssociatedEndpointHandle],
        base: usize,
    ) -> Self {
        Self {
            bytes,
            claimed: Rc::new(Cell::new(0)),
            handles,
            associated_endpoint_handles,
            base,
            next: base,
            depth: 0,
        }
    }

    /// Start of the current region.
    #[inline(always)]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Current read position.
    #[inline(always)]
    pub fn next(&self) -> usize {
        self.next
    }

    #[inline(always)]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// First offset a new out-of-line region may start at.
    #[inline(always)]
    pub fn claimed(&self) -> usize {
        self.claimed.get()
    }

    /// Tandai `[.., end)` sudah dipakai region yang sedang di-decode.
    #[inline(always)]
    pub fn claim_to(&self, end: usize) {
        if end > self.claimed.get() {
            self.claimed.set(end);
        }
    }

    #[inline(always)]
    pub fn skip(&mut self, offset: usize) {
        self.next += offset;
    }

    /// Maju ke kelipatan 8 berikutnya
    #[inline(always)]
    pub fn align(&mut self) {
        self.next = align(self.next);
    }

    /// Cursor copy positioned `offset` bytes past `base`.
    #[inline(always)]
    pub fn at(&self, offset: usize) -> Decoder<'a> {
        Decoder {
            next: self.base + offset,
            ..self.clone()
        }
    }

    #[inline(always)]
    fn read<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = read_bytes::<N>(self.bytes, self.next)?;
        self.next += N;
        Ok(bytes)
    }

    #[inline(always)]
    pub fn read_int8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_int16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_int32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_int64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_uint8(&mut self) -> Result<u8> {
        Ok(u8::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_uint16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_uint32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_uint64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read()?))
    }

    #[inline(always)]
    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read()?))
    }

    /// Bit `bit` dari byte di posisi sekarang (tidak memajukan cursor)
    #[inline(always)]
    pub fn read_bit(&self, bit: u8) -> Result<bool> {
        let byte = read_bytes::<1>(self.bytes, self.next)?[0];
        Ok(byte & (1 << bit) != 0)
    }

    /// Returns absolute position of the target, or `None` for null.
    ///
    /// Offset relatif terhadap alamat field pointer, bukan `base`.
    pub fn decode_pointer(&mut self) -> Result<Option<usize>> {
        let offset_pointer = self.next;
        let offset = self.read_uint64()?;
        if offset == 0 {
            return Ok(None);
        }

        let target = usize::try_from(offset)
            .ok()
            .and_then(|o| offset_pointer.checked_add(o))
            .ok_or(CodecError::PointerOverflow {
                position: offset_pointer,
                offset,
            })?;
        if target % ALIGNMENT != 0 {
            return Err(CodecError::MisalignedPointer(target));
        }
        Ok(Some(target))
    }

    /// Child decoder scoped to the region at `pointer`.
    ///
    /// Region harus mulai di atau setelah watermark; header 8 byte-nya
    /// langsung di-claim.
    pub fn decode_and_create_decoder(&self, pointer: usize) -> Result<Decoder<'a>> {
        let depth = self.depth + 1;
        if depth > MAX_RECURSION_DEPTH {
            return Err(CodecError::RecursionTooDeep);
        }
        let claimed = self.claimed.get();
        if pointer < claimed {
            return Err(CodecError::OverlappingPointer {
                target: pointer,
                claimed,
            });
        }
        self.claim_to(pointer.saturating_add(STRUCT_HEADER_SIZE));
        Ok(Decoder {
            base: pointer,
            next: pointer,
            depth,
            ..self.clone()
        })
    }

    /// Index ke handle table; index di luar range (termasuk sentinel) = `None`.
    pub fn decode_handle(&mut self) -> Result<Option<Handle>> {
        let index = self.read_uint32()? as usize;
        Ok(self.handles.get(index).copied())
    }

    pub fn decode_associated_endpoint_handle(&mut self) -> Result<Option<AssociatedEndpointHandle>> {
        let index = self.read_uint32()? as usize;
        Ok(self
            .associated_endpoint_handles
            .get(index)
            .copied()
            .filter(AssociatedEndpointHandle::is_valid))
    }

    pub fn decode_string(&mut self) -> Result<String> {
        let start = self.next;
        let number_of_bytes = self.read_uint32()? as usize;
        let number_of_elements = self.read_uint32()? as usize;
        let raw = slice_at(self.bytes, self.next, number_of_elements)?;
        let end = number_of_bytes.max(ARRAY_HEADER_SIZE + number_of_elements);
        self.claim_to(start.saturating_add(end));
        let s = std::str::from_utf8(raw)?.to_string();
        self.next += number_of_elements;
        Ok(s)
    }

    /// Decode array region at the cursor; `element` is the element descriptor.
    pub fn decode_array(&mut self, element: &Descriptor, length: Option<usize>) -> Result<Vec<Value>> {
        let start = self.next;
        let number_of_bytes = self.read_uint32()? as usize;
        let number_of_elements = self.read_uint32()? as usize;

        if let Some(expected) = length {
            if expected != number_of_elements {
                return Err(CodecError::ArrayLengthMismatch {
                    expected,
                    found: number_of_elements,
                });
            }
        }

        // Header harus konsisten dengan payload sebelum alokasi Vec
        let payload = number_of_bytes.saturating_sub(ARRAY_HEADER_SIZE);
        let needed = element.array_payload_size(number_of_elements);
        if number_of_bytes < ARRAY_HEADER_SIZE || payload < needed {
            return Err(CodecError::OutOfBounds {
                offset: self.next,
                len: needed,
                size: payload,
            });
        }
        slice_at(self.bytes, self.next, needed)?;
        self.claim_to(start.saturating_add(number_of_bytes));

        let mut values = Vec::with_capacity(number_of_elements);
        if element.is_packed_bool() {
            let mut byte = 0u8;
            for i in 0..number_of_elements {
                if i % 8 == 0 {
                    byte = self.read_uint8()?;
                }
                values.push(Value::Bool(byte & (1 << (i % 8)) != 0));
            }
        } else {
            for _ in 0..number_of_elements {
                values.push(element.decode(self)?);
            }
        }
        Ok(values)
    }

    /// Decode a struct region at the cursor.
    pub fn decode_struct<T: MojomType + ?Sized>(&mut self, cls: &T) -> Result<Value> {
        cls.decode(self)
    }

    pub fn decode_struct_pointer<T: MojomType + ?Sized>(&mut self, cls: &T) -> Result<Value> {
        match self.decode_pointer()? {
            None => Ok(Value::Null),
            Some(pointer) => cls.decode(&mut self.decode_and_create_decoder(pointer)?),
        }
    }

    pub fn decode_array_pointer(&mut self, element: &Descriptor, length: Option<usize>) -> Result<Value> {
        match self.decode_pointer()? {
            None => Ok(Value::Null),
            Some(pointer) => {
                let mut decoder = self.decode_and_create_decoder(pointer)?;
                Ok(Value::Array(decoder.decode_array(element, length)?))
            }
        }
    }

    pub fn decode_string_pointer(&mut self) -> Result<Value> {
        match self.decode_pointer()? {
            None => Ok(Value::Null),
            Some(pointer) => {
                let mut decoder = self.decode_and_create_decoder(pointer)?;
                Ok(Value::String(decoder.decode_string()?))
            }
        }
    }

    /// Decode a map region: struct header, then keys/values array pointers.
    pub fn decode_map(&mut self, key: &Descriptor, value: &Descriptor) -> Result<Value> {
        let size = self.read_uint32()? as usize;
        let version = self.read_uint32()?;
        if size != MAP_DATA_SIZE || version != 0 {
            return Err(CodecError::InvalidMapData);
        }
        debug_assert_eq!(self.next - self.base, STRUCT_HEADER_SIZE);
        self.claim_to(self.base + MAP_DATA_SIZE);

        let keys = self.decode_array_pointer(key, None)?;
        let values = self.decode_array_pointer(value, None)?;
        let (keys, values) = match (keys, values) {
            (Value::Array(k), Value::Array(v)) if k.len() == v.len() => (k, v),
            _ => return Err(CodecError::InvalidMapData),
        };

        let mut entries = Vec::with_capacity(keys.len());
        for (k, v) in keys.into_iter().zip(values) {
            insert_entry(&mut entries, k, v);
        }
        Ok(Value::Map(entries))
    }

    pub fn decode_map_pointer(&mut self, key: &Descriptor, value: &Descriptor) -> Result<Value> {
        match self.decode_pointer()? {
            None => Ok(Value::Null),
            Some(pointer) => self
                .decode_and_create_decoder(pointer)?
                .decode_map(key, value),
        }
    }
}
