//! Growable Byte Arena untuk satu message
//!
//! Semua region (header, struct, array, map) dialokasikan berurutan di
//! satu `Vec<u8>`. Alokasi tidak pernah memindahkan region lain, jadi
//! offset yang sudah dibagikan tetap valid.
//!
//! Wire format selalu little-endian. Semua akses bounds-checked.

use crate::error::{CodecError, Result};

/// Copy `N` bytes starting at `offset`, or fail with `OutOfBounds`.
#[inline(always)]
pub fn read_bytes<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = offset.checked_add(N).ok_or(CodecError::OutOfBounds {
        offset,
        len: N,
        size: bytes.len(),
    })?;
    match bytes.get(offset..end) {
        Some(slice) => {
            let mut out = [0u8; N];
            out.copy_from_slice(slice);
            Ok(out)
        }
        None => Err(CodecError::OutOfBounds {
            offset,
            len: N,
            size: bytes.len(),
        }),
    }
}

/// Borrow `len` bytes starting at `offset`, or fail with `OutOfBounds`.
#[inline(always)]
pub fn slice_at(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(CodecError::OutOfBounds {
            offset,
            len,
            size: bytes.len(),
        })
}

/// Growable message buffer
///
/// `len()` adalah posisi alokasi berikutnya; kapasitas ekstra hanya
/// reservasi dan dibuang oleh `trim()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    /// Membuat buffer kosong
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Membuat buffer kosong dengan reservasi kapasitas
    ///
    /// Reservasi hanya estimasi; buffer tetap tumbuh kalau perlu.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Wrap bytes yang sudah di-encode (sisi penerima)
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Alokasi `size` bytes (zero-filled), returns offset awal region.
    ///
    /// Caller bertanggung jawab atas alignment `size`.
    #[inline(always)]
    pub fn alloc(&mut self, size: usize) -> usize {
        let offset = self.bytes.len();
        self.bytes.resize(offset + size, 0);
        offset
    }

    /// Buang kapasitas yang tidak terpakai
    pub fn trim(&mut self) {
        self.bytes.shrink_to_fit();
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    /// Tulis `src` mulai dari `offset` (harus sudah dialokasikan)
    #[inline(always)]
    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        let size = self.bytes.len();
        let dst = offset
            .checked_add(src.len())
            .and_then(|end| self.bytes.get_mut(offset..end))
            .ok_or(CodecError::OutOfBounds {
                offset,
                len: src.len(),
                size,
            })?;
        dst.copy_from_slice(src);
        Ok(())
    }

    #[inline(always)]
    pub fn get_u8(&self, offset: usize) -> Result<u8> {
        Ok(read_bytes::<1>(&self.bytes, offset)?[0])
    }

    #[inline(always)]
    pub fn set_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.write_bytes(offset, &[value])
    }

    #[inline(always)]
    pub fn get_u32(&self, offset: usize) -> Result<u32> {
        Ok(u32::from_le_bytes(read_bytes(&self.bytes, offset)?))
    }

    #[inline(always)]
    pub fn set_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    #[inline(always)]
    pub fn get_u64(&self, offset: usize) -> Result<u64> {
        Ok(u64::from_le_bytes(read_bytes(&self.bytes, offset)?))
    }

    #[inline(always)]
    pub fn set_u64(&mut self, offset: usize, value: u64) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_sequential_and_zeroed() {
        let mut buf = Buffer::with_capacity(64);

        assert_eq!(buf.alloc(24), 0);
        assert_eq!(buf.alloc(16), 24);
        assert_eq!(buf.len(), 40);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_typed_access_little_endian() {
        let mut buf = Buffer::new();
        buf.alloc(16);

        buf.set_u32(0, 0x0403_0201).unwrap();
        buf.set_u64(8, u64::MAX - 1).unwrap();

        assert_eq!(&buf.as_bytes()[..4], &[1, 2, 3, 4]);
        assert_eq!(buf.get_u32(0).unwrap(), 0x0403_0201);
        assert_eq!(buf.get_u64(8).unwrap(), u64::MAX - 1);
    }

    #[test]
    fn test_out_of_bounds_is_error() {
        let mut buf = Buffer::new();
        buf.alloc(8);

        assert!(matches!(
            buf.get_u64(4),
            Err(CodecError::OutOfBounds { offset: 4, len: 8, size: 8 })
        ));
        assert!(buf.set_u32(6, 1).is_err());
        assert!(read_bytes::<4>(buf.as_bytes(), usize::MAX).is_err());
    }

    #[test]
    fn test_trim_drops_reservation() {
        let mut buf = Buffer::with_capacity(4096);
        buf.alloc(32);
        buf.trim();

        assert_eq!(buf.len(), 32);
        assert!(buf.capacity() < 4096);
    }
}
