//! Memory-Mapped Message File
//!
//! Message yang di-capture ke disk dibaca lewat mmap, jadi header dan
//! payload bisa di-decode langsung dari page cache tanpa copy.
//! Handle tidak bisa disimpan ke file; hanya bytes message.

use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Read-only, mmap-backed view of one serialized message
pub struct MessageFile {
    mmap: Option<Mmap>,
}

impl MessageFile {
    /// Membuka file message (read-only)
    ///
    /// File kosong tidak bisa di-mmap; hasilnya view kosong.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        if len == 0 {
            return Ok(Self { mmap: None });
        }

        // SAFETY: File dibuka read-only; caller tidak boleh memodifikasi
        // file selama view ini hidup.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(Self { mmap: Some(mmap) })
    }

    /// Menulis bytes message ke file baru (truncate kalau sudah ada)
    pub fn write<P: AsRef<Path>>(path: P, bytes: &[u8]) -> io::Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        if bytes.is_empty() {
            return Ok(());
        }

        file.set_len(bytes.len() as u64)?;

        // SAFETY: File baru saja dibuat dengan read/write permission
        let mut mmap: MmapMut = unsafe { MmapOptions::new().len(bytes.len()).map_mut(&file)? };
        mmap.copy_from_slice(bytes);
        mmap.flush()
    }

    /// Bytes message (zero-copy dari mmap region)
    #[inline(always)]
    pub fn bytes(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}
