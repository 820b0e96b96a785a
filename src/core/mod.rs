//! Core module: Byte Storage untuk message
//!
//! Prinsip desain:
//! - Satu arena per message: region tidak pernah dipindah setelah dialokasi
//! - Bounds-checked: akses di luar buffer jadi error, bukan panic
//! - File-backed: message hasil capture bisa di-mmap langsung dari disk

pub mod buffer;
mod message_file;

pub use buffer::Buffer;
pub use message_file::MessageFile;
