//! Mojo Wire - Binary Codec untuk Mojo-style IPC Messages
//!
//! Arsitektur:
//! - Relative Pointers: setiap region dirujuk lewat offset dari field-nya
//! - 8-byte Alignment: struct, array, map, string selalu aligned
//! - Handle Tables: OS handle dan associated endpoint lewat index, bukan bytes
//! - Versioned Headers: V0 (24), V1 (+request id), V2 (+payload interface ids)
//!
//! Alur pakai: deskripsikan payload dengan `StructSpec`, encode lewat
//! `Message::build` (atau builder V0/V1/V2), kirim `bytes()` + `handles()`,
//! lalu di sisi penerima `Message::from_bytes` + `MessageReader`.

pub mod core;
pub mod error;
pub mod protocol;

pub use crate::error::{CodecError, Result};
pub use crate::protocol::{
    AssociatedEndpointHandle, AssociatedGroupController, AssociatedInterfacePtrInfo, Decoder,
    Descriptor, Encoder, EnumSpec, Handle, InterfacePtrInfo, Message, MessageData, MessageHeader,
    MessageReader, MessageV0Builder, MessageV1Builder, MessageV2Builder, MojomType, StructSpec,
    StructValue, UnionSpec, UnionValue, Value,
};
