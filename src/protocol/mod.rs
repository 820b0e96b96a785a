//! Protocol Layer: Mojo Wire Format
//!
//! Prinsip desain:
//! - Pointer relatif: setiap region bisa dipindah bersama buffer-nya
//! - Aligned regions: semua region dimulai di kelipatan 8
//! - Descriptor sebagai data: satu codec untuk semua type, tanpa codegen

pub mod decoder;
pub mod encoder;
pub mod layout;
pub mod message;
pub mod structs;
pub mod types;
pub mod unions;
pub mod value;

pub use decoder::Decoder;
pub use encoder::{Encoder, MessageData};
pub use message::{
    AssociatedGroupController, Message, MessageHeader, MessageReader, MessageV0Builder,
    MessageV1Builder, MessageV2Builder,
};
pub use structs::{StructField, StructSpec, StructSpecBuilder, StructVersion};
pub use types::{Descriptor, EnumSpec, MojomType};
pub use unions::{UnionField, UnionSpec};
pub use value::{
    AssociatedEndpointHandle, AssociatedInterfacePtrInfo, Handle, InterfacePtrInfo, StructValue,
    UnionValue, Value,
};
