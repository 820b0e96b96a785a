//! Wire Layout Constants
//!
//! ```text
//! Pointer      : u64 offset relatif terhadap alamat field pointer itu sendiri (0 = null)
//! Array        : [numberOfBytes:u32][numberOfElements:u32][elements...]
//! Struct       : [numberOfBytes:u32][version:u32][fields...]
//! Map          : [24:u32][0:u32][keys:ptr][values:ptr]
//! Union        : [16:u32][tag:u32][data:8]           (size 0 = null)
//! Header V0    : [size][version][interfaceId][name][flags][pad]      24 bytes
//! Header V1    : V0 + [requestId:u64]                                32 bytes
//! Header V2    : V1 + [payload:ptr][payloadInterfaceIds:ptr]         48 bytes
//! ```

/// Semua region dimulai di kelipatan 8
pub const ALIGNMENT: usize = 8;

pub const ARRAY_HEADER_SIZE: usize = 8;
pub const STRUCT_HEADER_SIZE: usize = 8;
pub const MAP_STRUCT_PAYLOAD_SIZE: usize = 16;
pub const MAP_DATA_SIZE: usize = STRUCT_HEADER_SIZE + MAP_STRUCT_PAYLOAD_SIZE;
pub const UNION_HEADER_SIZE: usize = 8;
pub const UNION_DATA_SIZE: usize = 16;
pub const POINTER_SIZE: usize = 8;

pub const MESSAGE_V0_HEADER_SIZE: usize = 24;
pub const MESSAGE_V1_HEADER_SIZE: usize = 32;
pub const MESSAGE_V2_HEADER_SIZE: usize = 48;

// Offset field header (fixed, tidak lewat pointer)
pub const MESSAGE_HEADER_NUM_BYTES_OFFSET: usize = 0;
pub const MESSAGE_HEADER_VERSION_OFFSET: usize = 4;
pub const MESSAGE_INTERFACE_ID_OFFSET: usize = 8;
pub const MESSAGE_NAME_OFFSET: usize = 12;
pub const MESSAGE_FLAGS_OFFSET: usize = 16;
pub const MESSAGE_REQUEST_ID_OFFSET: usize = 24;
pub const MESSAGE_PAYLOAD_OFFSET: usize = MESSAGE_V2_HEADER_SIZE - 16;
pub const MESSAGE_PAYLOAD_INTERFACE_IDS_OFFSET: usize = MESSAGE_V2_HEADER_SIZE - 8;

/// Flag bits di header
pub const MESSAGE_EXPECTS_RESPONSE: u32 = 1 << 0;
pub const MESSAGE_IS_RESPONSE: u32 = 1 << 1;

/// Sentinel index untuk handle kosong
pub const ENCODED_INVALID_HANDLE_VALUE: u32 = 0xFFFF_FFFF;

pub const INVALID_INTERFACE_ID: u32 = 0xFFFF_FFFF;
pub const INTERFACE_NAMESPACE_BIT: u32 = 0x8000_0000;

/// Batas nesting pointer saat decode
pub const MAX_RECURSION_DEPTH: usize = 100;

/// Round `size` up to the next multiple of `ALIGNMENT`.
#[inline(always)]
pub const fn align(size: usize) -> usize {
    (size + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Round `size` up to a multiple of `to` (power of two).
#[inline(always)]
pub const fn align_to(size: usize, to: usize) -> usize {
    (size + to - 1) & !(to - 1)
}

#[inline(always)]
pub const fn is_valid_interface_id(id: u32) -> bool {
    id != INVALID_INTERFACE_ID
}

/// Id yang dialokasikan sisi master tidak punya namespace bit
#[inline(always)]
pub const fn is_master_interface_id(id: u32) -> bool {
    is_valid_interface_id(id) && id & INTERFACE_NAMESPACE_BIT == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align() {
        assert_eq!(align(0), 0);
        assert_eq!(align(1), 8);
        assert_eq!(align(8), 8);
        assert_eq!(align(11), 16);
        assert_eq!(align_to(5, 4), 8);
        assert_eq!(align_to(6, 2), 6);
    }

    #[test]
    fn test_header_offsets() {
        assert_eq!(MAP_DATA_SIZE, 24);
        assert_eq!(MESSAGE_PAYLOAD_OFFSET, 32);
        assert_eq!(MESSAGE_PAYLOAD_INTERFACE_IDS_OFFSET, 40);
    }

    #[test]
    fn test_interface_ids() {
        assert!(!is_valid_interface_id(INVALID_INTERFACE_ID));
        assert!(is_master_interface_id(1));
        assert!(!is_master_interface_id(INTERFACE_NAMESPACE_BIT | 1));
    }
}
