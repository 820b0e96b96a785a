//! Error types untuk codec.
//!
//! Encoder hanya melempar error untuk type mismatch; decoder melempar error
//! untuk input yang rusak (bounds-checked).

use thiserror::Error;

/// Main error type for all encode/decode operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Negative value written to an unsigned field.
    #[error("Cannot encode negative value {value} as {field}")]
    NegativeUnsigned { field: &'static str, value: i64 },

    /// Value does not fit the fixed-width field.
    #[error("Value {value} out of range for {field}")]
    OutOfRange { field: &'static str, value: String },

    /// Non-array value passed for an array-typed field.
    #[error("Passing non Array for array type")]
    NotAnArray,

    /// Non-string value passed for a string-typed field.
    #[error("Passing non String for string type")]
    NotAString,

    /// Non-map value passed for a map-typed field.
    #[error("Passing non Map for map type")]
    NotAMap,

    /// Any other value/descriptor mismatch.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Fixed-size array given the wrong number of elements.
    #[error("Array length mismatch: expected {expected}, found {found}")]
    ArrayLengthMismatch { expected: usize, found: usize },

    /// Union value names a field the union does not declare.
    #[error("Union {union_name} has no field {field:?}")]
    UnknownUnionField { union_name: String, field: String },

    /// Union region carries an ordinal the union does not declare.
    #[error("Union {union_name} has no field with ordinal {ordinal}")]
    UnknownUnionOrdinal { union_name: String, ordinal: u32 },

    /// Operation needs a newer message header version.
    #[error("Message header version {version} does not support {operation}")]
    UnsupportedHeaderVersion {
        version: u32,
        operation: &'static str,
    },

    /// `finish()` called on a V2 builder before `set_payload()`.
    #[error("Payload needs to be set before calling finish")]
    PayloadNotSet,

    /// Read or write past the end of the buffer.
    #[error("Access of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// Pointer target not on an 8-byte boundary.
    #[error("Pointer target {0} is not 8-byte aligned")]
    MisalignedPointer(usize),

    /// Relative offset overflows the address space.
    #[error("Pointer offset {offset} at {position} overflows")]
    PointerOverflow { position: usize, offset: u64 },

    /// Message header size/version combination is invalid.
    #[error("Received invalid message header (size {size}, version {version})")]
    InvalidMessageHeader { size: u32, version: u32 },

    /// Struct header does not match any known version of the struct.
    #[error("Received {name} of invalid size ({size}) and/or version ({version})")]
    InvalidStructHeader {
        name: String,
        size: u32,
        version: u32,
    },

    /// Union region with a size other than 0 (null) or 16.
    #[error("Received {name} union of invalid size ({size})")]
    InvalidUnionHeader { name: String, size: u32 },

    /// Pointer targets a region that was already decoded (aliasing/overlap).
    #[error("Pointer target {target} lies before claimed offset {claimed}")]
    OverlappingPointer { target: usize, claimed: usize },

    /// Map header or key/value arrays are inconsistent.
    #[error("Received invalid map data")]
    InvalidMapData,

    /// String payload is not valid UTF-8.
    #[error("Invalid UTF-8 in string payload: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Nesting exceeds `MAX_RECURSION_DEPTH`.
    #[error("Exceeded maximum recursion depth")]
    RecursionTooDeep,

    /// I/O error on a file-backed message.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using CodecError.
pub type Result<T> = std::result::Result<T, CodecError>;
