//! Message Framing
//!
//! Layout:
//! ┌─────────────────────────────────────────────────────┐
//! │ Header V0 (24) / V1 (32, + request id) / V2 (48)    │
//! ├─────────────────────────────────────────────────────┤
//! │ Payload struct region                               │
//! ├─────────────────────────────────────────────────────┤
//! │ Out-of-line regions (+ payload interface ids, V2)   │
//! └─────────────────────────────────────────────────────┘
//!
//! Field header dibaca di offset tetap, tanpa decoder. Versi header dipilih
//! sekali saat builder dibuat.

use tracing::{debug, trace, warn};

use crate::core::buffer::{read_bytes, slice_at};
use crate::core::Buffer;
use crate::error::{CodecError, Result};

use super::decoder::Decoder;
use super::encoder::{Encoder, MessageData};
use super::layout::*;
use super::structs::StructSpec;
use super::types::{Descriptor, MojomType};
use super::value::{AssociatedEndpointHandle, Handle, Value};

/// RPC-layer hook that maps associated endpoints to interface ids
pub trait AssociatedGroupController {
    /// Assign an interface id to an outgoing endpoint.
    fn associate_interface(&mut self, endpoint: AssociatedEndpointHandle) -> u32;

    /// Materialize a local endpoint for a received id; `None` on failure.
    fn create_local_endpoint_handle(&mut self, interface_id: u32) -> Option<AssociatedEndpointHandle>;
}

/// Fixed-offset header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_bytes: u32,
    pub version: u32,
    pub interface_id: u32,
    pub name: u32,
    pub flags: u32,
    /// Hanya ada di V1+
    pub request_id: Option<u64>,
}

impl MessageHeader {
    /// Parse dan validasi header dari raw bytes (tanpa copy payload)
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let u32_at = |offset| read_bytes::<4>(bytes, offset).map(u32::from_le_bytes);

        let num_bytes = u32_at(MESSAGE_HEADER_NUM_BYTES_OFFSET)?;
        let version = u32_at(MESSAGE_HEADER_VERSION_OFFSET)?;
        let valid = match version {
            0 => num_bytes as usize == MESSAGE_V0_HEADER_SIZE,
            1 => num_bytes as usize == MESSAGE_V1_HEADER_SIZE,
            _ => num_bytes as usize >= MESSAGE_V2_HEADER_SIZE,
        };
        if !valid {
            return Err(CodecError::InvalidMessageHeader {
                size: num_bytes,
                version,
            });
        }
        slice_at(bytes, 0, num_bytes as usize)?;

        let request_id = if version >= 1 {
            Some(u64::from_le_bytes(read_bytes::<8>(
                bytes,
                MESSAGE_REQUEST_ID_OFFSET,
            )?))
        } else {
            None
        };

        Ok(Self {
            num_bytes,
            version,
            interface_id: u32_at(MESSAGE_INTERFACE_ID_OFFSET)?,
            name: u32_at(MESSAGE_NAME_OFFSET)?,
            flags: u32_at(MESSAGE_FLAGS_OFFSET)?,
            request_id,
        })
    }

    /// Payload interface ids langsung dari `bytes` (mis. mmap), tanpa copy.
    ///
    /// `None` sebelum V2; pointer null di V2 = daftar kosong.
    pub fn payload_interface_ids(&self, bytes: &[u8]) -> Result<Option<Vec<u32>>> {
        if self.version < 2 {
            return Ok(None);
        }
        let mut decoder = Decoder::new(bytes, &[], &[], 0);
        decoder.skip(MESSAGE_PAYLOAD_INTERFACE_IDS_OFFSET);
        let ids = match decoder.decode_array_pointer(&Descriptor::Uint32, None)? {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_u64)
                .map(|id| id as u32)
                .collect(),
            _ => Vec::new(),
        };
        Ok(Some(ids))
    }

    #[inline(always)]
    pub fn expects_response(&self) -> bool {
        self.flags & MESSAGE_EXPECTS_RESPONSE != 0
    }

    #[inline(always)]
    pub fn is_response(&self) -> bool {
        self.flags & MESSAGE_IS_RESPONSE != 0
    }
}

/// Complete message: bytes + handle tables
#[derive(Debug)]
pub struct Message {
    header: MessageHeader,
    data: MessageData,
}

impl Message {
    fn from_data(data: MessageData) -> Result<Self> {
        let header = MessageHeader::parse(data.buffer.as_bytes())?;
        Ok(Self { header, data })
    }

    /// Wrap received bytes + handles (sisi penerima).
    pub fn from_bytes(bytes: Vec<u8>, handles: Vec<Handle>) -> Result<Self> {
        let message = Self::from_data(MessageData {
            buffer: Buffer::from_vec(bytes),
            handles,
            associated_endpoint_handles: Vec::new(),
        })?;
        trace!(
            name = message.header.name,
            version = message.header.version,
            len = message.len(),
            "message parsed"
        );
        Ok(message)
    }

    /// Encode `value` as the payload of a new message, sized exactly.
    ///
    /// V2 kalau payload membawa associated endpoint, V1 kalau flags butuh
    /// request id, selain itu V0.
    pub fn build(
        name: u32,
        flags: u32,
        request_id: u64,
        spec: &StructSpec,
        value: &Value,
    ) -> Result<Self> {
        let payload_size = spec.compute_size(value)?;
        let associated = spec.associated_endpoint_count(value);

        if associated > 0 {
            let ids_size = align(ARRAY_HEADER_SIZE + 4 * associated);
            let mut builder =
                MessageV2Builder::new(name, payload_size + ids_size, flags, request_id);
            builder.set_payload(spec, value);
            builder.finish()
        } else if flags & (MESSAGE_EXPECTS_RESPONSE | MESSAGE_IS_RESPONSE) != 0 {
            let mut builder = MessageV1Builder::new(name, payload_size, flags, request_id);
            builder.encode_struct(spec, value)?;
            builder.finish()
        } else {
            let mut builder = MessageV0Builder::new(name, payload_size);
            builder.encode_struct(spec, value)?;
            builder.finish()
        }
    }

    #[inline(always)]
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    #[inline(always)]
    pub fn header_num_bytes(&self) -> u32 {
        self.header.num_bytes
    }

    #[inline(always)]
    pub fn header_version(&self) -> u32 {
        self.header.version
    }

    #[inline(always)]
    pub fn interface_id(&self) -> u32 {
        self.header.interface_id
    }

    pub fn set_interface_id(&mut self, interface_id: u32) -> Result<()> {
        self.data
            .buffer
            .set_u32(MESSAGE_INTERFACE_ID_OFFSET, interface_id)?;
        self.header.interface_id = interface_id;
        Ok(())
    }

    #[inline(always)]
    pub fn name(&self) -> u32 {
        self.header.name
    }

    #[inline(always)]
    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    #[inline(always)]
    pub fn request_id(&self) -> Option<u64> {
        self.header.request_id
    }

    pub fn set_request_id(&mut self, request_id: u64) -> Result<()> {
        if self.header.version < 1 {
            return Err(CodecError::UnsupportedHeaderVersion {
                version: self.header.version,
                operation: "request id",
            });
        }
        self.data.buffer.set_u64(MESSAGE_REQUEST_ID_OFFSET, request_id)?;
        self.header.request_id = Some(request_id);
        Ok(())
    }

    #[inline(always)]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }

    #[inline(always)]
    pub fn expects_response(&self) -> bool {
        self.header.expects_response()
    }

    #[inline(always)]
    pub fn bytes(&self) -> &[u8] {
        self.data.buffer.as_bytes()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.buffer.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.buffer.is_empty()
    }

    pub fn handles(&self) -> &[Handle] {
        &self.data.handles
    }

    pub fn associated_endpoint_handles(&self) -> &[AssociatedEndpointHandle] {
        &self.data.associated_endpoint_handles
    }

    /// Bytes + handles untuk transport
    pub fn into_parts(self) -> (Vec<u8>, Vec<Handle>) {
        (self.data.buffer.into_vec(), self.data.handles)
    }

    fn decoder(&self) -> Decoder<'_> {
        Decoder::new(
            self.data.buffer.as_bytes(),
            &self.data.handles,
            &self.data.associated_endpoint_handles,
            0,
        )
    }

    /// `None` sebelum V2; pointer null di V2 = daftar kosong.
    pub fn payload_interface_ids(&self) -> Result<Option<Vec<u32>>> {
        self.header.payload_interface_ids(self.data.buffer.as_bytes())
    }

    /// Timpa array payload interface ids in place; panjang harus sama.
    pub(crate) fn set_payload_interface_ids(&mut self, ids: &[u32]) -> Result<()> {
        if self.header.version < 2 {
            return Err(CodecError::UnsupportedHeaderVersion {
                version: self.header.version,
                operation: "payload interface ids",
            });
        }

        let mut decoder = self.decoder();
        decoder.skip(MESSAGE_PAYLOAD_INTERFACE_IDS_OFFSET);
        let pointer = match decoder.decode_pointer()? {
            Some(pointer) => pointer,
            None if ids.is_empty() => return Ok(()),
            None => {
                return Err(CodecError::ArrayLengthMismatch {
                    expected: 0,
                    found: ids.len(),
                })
            }
        };
        let existing = self.data.buffer.get_u32(pointer + 4)? as usize;
        if existing != ids.len() {
            return Err(CodecError::ArrayLengthMismatch {
                expected: existing,
                found: ids.len(),
            });
        }

        let values: Vec<Value> = ids.iter().map(|&id| Value::from(id)).collect();
        Encoder::new(&mut self.data, pointer).encode_array(&Descriptor::Uint32, &values, None, None)
    }

    /// Minta controller meng-assign interface id untuk setiap associated
    /// endpoint, lalu tulis ke array payload interface ids.
    pub fn serialize_associated_endpoint_handles(
        &mut self,
        controller: &mut dyn AssociatedGroupController,
    ) -> Result<()> {
        if self.header.version < 2 {
            return Err(CodecError::UnsupportedHeaderVersion {
                version: self.header.version,
                operation: "associated endpoint serialization",
            });
        }
        if self.data.associated_endpoint_handles.is_empty() {
            return Ok(());
        }

        let endpoints = std::mem::take(&mut self.data.associated_endpoint_handles);
        let ids: Vec<u32> = endpoints
            .iter()
            .map(|&endpoint| controller.associate_interface(endpoint))
            .collect();
        debug!(name = self.header.name, count = ids.len(), "associated endpoints serialized");
        self.set_payload_interface_ids(&ids)
    }

    /// Buat local endpoint untuk setiap id di payload.
    ///
    /// Returns `false` kalau ada endpoint yang gagal dibuat; sisanya tetap
    /// diproses. Id yang sudah dipakai ditimpa `INVALID_INTERFACE_ID`.
    pub fn deserialize_associated_endpoint_handles(
        &mut self,
        controller: &mut dyn AssociatedGroupController,
    ) -> Result<bool> {
        if self.header.version < 2 {
            return Err(CodecError::UnsupportedHeaderVersion {
                version: self.header.version,
                operation: "associated endpoint deserialization",
            });
        }
        let mut ids = self.payload_interface_ids()?.unwrap_or_default();
        if ids.is_empty() {
            return Ok(true);
        }

        let mut result = true;
        let mut endpoints = Vec::with_capacity(ids.len());
        for id in ids.iter_mut() {
            let endpoint = controller.create_local_endpoint_handle(*id);
            if is_valid_interface_id(*id) && endpoint.is_none() {
                warn!(name = self.header.name, interface_id = *id, "failed to create local endpoint");
                result = false;
            }
            endpoints.push(endpoint.unwrap_or(AssociatedEndpointHandle::INVALID));
            *id = INVALID_INTERFACE_ID;
        }

        self.data.associated_endpoint_handles = endpoints;
        self.set_payload_interface_ids(&ids)?;
        debug!(name = self.header.name, count = ids.len(), result, "associated endpoints deserialized");
        Ok(result)
    }
}

/// Header bersama V0/V1/V2 di awal buffer baru
///
/// `payload_size` hanya estimasi kapasitas; buffer tumbuh kalau kurang.
fn header_data(
    header_size: usize,
    version: u32,
    name: u32,
    flags: u32,
    request_id: Option<u64>,
    payload_size: usize,
) -> MessageData {
    let mut bytes = Vec::with_capacity(header_size + payload_size);
    bytes.extend_from_slice(&(header_size as u32).to_le_bytes());
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes()); // interface id
    bytes.extend_from_slice(&name.to_le_bytes());
    bytes.extend_from_slice(&flags.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes()); // padding
    if let Some(request_id) = request_id {
        bytes.extend_from_slice(&request_id.to_le_bytes());
    }
    // V2: payload + payload interface ids pointer diisi di finish()
    bytes.resize(header_size, 0);

    MessageData {
        buffer: Buffer::from_vec(bytes),
        ..MessageData::default()
    }
}

fn encode_payload<T: MojomType + ?Sized>(data: &mut MessageData, cls: &T, value: &Value) -> Result<()> {
    let mut encoder = data.create_encoder(cls.encoded_size());
    encoder.encode_struct(cls, value)
}

fn finish_data(mut data: MessageData) -> Result<Message> {
    data.buffer.trim();
    let message = Message::from_data(data)?;
    debug!(
        name = message.header.name,
        version = message.header.version,
        len = message.len(),
        handles = message.data.handles.len(),
        "message built"
    );
    Ok(message)
}

/// Builder untuk header V0 (tanpa request id)
pub struct MessageV0Builder {
    data: MessageData,
}

impl MessageV0Builder {
    pub fn new(name: u32, payload_size: usize) -> Self {
        Self {
            data: header_data(MESSAGE_V0_HEADER_SIZE, 0, name, 0, None, payload_size),
        }
    }

    pub fn encode_struct<T: MojomType + ?Sized>(&mut self, cls: &T, value: &Value) -> Result<()> {
        encode_payload(&mut self.data, cls, value)
    }

    pub fn finish(self) -> Result<Message> {
        finish_data(self.data)
    }
}

/// Builder untuk header V1 (+ request id)
pub struct MessageV1Builder {
    data: MessageData,
}

impl MessageV1Builder {
    pub fn new(name: u32, payload_size: usize, flags: u32, request_id: u64) -> Self {
        Self {
            data: header_data(
                MESSAGE_V1_HEADER_SIZE,
                1,
                name,
                flags,
                Some(request_id),
                payload_size,
            ),
        }
    }

    pub fn encode_struct<T: MojomType + ?Sized>(&mut self, cls: &T, value: &Value) -> Result<()> {
        encode_payload(&mut self.data, cls, value)
    }

    pub fn finish(self) -> Result<Message> {
        finish_data(self.data)
    }
}

/// Builder untuk header V2
///
/// Payload ditunda sampai `finish()`: jumlah associated endpoint baru
/// diketahui setelah payload selesai di-encode.
pub struct MessageV2Builder<'a> {
    data: MessageData,
    payload: Option<(&'a dyn MojomType, &'a Value)>,
}

impl<'a> MessageV2Builder<'a> {
    pub fn new(name: u32, payload_size: usize, flags: u32, request_id: u64) -> Self {
        Self {
            data: header_data(
                MESSAGE_V2_HEADER_SIZE,
                2,
                name,
                flags,
                Some(request_id),
                payload_size,
            ),
            payload: None,
        }
    }

    pub fn set_payload(&mut self, cls: &'a dyn MojomType, value: &'a Value) {
        self.payload = Some((cls, value));
    }

    pub fn finish(mut self) -> Result<Message> {
        let (cls, value) = self.payload.ok_or(CodecError::PayloadNotSet)?;

        let mut encoder = Encoder::new(&mut self.data, 0);
        encoder.skip(MESSAGE_PAYLOAD_OFFSET);
        encoder.encode_struct_pointer(cls, value)?;

        // Placeholder id, diisi serialize_associated_endpoint_handles()
        let count = self.data.associated_endpoint_handles.len();
        let placeholder = Value::Array(vec![Value::Uint(0); count]);
        let mut encoder = Encoder::new(&mut self.data, 0);
        encoder.skip(MESSAGE_PAYLOAD_INTERFACE_IDS_OFFSET);
        encoder.encode_array_pointer(&Descriptor::Uint32, &placeholder, None)?;

        finish_data(self.data)
    }
}

/// One-shot header parse + payload decode
pub struct MessageReader<'a> {
    decoder: Decoder<'a>,
    pub payload_size: usize,
    pub message_name: u32,
    pub flags: u32,
    pub request_id: Option<u64>,
}

impl<'a> MessageReader<'a> {
    pub fn new(message: &'a Message) -> Result<Self> {
        let mut decoder = message.decoder();
        let header_size = decoder.read_uint32()? as usize;
        let payload_size = message.len().saturating_sub(header_size);
        let version = decoder.read_uint32()?;
        let _interface_id = decoder.read_uint32()?;
        let message_name = decoder.read_uint32()?;
        let flags = decoder.read_uint32()?;
        decoder.skip(4); // padding
        let request_id = if version >= 1 {
            Some(decoder.read_uint64()?)
        } else {
            None
        };
        decoder.skip(header_size.saturating_sub(decoder.next()));

        Ok(Self {
            decoder,
            payload_size,
            message_name,
            flags,
            request_id,
        })
    }

    pub fn decode_struct<T: MojomType + ?Sized>(&mut self, cls: &T) -> Result<Value> {
        self.decoder.decode_struct(cls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::value::StructValue;
    use std::sync::Arc;

    fn point() -> StructSpec {
        StructSpec::builder("Point")
            .field("x", Descriptor::Int32)
            .field("y", Descriptor::Int32)
            .build()
    }

    #[derive(Default)]
    struct SequentialController {
        next_id: u32,
        fail: Vec<u32>,
    }

    impl AssociatedGroupController for SequentialController {
        fn associate_interface(&mut self, _endpoint: AssociatedEndpointHandle) -> u32 {
            let id = self.next_id;
            self.next_id += 1;
            id
        }

        fn create_local_endpoint_handle(&mut self, interface_id: u32) -> Option<AssociatedEndpointHandle> {
            if self.fail.contains(&interface_id) || !is_valid_interface_id(interface_id) {
                None
            } else {
                Some(AssociatedEndpointHandle(u64::from(interface_id) + 1000))
            }
        }
    }

    fn with_endpoints() -> (StructSpec, Value) {
        let spec = StructSpec::builder("Bind")
            .field("a", Descriptor::associated_interface_request())
            .field("b", Descriptor::nullable_associated_interface_request())
            .build();
        let value = StructValue::new()
            .with("a", Value::AssociatedInterfaceRequest(AssociatedEndpointHandle(1)))
            .with("b", Value::AssociatedInterfaceRequest(AssociatedEndpointHandle(2)))
            .into();
        (spec, value)
    }

    #[test]
    fn test_v0_header_layout() {
        let value = StructValue::new().with("x", 1i32).with("y", -1i32).into();
        let mut builder = MessageV0Builder::new(5, 16);
        builder.encode_struct(&point(), &value).unwrap();
        let message = builder.finish().unwrap();

        assert_eq!(message.header_num_bytes(), 24);
        assert_eq!(message.header_version(), 0);
        assert_eq!(message.name(), 5);
        assert_eq!(message.request_id(), None);
        assert_eq!(message.len(), 24 + 16);
        assert_eq!(message.payload_interface_ids().unwrap(), None);
    }

    #[test]
    fn test_v1_flags_and_request_id() {
        let value = StructValue::new().with("x", 0i32).with("y", 0i32).into();
        let mut builder = MessageV1Builder::new(9, 16, MESSAGE_EXPECTS_RESPONSE, 77);
        builder.encode_struct(&point(), &value).unwrap();
        let mut message = builder.finish().unwrap();

        assert!(message.expects_response());
        assert!(!message.is_response());
        assert_eq!(message.request_id(), Some(77));

        message.set_request_id(78).unwrap();
        message.set_interface_id(3).unwrap();
        let reparsed = MessageHeader::parse(message.bytes()).unwrap();
        assert_eq!(reparsed.request_id, Some(78));
        assert_eq!(reparsed.interface_id, 3);
    }

    #[test]
    fn test_set_request_id_on_v0_fails() {
        let mut builder = MessageV0Builder::new(1, 0);
        builder
            .encode_struct(&point(), &StructValue::new().into())
            .unwrap();
        let mut message = builder.finish().unwrap();
        assert!(matches!(
            message.set_request_id(1),
            Err(CodecError::UnsupportedHeaderVersion { version: 0, .. })
        ));
    }

    #[test]
    fn test_v2_finish_without_payload() {
        let builder = MessageV2Builder::new(1, 0, 0, 0);
        assert!(matches!(builder.finish(), Err(CodecError::PayloadNotSet)));
    }

    #[test]
    fn test_v2_layout_and_serialize() {
        let (spec, value) = with_endpoints();
        let mut builder = MessageV2Builder::new(2, 64, 0, 0);
        builder.set_payload(&spec, &value);
        let mut message = builder.finish().unwrap();

        assert_eq!(message.header_version(), 2);
        assert_eq!(message.associated_endpoint_handles().len(), 2);
        // payload pointer at 32 -> region right after the header
        assert_eq!(u64::from_le_bytes(read_bytes::<8>(message.bytes(), 32).unwrap()), 16);
        assert_eq!(message.payload_interface_ids().unwrap(), Some(vec![0, 0]));

        let mut controller = SequentialController {
            next_id: 10,
            ..Default::default()
        };
        message
            .serialize_associated_endpoint_handles(&mut controller)
            .unwrap();
        assert_eq!(message.payload_interface_ids().unwrap(), Some(vec![10, 11]));
        assert!(message.associated_endpoint_handles().is_empty());
    }

    #[test]
    fn test_header_reads_interface_ids_from_raw_bytes() {
        let (spec, value) = with_endpoints();
        let mut builder = MessageV2Builder::new(2, 64, 0, 0);
        builder.set_payload(&spec, &value);
        let mut message = builder.finish().unwrap();
        let mut controller = SequentialController {
            next_id: 3,
            ..Default::default()
        };
        message
            .serialize_associated_endpoint_handles(&mut controller)
            .unwrap();

        let bytes = message.bytes();
        let header = MessageHeader::parse(bytes).unwrap();
        assert_eq!(header.payload_interface_ids(bytes).unwrap(), Some(vec![3, 4]));

        let mut builder = MessageV0Builder::new(1, 16);
        builder
            .encode_struct(&point(), &StructValue::new().with("x", 1i32).with("y", 2i32).into())
            .unwrap();
        let v0 = builder.finish().unwrap();
        let header = MessageHeader::parse(v0.bytes()).unwrap();
        assert_eq!(header.payload_interface_ids(v0.bytes()).unwrap(), None);
    }

    #[test]
    fn test_deserialize_partial_failure() {
        let (spec, value) = with_endpoints();
        let mut message = Message::build(4, 0, 0, &spec, &value).unwrap();
        let mut controller = SequentialController::default();
        message
            .serialize_associated_endpoint_handles(&mut controller)
            .unwrap();

        let (bytes, handles) = message.into_parts();
        let mut received = Message::from_bytes(bytes, handles).unwrap();
        let mut controller = SequentialController {
            fail: vec![1],
            ..Default::default()
        };
        let ok = received
            .deserialize_associated_endpoint_handles(&mut controller)
            .unwrap();

        assert!(!ok);
        assert_eq!(
            received.associated_endpoint_handles(),
            &[AssociatedEndpointHandle(1000), AssociatedEndpointHandle::INVALID]
        );
        assert_eq!(
            received.payload_interface_ids().unwrap(),
            Some(vec![INVALID_INTERFACE_ID, INVALID_INTERFACE_ID])
        );

        let decoded = MessageReader::new(&received)
            .unwrap()
            .decode_struct(&spec)
            .unwrap();
        let decoded = decoded.as_struct().unwrap();
        assert_eq!(
            decoded.get("a"),
            Some(&Value::AssociatedInterfaceRequest(AssociatedEndpointHandle(1000)))
        );
        assert_eq!(decoded.get("b"), Some(&Value::Null));
    }

    #[test]
    fn test_associated_ops_need_v2() {
        let mut message = Message::build(1, 0, 0, &point(), &StructValue::new().into()).unwrap();
        let mut controller = SequentialController::default();

        assert!(matches!(
            message.serialize_associated_endpoint_handles(&mut controller),
            Err(CodecError::UnsupportedHeaderVersion { .. })
        ));
        assert!(matches!(
            message.deserialize_associated_endpoint_handles(&mut controller),
            Err(CodecError::UnsupportedHeaderVersion { .. })
        ));
        assert!(matches!(
            message.set_payload_interface_ids(&[]),
            Err(CodecError::UnsupportedHeaderVersion { .. })
        ));
    }

    #[test]
    fn test_build_picks_version_and_sizes_exactly() {
        let inner = Arc::new(point());
        let spec = StructSpec::builder("Path")
            .field("points", Descriptor::array_of(Descriptor::pointer_to(inner)))
            .field("label", Descriptor::string())
            .build();
        let value: Value = StructValue::new()
            .with(
                "points",
                vec![
                    StructValue::new().with("x", 1i32).with("y", 2i32),
                    StructValue::new().with("x", 3i32).with("y", 4i32),
                ],
            )
            .with("label", "route")
            .into();

        let v0 = Message::build(1, 0, 0, &spec, &value).unwrap();
        assert_eq!(v0.header_version(), 0);
        assert_eq!(v0.len(), 24 + spec.compute_size(&value).unwrap());

        let v1 = Message::build(1, MESSAGE_IS_RESPONSE, 5, &spec, &value).unwrap();
        assert_eq!(v1.header_version(), 1);
        assert!(v1.is_response());

        let decoded = MessageReader::new(&v1).unwrap().decode_struct(&spec).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_from_bytes_rejects_bad_headers() {
        let mut bytes = vec![0u8; 32];
        bytes[0..4].copy_from_slice(&32u32.to_le_bytes());
        // version 0 with a 32-byte header
        assert!(matches!(
            Message::from_bytes(bytes.clone(), vec![]),
            Err(CodecError::InvalidMessageHeader {
                size: 32,
                version: 0
            })
        ));

        bytes[4..8].copy_from_slice(&1u32.to_le_bytes());
        assert!(Message::from_bytes(bytes.clone(), vec![]).is_ok());

        // header claims more bytes than received
        bytes[0..4].copy_from_slice(&64u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            Message::from_bytes(bytes, vec![]),
            Err(CodecError::OutOfBounds { .. })
        ));

        assert!(Message::from_bytes(vec![0u8; 3], vec![]).is_err());
    }

    #[test]
    fn test_reader_payload_size() {
        let value = StructValue::new().with("x", 7i32).with("y", 8i32).into();
        let message = Message::build(2, MESSAGE_EXPECTS_RESPONSE, 99, &point(), &value).unwrap();
        let reader = MessageReader::new(&message).unwrap();

        assert_eq!(reader.payload_size, 16);
        assert_eq!(reader.message_name, 2);
        assert_eq!(reader.flags, MESSAGE_EXPECTS_RESPONSE);
        assert_eq!(reader.request_id, Some(99));
    }
}
