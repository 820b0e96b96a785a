//! Mojo Dump Binary
//!
//! Inspect message hasil capture di disk:
//! - Header fields (versi, name, flags, request id)
//! - Payload interface ids (V2)
//! - Hex dump payload
//!
//! Usage:
//!   cargo run --release --bin mojo_dump -- [OPTIONS]

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use mojo_wire::core::MessageFile;
use mojo_wire::protocol::layout::{MESSAGE_EXPECTS_RESPONSE, MESSAGE_IS_RESPONSE};
use mojo_wire::{
    AssociatedEndpointHandle, AssociatedGroupController, Descriptor, Message, MessageHeader,
    Result, StructSpec, StructValue, Value,
};

/// Dump configuration
struct DumpConfig {
    file: Option<String>,
    hex: bool,
    sample: Option<String>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            file: None,
            hex: false,
            sample: None,
        }
    }
}

/// Assigns ids 1, 2, 3, ... to outgoing endpoints
struct SequentialIds {
    next: u32,
}

impl AssociatedGroupController for SequentialIds {
    fn associate_interface(&mut self, _endpoint: AssociatedEndpointHandle) -> u32 {
        self.next += 1;
        self.next
    }

    fn create_local_endpoint_handle(&mut self, interface_id: u32) -> Option<AssociatedEndpointHandle> {
        Some(AssociatedEndpointHandle(u64::from(interface_id)))
    }
}

/// Tulis satu message V2 contoh ke `path`
fn write_sample(path: &str) -> Result<()> {
    let entry = Arc::new(
        StructSpec::builder("Entry")
            .field("key", Descriptor::string())
            .field("weight", Descriptor::Double)
            .build(),
    );
    let spec = StructSpec::builder("SampleRequest")
        .field("id", Descriptor::Uint32)
        .field("urgent", Descriptor::PackedBool)
        .field("label", Descriptor::string())
        .field("entries", Descriptor::array_of(Descriptor::pointer_to(entry)))
        .field("peer", Descriptor::nullable_associated_interface_request())
        .build();

    let value: Value = StructValue::new()
        .with("id", 42u32)
        .with("urgent", true)
        .with("label", "hello mojo")
        .with(
            "entries",
            vec![
                StructValue::new().with("key", "a").with("weight", 0.5),
                StructValue::new().with("key", "b").with("weight", 1.5),
            ],
        )
        .with(
            "peer",
            Value::AssociatedInterfaceRequest(AssociatedEndpointHandle(1)),
        )
        .into();

    let mut message = Message::build(0x10, MESSAGE_EXPECTS_RESPONSE, 7, &spec, &value)?;
    message.serialize_associated_endpoint_handles(&mut SequentialIds { next: 0 })?;

    MessageFile::write(path, message.bytes())?;
    println!("✅ Sample message written: {} ({} bytes)", path, message.len());
    Ok(())
}

fn describe_flags(header: &MessageHeader) -> String {
    let mut parts = Vec::new();
    if header.flags & MESSAGE_EXPECTS_RESPONSE != 0 {
        parts.push("EXPECTS_RESPONSE");
    }
    if header.flags & MESSAGE_IS_RESPONSE != 0 {
        parts.push("IS_RESPONSE");
    }
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(" | ")
    }
}

fn hex_dump(bytes: &[u8], base: usize) {
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!("   {:08x}  {:<47}  {}", base + i * 16, hex.join(" "), ascii);
    }
}

fn dump(path: &str, hex: bool) -> Result<()> {
    let file = MessageFile::open(Path::new(path))?;
    let bytes = file.bytes();

    // Header langsung dari mmap region
    let header = MessageHeader::parse(bytes)?;
    info!(path, len = bytes.len(), "message file opened");

    println!("📨 Message: {} ({} bytes)", path, bytes.len());
    println!("   Header size:   {}", header.num_bytes);
    println!("   Version:       {}", header.version);
    println!("   Interface id:  {:#x}", header.interface_id);
    println!("   Name:          {:#x}", header.name);
    println!("   Flags:         {}", describe_flags(&header));
    if let Some(request_id) = header.request_id {
        println!("   Request id:    {}", request_id);
    }

    if let Some(ids) = header.payload_interface_ids(bytes)? {
        println!("   Interface ids: {:?}", ids);
    }

    let payload = &bytes[header.num_bytes as usize..];
    println!("   Payload:       {} bytes", payload.len());
    if hex {
        println!();
        hex_dump(payload, header.num_bytes as usize);
    }
    Ok(())
}

fn parse_args() -> DumpConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DumpConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    config.file = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--hex" | "-x" => {
                config.hex = true;
            }
            "--sample" | "-s" => {
                if i + 1 < args.len() {
                    config.sample = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mojo Dump - Inspect serialized Mojo messages\n");
                println!("Usage: mojo_dump [OPTIONS]\n");
                println!("Options:");
                println!("  -f, --file <PATH>     Message file to inspect");
                println!("  -x, --hex             Hex dump the payload");
                println!("  -s, --sample <PATH>   Write a sample V2 message to PATH");
                println!("  -h, --help            Show this help");
                println!("\nLog level via RUST_LOG (e.g. RUST_LOG=mojo_wire=debug)");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn run(config: DumpConfig) -> Result<()> {
    if let Some(path) = &config.sample {
        write_sample(path)?;
    }
    match config.file.as_deref().or(config.sample.as_deref()) {
        Some(path) => dump(path, config.hex),
        None => {
            println!("Nothing to do. See --help.");
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = parse_args();

    if let Err(e) = run(config) {
        eprintln!("❌ Dump error: {}", e);
        std::process::exit(1);
    }
}
