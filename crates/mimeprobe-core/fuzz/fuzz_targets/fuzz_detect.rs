//! Fuzz target for full detection over arbitrary bytes
//!
//! Every built-in signature runs against the input, including the ZIP
//! decoders and the XML prologue parser.
//!
//! Properties validated:
//! - No panics escape `detect`
//! - Detection never fails for an in-memory resource
//! - A detection always carries a media type

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use mimeprobe_core::SignatureRegistry;

fn registry() -> &'static SignatureRegistry {
    static REGISTRY: OnceLock<SignatureRegistry> = OnceLock::new();
    REGISTRY.get_or_init(SignatureRegistry::with_defaults)
}

fuzz_target!(|data: &[u8]| {
    let detection = registry()
        .detect_bytes("fuzz.bin", data)
        .expect("in-memory resources are always reachable");
    assert!(!detection.mime_type.essence().is_empty());
});
