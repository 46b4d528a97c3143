//! Fuzz target for XML prologue extraction
//!
//! Properties validated:
//! - No panics on malformed markup, DOCTYPEs or attribute values
//! - Extraction returns an error instead of reading past the root element

#![no_main]

use libfuzzer_sys::fuzz_target;
use mimeprobe_core::signature::XmlIdentity;

fuzz_target!(|data: &[u8]| {
    let _ = XmlIdentity::extract(data, None);
    let _ = XmlIdentity::extract(data, Some("kml"));
});
