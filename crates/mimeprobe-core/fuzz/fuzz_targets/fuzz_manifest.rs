//! Fuzz target for JAR manifest parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use mimeprobe_core::signature::JarManifest;

fuzz_target!(|data: &[u8]| {
    if let Ok(manifest) = JarManifest::parse(data) {
        let _ = manifest.main_attribute("Manifest-Version");
    }
});
