//! # mimeprobe-core
//!
//! Content-type detection by magic numbers and structural inspection.
//!
//! Detects:
//! - Binary formats by leading bytes (PNG, GIF, JPEG, PDF, GZIP, shapefile)
//! - XML vocabularies by DOCTYPE or root-element namespace (XHTML, KML, GPX, SVG, GML)
//! - ZIP-based containers by their entries (OpenDocument, OOXML, JAR, KMZ)
//!
//! ```
//! use mimeprobe_core::SignatureRegistry;
//!
//! let registry = SignatureRegistry::with_defaults();
//! let detection = registry.detect_bytes("logo", b"\x89PNG\r\n\x1a\n....").unwrap();
//! assert_eq!(detection.mime_type.to_string(), "image/png");
//! assert_eq!(detection.signature.as_deref(), Some("png"));
//! ```

mod builtin;
pub mod config;
pub mod cursor;
mod detection;
pub mod error;
pub mod mime;
pub mod probe;
pub mod registry;
pub mod resource;
#[cfg(feature = "filesystem")]
pub mod scan;
pub mod signature;
pub mod stream;

pub use config::{ConfigWarning, ProbeConfig, SignatureKind, SignatureSpec, generate_schema};
pub use cursor::ByteCursor;
pub use detection::{Detection, DetectionSource};
pub use error::{ProbeError, ProbeResult};
pub use mime::MimeType;
pub use probe::{BuiltinProber, HostProber, NullProber};
pub use registry::{
    BuiltinProvider, SignatureFactory, SignatureProvider, SignatureRegistry,
    SignatureRegistryBuilder,
};
pub use resource::{FileResource, MemoryResource, Resource};
#[cfg(feature = "filesystem")]
pub use scan::{ScanEntry, ScanReport, scan};
pub use signature::{Signature, SignatureInfo};
pub use stream::{SniffOptions, SniffableStream};
