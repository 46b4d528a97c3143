//! Content signatures: one rule each for recognising a media type.
//!
//! A signature inspects a [`SniffableStream`] and answers "is this my type?".
//! Archive signatures first install a decoding override on the stream; the
//! provided [`Signature::probe`] pairs that step with its removal so the
//! stream is back on its primary cursor when the next candidate runs.
//!
//! # Examples
//!
//! ```
//! use mimeprobe_core::mime::MimeType;
//! use mimeprobe_core::resource::MemoryResource;
//! use mimeprobe_core::signature::{ByteSignature, Signature, SignatureInfo};
//! use mimeprobe_core::stream::{SniffOptions, SniffableStream};
//!
//! let png = ByteSignature::new(
//!     SignatureInfo::new("png", MimeType::parse("image/png").unwrap()),
//!     b"\x89PNG\r\n\x1a\n".to_vec(),
//!     0,
//! );
//!
//! let resource = MemoryResource::new("logo", b"\x89PNG\r\n\x1a\n....".to_vec());
//! let mut stream = SniffableStream::open(&resource, SniffOptions::default()).unwrap();
//! assert!(png.probe(&mut stream).unwrap());
//! ```

mod archive;
mod bytes;
mod manifest;
mod xml;

pub use archive::{
    EntryContent, EntryPredicate, EntryPresent, JarSignature, ManifestPredicate, XmlEntry,
    ZipArchiveSignature, ZipArchiveXmlSignature, ZipEntries, ZipEntry, ZipSignature,
    ZippedXmlSignature,
};
pub use bytes::ByteSignature;
pub use manifest::JarManifest;
pub use xml::{SchemaPattern, XmlIdentity, XmlMatcher, XmlSignature};

use crate::error::ProbeResult;
use crate::mime::MimeType;
use crate::stream::SniffableStream;

/// Metadata shared by every signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    /// Short unique identifier, used for listing and disabling.
    pub id: String,
    /// The media type reported when the signature matches.
    pub target: MimeType,
    /// Format revision reported alongside `target`.
    pub format_version: Option<String>,
    /// Host types under which the signature is indexed. Empty means the
    /// signature is tried for every resource.
    pub hints: Vec<MimeType>,
}

impl SignatureInfo {
    pub fn new(id: impl Into<String>, target: MimeType) -> Self {
        Self {
            id: id.into(),
            target,
            format_version: None,
            hints: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.format_version = Some(version.into());
        self
    }

    pub fn with_hint(mut self, hint: MimeType) -> Self {
        self.hints.push(hint);
        self
    }

    pub fn with_hints(mut self, hints: impl IntoIterator<Item = MimeType>) -> Self {
        self.hints.extend(hints);
        self
    }
}

/// A single content-matching rule.
///
/// # Object Safety
///
/// Signatures are stored as `Arc<dyn Signature>` in the registry and shared
/// across threads, so implementors must be `Send + Sync` and keep no
/// per-call state.
pub trait Signature: Send + Sync {
    fn info(&self) -> &SignatureInfo;

    /// Identifier used in logs. Defaults to [`SignatureInfo::id`].
    fn name(&self) -> &str {
        &self.info().id
    }

    /// Install whatever decoding override the signature reads through.
    /// Plain signatures read the raw bytes and leave this as a no-op.
    fn prepare_stream(&self, _stream: &mut SniffableStream<'_>) -> ProbeResult<()> {
        Ok(())
    }

    /// Decide whether the (possibly overridden) stream is this signature's
    /// type.
    fn matches(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool>;

    /// Run `prepare_stream` and `matches` inside an override scope. The
    /// override is removed however the attempt ends.
    fn probe(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool> {
        let mut scope = stream.scoped();
        self.prepare_stream(&mut scope)?;
        self.matches(&mut scope)
    }
}

impl std::fmt::Debug for dyn Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("id", &self.info().id)
            .field("target", &self.info().target.to_string())
            .finish()
    }
}
