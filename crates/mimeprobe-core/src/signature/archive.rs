//! ZIP-based signatures: plain ZIP, JAR, entry inspection and zipped XML.
//!
//! Every signature here installs the same decoding override in
//! `prepare_stream`: the resource is reopened, its central directory is
//! read, and the current cursor becomes the first file entry. The entry is
//! only decompressed when the override cursor is first read, so signatures
//! that never look at it pay for the directory alone. Signatures that need
//! other entries reopen the resource again and walk the archive with
//! [`ZipEntries`].

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use zip::ZipArchive;
use zip::result::ZipError;

use super::manifest::JarManifest;
use super::xml::{SchemaPattern, XmlIdentity, XmlMatcher, identity_or_none, sniff_identity};
use super::{Signature, SignatureInfo};
use crate::error::{ProbeError, ProbeResult};
use crate::resource::ReadSeek;
use crate::stream::{BoxedRead, SniffableStream};

/// Location of the manifest inside a JAR.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

fn zip_error(e: ZipError) -> ProbeError {
    ProbeError::malformed("zip", e)
}

/// One decoded archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    /// Decompressed bytes, capped at the entry size limit.
    pub data: Vec<u8>,
    pub is_dir: bool,
    /// `true` when the entry was longer than the limit.
    pub truncated: bool,
}

/// Entry-by-entry view of an archive, in central directory order.
pub struct ZipEntries {
    archive: ZipArchive<Box<dyn ReadSeek>>,
    next: usize,
    limit: u64,
}

impl ZipEntries {
    /// Read the central directory of `reader`. Entry data is decoded lazily,
    /// at most `limit` bytes per entry.
    pub fn open(reader: Box<dyn ReadSeek>, limit: u64) -> ProbeResult<Self> {
        let archive = ZipArchive::new(reader).map_err(zip_error)?;
        Ok(Self {
            archive,
            next: 0,
            limit,
        })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Next entry in order, directories included.
    pub fn next_entry(&mut self) -> ProbeResult<Option<ZipEntry>> {
        self.advance_to(|_, _| true)
    }

    /// Next entry that is not a directory.
    pub fn next_file(&mut self) -> ProbeResult<Option<ZipEntry>> {
        self.advance_to(|_, is_dir| !is_dir)
    }

    /// Scan forward for the entry named exactly `name` (case-sensitive).
    pub fn find(&mut self, name: &str) -> ProbeResult<Option<ZipEntry>> {
        self.advance_to(|entry_name, _| entry_name == name)
    }

    /// Random-access lookup through the central directory. Does not move
    /// the scan position.
    pub fn by_name(&mut self, name: &str) -> ProbeResult<Option<ZipEntry>> {
        let limit = self.limit;
        match self.archive.by_name(name) {
            Ok(mut file) => {
                let entry_name = file.name().to_string();
                let is_dir = file.is_dir();
                let (data, truncated) = drain(&mut file, limit)?;
                Ok(Some(ZipEntry {
                    name: entry_name,
                    data,
                    is_dir,
                    truncated,
                }))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(zip_error(e)),
        }
    }

    /// Skip entries (reading only their headers) until `wanted` accepts one,
    /// then decode that entry.
    fn advance_to<F>(&mut self, wanted: F) -> ProbeResult<Option<ZipEntry>>
    where
        F: Fn(&str, bool) -> bool,
    {
        while self.next < self.archive.len() {
            let index = self.next;
            self.next += 1;
            let accepted = {
                let raw = self.archive.by_index_raw(index).map_err(zip_error)?;
                wanted(raw.name(), raw.is_dir())
            };
            if accepted {
                return self.read_entry(index).map(Some);
            }
        }
        Ok(None)
    }

    fn read_entry(&mut self, index: usize) -> ProbeResult<ZipEntry> {
        let limit = self.limit;
        let mut file = self.archive.by_index(index).map_err(zip_error)?;
        let name = file.name().to_string();
        let is_dir = file.is_dir();
        let (data, truncated) = drain(&mut file, limit)?;
        Ok(ZipEntry {
            name,
            data,
            is_dir,
            truncated,
        })
    }
}

impl fmt::Debug for ZipEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipEntries")
            .field("len", &self.archive.len())
            .field("next", &self.next)
            .field("limit", &self.limit)
            .finish()
    }
}

/// Read up to `limit` bytes and report whether more remained.
fn drain<R: Read>(mut reader: R, limit: u64) -> ProbeResult<(Vec<u8>, bool)> {
    let mut data = Vec::new();
    (&mut reader)
        .take(limit)
        .read_to_end(&mut data)
        .map_err(|e| ProbeError::malformed("zip", e))?;
    let mut extra = [0u8; 1];
    let truncated = data.len() as u64 == limit
        && reader
            .read(&mut extra)
            .map_err(|e| ProbeError::malformed("zip", e))?
            > 0;
    Ok((data, truncated))
}

/// First file entry of an archive, decompressed on the first read.
struct FirstEntry {
    pending: Option<ZipEntries>,
    decoded: Cursor<Vec<u8>>,
}

impl FirstEntry {
    /// Read the central directory of `raw`.
    ///
    /// An archive holding only directories decodes to an empty stream; an
    /// archive with no entries at all is malformed.
    fn open(raw: Box<dyn ReadSeek>, limit: u64) -> ProbeResult<Self> {
        let entries = ZipEntries::open(raw, limit)?;
        if entries.is_empty() {
            return Err(ProbeError::malformed("zip", "archive has no entries"));
        }
        Ok(Self {
            pending: Some(entries),
            decoded: Cursor::new(Vec::new()),
        })
    }

    fn is_decoded(&self) -> bool {
        self.pending.is_none()
    }
}

impl Read for FirstEntry {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if let Some(mut entries) = self.pending.take()
            && let Some(entry) = entries.next_file().map_err(io::Error::other)?
        {
            self.decoded = Cursor::new(entry.data);
        }
        self.decoded.read(out)
    }
}

/// Install the first-entry override on `stream`.
fn install_zip_override(stream: &mut SniffableStream<'_>) -> ProbeResult<()> {
    let limit = stream.options().max_entry_size;
    stream.open_override(move |raw| Ok(Box::new(FirstEntry::open(raw, limit)?) as BoxedRead))
}

/// Reopen the resource behind `stream` as an archive.
fn reopen_entries(stream: &SniffableStream<'_>) -> ProbeResult<ZipEntries> {
    ZipEntries::open(stream.reopen()?, stream.options().max_entry_size)
}

/// Any readable ZIP archive with at least one entry.
#[derive(Debug, Clone)]
pub struct ZipSignature {
    info: SignatureInfo,
}

impl ZipSignature {
    pub fn new(info: SignatureInfo) -> Self {
        Self { info }
    }
}

impl Signature for ZipSignature {
    fn info(&self) -> &SignatureInfo {
        &self.info
    }

    fn prepare_stream(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<()> {
        install_zip_override(stream)
    }

    fn matches(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool> {
        Ok(stream.has_override())
    }
}

/// Decides whether a parsed manifest belongs to the signature's type.
pub type ManifestPredicate = Arc<dyn Fn(&JarManifest) -> bool + Send + Sync>;

/// ZIP archive carrying a parseable `META-INF/MANIFEST.MF`.
#[derive(Clone)]
pub struct JarSignature {
    info: SignatureInfo,
    predicate: ManifestPredicate,
}

impl JarSignature {
    /// Any archive with a valid manifest.
    pub fn new(info: SignatureInfo) -> Self {
        Self::with_predicate(info, |_| true)
    }

    pub fn with_predicate<F>(info: SignatureInfo, predicate: F) -> Self
    where
        F: Fn(&JarManifest) -> bool + Send + Sync + 'static,
    {
        Self {
            info,
            predicate: Arc::new(predicate),
        }
    }

    /// Archives whose manifest main section has every attribute in `names`.
    pub fn require_attributes<I, S>(info: SignatureInfo, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        Self::with_predicate(info, move |manifest| {
            names.iter().all(|n| manifest.main_attribute(n).is_some())
        })
    }
}

impl fmt::Debug for JarSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JarSignature")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Signature for JarSignature {
    fn info(&self) -> &SignatureInfo {
        &self.info
    }

    fn prepare_stream(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<()> {
        install_zip_override(stream)
    }

    fn matches(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool> {
        let mut entries = reopen_entries(stream)?;
        let Some(entry) = entries.by_name(MANIFEST_PATH)? else {
            return Ok(false);
        };
        match JarManifest::parse(&entry.data) {
            Ok(manifest) => Ok((self.predicate)(&manifest)),
            Err(ProbeError::Malformed { message, .. }) => {
                tracing::debug!(locator = stream.locator(), %message, "unreadable manifest");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Per-entry test applied by [`ZipArchiveSignature`].
///
/// `entry` is the entry named by the signature, or `None` when the
/// signature names no entry and the predicate inspects the archive itself.
pub trait EntryPredicate: Send + Sync {
    fn test(&self, entries: &mut ZipEntries, entry: Option<&ZipEntry>) -> ProbeResult<bool>;
}

impl<F> EntryPredicate for F
where
    F: Fn(&mut ZipEntries, Option<&ZipEntry>) -> ProbeResult<bool> + Send + Sync,
{
    fn test(&self, entries: &mut ZipEntries, entry: Option<&ZipEntry>) -> ProbeResult<bool> {
        self(entries, entry)
    }
}

/// The named entry exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryPresent;

impl EntryPredicate for EntryPresent {
    fn test(&self, _entries: &mut ZipEntries, entry: Option<&ZipEntry>) -> ProbeResult<bool> {
        Ok(entry.is_some())
    }
}

/// The entry (or the first file entry) holds exactly `expected`, ignoring
/// surrounding ASCII whitespace.
#[derive(Debug, Clone)]
pub struct EntryContent {
    expected: Vec<u8>,
}

impl EntryContent {
    pub fn new(expected: impl Into<Vec<u8>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl EntryPredicate for EntryContent {
    fn test(&self, entries: &mut ZipEntries, entry: Option<&ZipEntry>) -> ProbeResult<bool> {
        let first;
        let entry = match entry {
            Some(entry) => entry,
            None => match entries.next_file()? {
                Some(found) => {
                    first = found;
                    &first
                }
                None => return Ok(false),
            },
        };
        Ok(!entry.truncated && entry.data.trim_ascii() == self.expected.trim_ascii())
    }
}

/// The entry (or the first file entry) parses as XML accepted by `matcher`.
#[derive(Debug, Clone)]
pub struct XmlEntry {
    root_element: Option<String>,
    matcher: XmlMatcher,
}

impl XmlEntry {
    pub fn new(root_element: Option<String>, matcher: XmlMatcher) -> Self {
        Self {
            root_element,
            matcher,
        }
    }
}

impl EntryPredicate for XmlEntry {
    fn test(&self, entries: &mut ZipEntries, entry: Option<&ZipEntry>) -> ProbeResult<bool> {
        let first;
        let entry = match entry {
            Some(entry) => entry,
            None => match entries.next_file()? {
                Some(found) => {
                    first = found;
                    &first
                }
                None => return Ok(false),
            },
        };
        let identity = identity_or_none(XmlIdentity::extract(
            entry.data.as_slice(),
            self.root_element.as_deref(),
        ))?;
        Ok(identity.is_some_and(|id| self.matcher.is_match(&id)))
    }
}

/// ZIP archive recognised by one of its entries.
pub struct ZipArchiveSignature<P> {
    info: SignatureInfo,
    inner_entry: Option<String>,
    predicate: P,
}

/// Entry signature whose predicate reads the entry as XML.
pub type ZipArchiveXmlSignature = ZipArchiveSignature<XmlEntry>;

impl<P: EntryPredicate> ZipArchiveSignature<P> {
    pub fn new(info: SignatureInfo, inner_entry: Option<String>, predicate: P) -> Self {
        Self {
            info,
            inner_entry,
            predicate,
        }
    }

    pub fn inner_entry(&self) -> Option<&str> {
        self.inner_entry.as_deref()
    }
}

impl ZipArchiveSignature<XmlEntry> {
    /// Entry identified by DOCTYPE public or system identifier.
    pub fn dtd(
        info: SignatureInfo,
        inner_entry: Option<String>,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Self {
        Self::new(
            info,
            inner_entry,
            XmlEntry::new(None, XmlMatcher::dtd(public_id, system_id)),
        )
    }

    /// Entry identified by the namespace of `root_element`.
    pub fn xsl(
        info: SignatureInfo,
        inner_entry: Option<String>,
        root_element: impl Into<String>,
        schema: SchemaPattern,
    ) -> Self {
        Self::new(
            info,
            inner_entry,
            XmlEntry::new(Some(root_element.into()), XmlMatcher::schema(schema)),
        )
    }
}

impl<P> fmt::Debug for ZipArchiveSignature<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchiveSignature")
            .field("info", &self.info)
            .field("inner_entry", &self.inner_entry)
            .finish_non_exhaustive()
    }
}

impl<P: EntryPredicate> Signature for ZipArchiveSignature<P> {
    fn info(&self) -> &SignatureInfo {
        &self.info
    }

    fn prepare_stream(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<()> {
        install_zip_override(stream)
    }

    fn matches(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool> {
        let mut entries = reopen_entries(stream)?;
        match &self.inner_entry {
            Some(name) => match entries.find(name)? {
                Some(entry) => self.predicate.test(&mut entries, Some(&entry)),
                None => Ok(false),
            },
            None => self.predicate.test(&mut entries, None),
        }
    }
}

/// Compressed XML document: the archive's first file entry, read as XML.
#[derive(Debug, Clone)]
pub struct ZippedXmlSignature {
    info: SignatureInfo,
    root_element: Option<String>,
    matcher: XmlMatcher,
}

impl ZippedXmlSignature {
    pub fn new(info: SignatureInfo, root_element: Option<String>, matcher: XmlMatcher) -> Self {
        Self {
            info,
            root_element,
            matcher,
        }
    }

    /// First entry identified by the namespace of `root_element`.
    pub fn xsl(info: SignatureInfo, root_element: impl Into<String>, schema: SchemaPattern) -> Self {
        Self::new(info, Some(root_element.into()), XmlMatcher::schema(schema))
    }
}

impl Signature for ZippedXmlSignature {
    fn info(&self) -> &SignatureInfo {
        &self.info
    }

    fn prepare_stream(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<()> {
        install_zip_override(stream)
    }

    fn matches(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool> {
        if !stream.has_override() {
            return Ok(false);
        }
        let identity = sniff_identity(stream, self.root_element.as_deref())?;
        Ok(identity.is_some_and(|id| self.matcher.is_match(&id)))
    }
}
