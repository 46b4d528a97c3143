//! Resource abstraction for dependency injection in detection.
//!
//! A [`Resource`] names something whose content can be opened any number of
//! times: the registry opens it once for the primary cursor, and ZIP
//! signatures reopen it to decode nested streams.
//!
//! Production code uses [`FileResource`]; tests and in-memory callers use
//! [`MemoryResource`]:
//!
//! ```
//! use mimeprobe_core::resource::{MemoryResource, Resource};
//!
//! let resource = MemoryResource::new("hello.txt", b"hello".to_vec());
//! assert_eq!(resource.locator(), "hello.txt");
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::mime::MimeType;

/// Readers handed out by resources: sequential reads plus seeking for
/// central-directory ZIP access.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Something that can be (re)opened for sniffing.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Human-readable identity, also fed to the host prober.
    fn locator(&self) -> &str;

    /// Open a fresh reader positioned at the first byte.
    fn open(&self) -> io::Result<Box<dyn ReadSeek>>;

    /// Content type declared by the transport, if any. Takes precedence over
    /// the host prober.
    fn declared_type(&self) -> Option<MimeType> {
        None
    }
}

/// A regular file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
    locator: String,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let locator = path.display().to_string();
        Self { path, locator }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for FileResource {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn open(&self) -> io::Result<Box<dyn ReadSeek>> {
        let metadata = std::fs::metadata(&self.path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", self.path.display()),
            ));
        }
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Shared in-memory bytes.
#[derive(Clone)]
pub struct MemoryResource {
    name: String,
    bytes: Arc<[u8]>,
    declared: Option<MimeType>,
}

impl MemoryResource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            declared: None,
        }
    }

    /// Attach a transport-declared content type (as an HTTP header would).
    pub fn with_declared_type(mut self, mime: MimeType) -> Self {
        self.declared = Some(mime);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for MemoryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryResource")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .field("declared", &self.declared)
            .finish()
    }
}

impl Resource for MemoryResource {
    fn locator(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn ReadSeek>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }

    fn declared_type(&self) -> Option<MimeType> {
        self.declared.clone()
    }
}

/// Build a resource from a locator string: a `file://` URL or a plain path.
pub fn resource_for(locator: &str) -> FileResource {
    match locator.strip_prefix("file://") {
        // file:///abs/path keeps its leading slash; file://localhost/... drops the host.
        Some(rest) => {
            let path = rest.strip_prefix("localhost").unwrap_or(rest);
            FileResource::new(path)
        }
        None => FileResource::new(locator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_memory_resource_reopens_from_start() {
        let resource = MemoryResource::new("mem", b"abcdef".to_vec());
        let mut first = resource.open().unwrap();
        let mut buf = [0u8; 3];
        first.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        let mut second = resource.open().unwrap();
        let mut all = Vec::new();
        second.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"abcdef");
    }

    #[test]
    fn test_memory_resource_declared_type() {
        let resource = MemoryResource::new("mem", Vec::new()).with_declared_type(MimeType::zip());
        assert_eq!(resource.declared_type(), Some(MimeType::zip()));
    }

    #[test]
    fn test_file_resource_missing_fails() {
        let resource = FileResource::new("/definitely/not/here.bin");
        assert!(resource.open().is_err());
    }

    #[test]
    fn test_file_resource_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let resource = FileResource::new(dir.path());
        let Err(err) = resource.open() else {
            panic!("directory opened as a resource");
        };
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_file_resource_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let mut reader = FileResource::new(&path).open().unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "%PDF-1.7");
    }

    #[test]
    fn test_resource_for_file_url() {
        assert_eq!(
            resource_for("file:///tmp/a.zip").path(),
            Path::new("/tmp/a.zip")
        );
        assert_eq!(
            resource_for("file://localhost/tmp/a.zip").path(),
            Path::new("/tmp/a.zip")
        );
        assert_eq!(resource_for("rel/b.xml").path(), Path::new("rel/b.xml"));
    }
}
