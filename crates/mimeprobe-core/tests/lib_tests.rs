//! End-to-end detection through the public API: the built-in catalogue,
//! custom signatures, failure isolation and the override protocol.

#![allow(clippy::useless_vec)]

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use mimeprobe_core::resource::ReadSeek;
use mimeprobe_core::signature::{
    ByteSignature, EntryPresent, XmlSignature, ZipArchiveSignature, ZipSignature,
};
use mimeprobe_core::stream::BoxedRead;
use mimeprobe_core::*;

// ============================================================================
// Fixtures
// ============================================================================

fn mime(value: &str) -> MimeType {
    MimeType::parse(value).unwrap()
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn odt() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let stored = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    writer.start_file("mimetype", stored).unwrap();
    writer
        .write_all(b"application/vnd.oasis.opendocument.text")
        .unwrap();
    writer
        .start_file("content.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"<office:document-content/>").unwrap();
    writer.finish().unwrap().into_inner()
}

fn docx() -> Vec<u8> {
    zip_bytes(&[
        ("[Content_Types].xml", b"<Types/>"),
        ("word/document.xml", b"<w:document/>"),
    ])
}

fn jar() -> Vec<u8> {
    zip_bytes(&[
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\nMain-Class: App\r\n\r\n"),
        ("App.class", b"\xCA\xFE\xBA\xBE\x00\x00\x00\x34"),
    ])
}

fn kmz() -> Vec<u8> {
    zip_bytes(&[
        (
            "doc.kml",
            br#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2"><Document/></kml>"#,
        ),
        ("files/icon.png", b"\x89PNG\r\n\x1a\n"),
    ])
}

const XHTML_STRICT: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN"
  "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>t</title></head></html>"#;

const HTML_401: &[u8] = br#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">
<html><head><title>t</title></head><body></body></html>"#;

const GPX_11: &[u8] = br#"<?xml version="1.0"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1"><trk/></gpx>"#;

const GPX_10: &[u8] = br#"<?xml version="1.0"?>
<gpx version="1.0" creator="test" xmlns="http://www.topografix.com/GPX/1/0"><trk/></gpx>"#;

const SVG: &[u8] = br#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"/>"#;

const GML: &[u8] = br#"<?xml version="1.0"?>
<gml:FeatureCollection xmlns:gml="http://www.opengis.net/gml"><gml:featureMember/></gml:FeatureCollection>"#;

// ============================================================================
// Test signatures
// ============================================================================

#[derive(Clone, Copy)]
enum Failure {
    Error,
    Application,
    Panic,
}

/// Installs a pass-through override, then fails.
struct FailingSignature {
    info: SignatureInfo,
    failure: Failure,
}

impl FailingSignature {
    fn new(id: &str, failure: Failure) -> Self {
        Self {
            info: SignatureInfo::new(id, mime("application/x-broken")),
            failure,
        }
    }
}

impl Signature for FailingSignature {
    fn info(&self) -> &SignatureInfo {
        &self.info
    }

    fn prepare_stream(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<()> {
        stream.open_override(|reader: Box<dyn ReadSeek>| Ok(Box::new(reader) as BoxedRead))
    }

    fn matches(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool> {
        assert!(stream.has_override());
        match self.failure {
            Failure::Error => Err(ProbeError::Malformed {
                format: "test",
                message: "always fails".to_string(),
            }),
            Failure::Application => Err(anyhow::anyhow!("vendor decoder unavailable")
                .context("probing vendor format")
                .into()),
            Failure::Panic => panic!("signature exploded"),
        }
    }
}

fn foob() -> Arc<dyn Signature> {
    Arc::new(ByteSignature::new(
        SignatureInfo::new("foo", mime("application/x-foo")),
        b"FOOB".to_vec(),
        0,
    ))
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_unhinted_byte_signature_detects() {
    let registry = SignatureRegistry::new();
    registry.register(foob());

    let detection = registry.detect_bytes("data", b"FOOB......").unwrap();
    assert_eq!(detection.mime_type, mime("application/x-foo"));
    assert_eq!(detection.format_version, None);
    assert_eq!(detection.source, DetectionSource::Signature);
}

#[test]
fn test_dtd_signature_by_public_id() {
    let registry = SignatureRegistry::new();
    registry.register(Arc::new(XmlSignature::dtd(
        SignatureInfo::new("html", mime("text/html")),
        Some("-//W3C//DTD HTML 4.01//EN"),
        None,
    )));

    let matching = registry.detect_bytes("page", HTML_401).unwrap();
    assert_eq!(matching.signature.as_deref(), Some("html"));

    let lower = br#"<!DOCTYPE html PUBLIC "-//w3c//dtd html 4.01//en"><html/>"#;
    assert_eq!(
        registry.detect_bytes("page", lower).unwrap().signature.as_deref(),
        Some("html")
    );

    let other = br#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 3.2 Final//EN"><html/>"#;
    assert!(registry.detect_bytes("page", other).unwrap().signature.is_none());
    assert!(registry.detect_bytes("page", b"<html/>").unwrap().signature.is_none());
}

#[test]
fn test_zip_archive_signature_requires_entry() {
    let registry = SignatureRegistry::new();
    registry.register(Arc::new(ZipArchiveSignature::new(
        SignatureInfo::new("content", mime("application/x-content")),
        Some("content.xml".to_string()),
        EntryPresent,
    )));

    let with_entry = zip_bytes(&[("content.xml", b"<doc/>")]);
    let without_entry = zip_bytes(&[("other.xml", b"<doc/>")]);
    assert_eq!(
        registry.detect_bytes("a", &with_entry).unwrap().signature.as_deref(),
        Some("content")
    );
    assert!(
        registry
            .detect_bytes("a", &without_entry)
            .unwrap()
            .signature
            .is_none()
    );
}

#[test]
fn test_is_content_type_zip_behind_generic_hint() {
    let registry = SignatureRegistry::with_defaults();
    let resource = MemoryResource::new("upload.bin", docx());

    assert!(registry.is_content_type(&resource, &MimeType::zip()).unwrap());
    assert!(
        registry
            .is_content_type(
                &resource,
                &mime("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
            )
            .unwrap()
    );
    assert!(!registry.is_content_type(&resource, &mime("image/png")).unwrap());
}

#[test]
fn test_is_content_type_uses_host_hint() {
    let registry = SignatureRegistry::new();
    let resource = MemoryResource::new("notes", b"anything".to_vec())
        .with_declared_type(mime("text/plain; charset=utf-8"));
    assert!(registry.is_content_type(&resource, &mime("TEXT/Plain")).unwrap());
}

#[test]
fn test_unreachable_resource_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SignatureRegistry::with_defaults();

    let err = registry.detect_path(dir.path().join("missing.png")).unwrap_err();
    assert!(matches!(err, ProbeError::Unreachable { .. }));
    assert!(err.is_fatal());

    // A directory is not a regular file either.
    assert!(matches!(
        registry.detect_path(dir.path()),
        Err(ProbeError::Unreachable { .. })
    ));
    assert!(
        registry
            .is_content_type_path(dir.path().join("missing"), &MimeType::zip())
            .is_err()
    );
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_override_removed_after_error_and_panic() {
    let resource = MemoryResource::new("x", b"FOOB".to_vec());
    let mut stream = SniffableStream::open(&resource, SniffOptions::default()).unwrap();

    let erroring = FailingSignature::new("err", Failure::Error);
    assert!(erroring.probe(&mut stream).is_err());
    assert!(!stream.has_override());

    let application = FailingSignature::new("app", Failure::Application);
    assert!(matches!(
        application.probe(&mut stream),
        Err(ProbeError::Other(_))
    ));
    assert!(!stream.has_override());

    let panicking = FailingSignature::new("panic", Failure::Panic);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| panicking.probe(&mut stream)));
    assert!(outcome.is_err());
    assert!(!stream.has_override());

    // The primary cursor is still usable.
    assert_eq!(stream.read_at(0, 4).unwrap(), b"FOOB");
}

#[test]
fn test_first_match_wins() {
    let registry = SignatureRegistry::new();
    let first: Arc<dyn Signature> = Arc::new(ByteSignature::new(
        SignatureInfo::new("first", mime("application/x-first")),
        b"FO".to_vec(),
        0,
    ));
    registry.register(first);
    registry.register(foob());

    let detection = registry.detect_bytes("x", b"FOOB").unwrap();
    assert_eq!(detection.signature.as_deref(), Some("first"));
}

#[test]
fn test_failing_signatures_are_isolated() {
    let registry = SignatureRegistry::new();
    registry.register(Arc::new(FailingSignature::new("err", Failure::Error)));
    registry.register(Arc::new(FailingSignature::new("app", Failure::Application)));
    registry.register(Arc::new(FailingSignature::new("panic", Failure::Panic)));
    registry.register(foob());

    let detection = registry.detect_bytes("x", b"FOOB").unwrap();
    assert_eq!(detection.signature.as_deref(), Some("foo"));

    let resource = MemoryResource::new("x", b"FOOB".to_vec());
    assert!(
        registry
            .is_content_type(&resource, &mime("application/x-foo"))
            .unwrap()
    );
}

#[test]
fn test_zip_magic_byte_signature() {
    let signature = ByteSignature::new(
        SignatureInfo::new("pk", MimeType::zip()),
        b"PK\x03\x04".to_vec(),
        0,
    );
    let probe = |bytes: &[u8]| {
        let resource = MemoryResource::new("x", bytes.to_vec());
        let mut stream = SniffableStream::open(&resource, SniffOptions::default()).unwrap();
        signature.probe(&mut stream).unwrap()
    };
    assert!(probe(b"PK\x03\x04rest"));
    assert!(probe(b"PK\x03\x04"));
    assert!(!probe(b"PK\x03\x05rest"));
    assert!(!probe(b"QK\x03\x04"));
    assert!(!probe(b"PK\x03"));
}

#[test]
fn test_candidates_hinted_before_unhinted_without_duplicates() {
    let registry = SignatureRegistry::with_defaults();
    let candidates = registry.candidates_for(&MimeType::octet_stream());

    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
    let first_unhinted = candidates
        .iter()
        .position(|s| s.info().hints.is_empty())
        .unwrap();
    assert!(
        candidates[first_unhinted..]
            .iter()
            .all(|s| s.info().hints.is_empty())
    );
}

#[test]
fn test_plain_zip_is_not_a_jar() {
    let registry = SignatureRegistry::with_defaults();
    let plain = zip_bytes(&[("readme.txt", b"hello")]);
    let detection = registry.detect_bytes("lib.jar", &plain).unwrap();
    assert_eq!(detection.signature.as_deref(), Some("zip"));
    assert_eq!(detection.mime_type, MimeType::zip());
    assert_eq!(detection.host_hint, Some(MimeType::java_archive()));
}

#[test]
fn test_registration_while_detecting() {
    let registry = Arc::new(SignatureRegistry::new());
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                for _ in 0..50 {
                    registry.detect_bytes("x", b"FOOB").unwrap();
                }
            });
        }
        registry.register(foob());
    });
    assert_eq!(
        registry.detect_bytes("x", b"FOOB").unwrap().signature.as_deref(),
        Some("foo")
    );
}

// ============================================================================
// Built-in catalogue
// ============================================================================

fn detect(name: &str, bytes: &[u8]) -> Detection {
    SignatureRegistry::with_defaults()
        .detect_bytes(name, bytes)
        .unwrap()
}

#[test]
fn test_builtin_archives() {
    let cases: Vec<(&str, Vec<u8>, &str, &str)> = vec![
        ("doc.odt", odt(), "odf-text", "application/vnd.oasis.opendocument.text"),
        ("upload.bin", odt(), "odf-text", "application/vnd.oasis.opendocument.text"),
        (
            "upload.bin",
            docx(),
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("lib.bin", jar(), "jar", "application/java-archive"),
        ("map.bin", kmz(), "kmz", "application/vnd.google-earth.kmz"),
        ("map.kmz", kmz(), "kmz", "application/vnd.google-earth.kmz"),
    ];
    for (name, bytes, id, target) in cases {
        let detection = detect(name, &bytes);
        assert_eq!(detection.signature.as_deref(), Some(id), "{name}");
        assert_eq!(detection.mime_type.to_string(), target, "{name}");
    }
}

#[test]
fn test_builtin_xml_vocabularies() {
    let cases: Vec<(&str, &[u8], &str, Option<&str>)> = vec![
        ("page.xhtml", XHTML_STRICT, "xhtml-1.0-strict", Some("1.0")),
        ("page.bin", XHTML_STRICT, "xhtml-1.0-strict", Some("1.0")),
        ("page.html", HTML_401, "html-4.01", Some("4.01")),
        ("track.gpx", GPX_11, "gpx-1.1", Some("1.1")),
        ("track.xml", GPX_10, "gpx-1.0", Some("1.0")),
        ("icon.svg", SVG, "svg", None),
        ("features.xml", GML, "gml", None),
    ];
    for (name, bytes, id, version) in cases {
        let detection = detect(name, bytes);
        assert_eq!(detection.signature.as_deref(), Some(id), "{name}");
        assert_eq!(detection.format_version.as_deref(), version, "{name}");
    }

    let kml = br#"<kml xmlns="http://earth.google.com/kml/2.1"><Placemark/></kml>"#;
    let detection = detect("places.kml", kml);
    assert_eq!(detection.signature.as_deref(), Some("kml"));
    assert_eq!(detection.format_version.as_deref(), Some("2.2"));
}

#[test]
fn test_builtin_generic_xml_is_last_resort() {
    let detection = detect("note.xml", br#"<?xml version="1.0"?><note/>"#);
    assert_eq!(detection.signature.as_deref(), Some("xml"));
    assert_eq!(detection.mime_type, MimeType::xml());
}

#[test]
fn test_builtin_magic_bytes() {
    let cases: Vec<(&[u8], &str, Option<&str>)> = vec![
        (b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR", "image/png", None),
        (b"GIF87a\x01\x00\x01\x00", "image/gif", Some("87a")),
        (b"GIF89a\x01\x00\x01\x00", "image/gif", Some("89a")),
        (b"\xFF\xD8\xFF\xE0\x00\x10JFIF", "image/jpeg", None),
        (b"%PDF-1.7\n%\xE2\xE3\xCF\xD3", "application/pdf", None),
        (b"\x1F\x8B\x08\x00\x00\x00\x00\x00", "application/gzip", None),
        (
            b"\x00\x00\x27\x0a\x00\x00\x00\x00\x00\x00\x00\x00",
            "application/x-esri-shape",
            None,
        ),
    ];
    for (bytes, target, version) in cases {
        let detection = detect("blob", bytes);
        assert_eq!(detection.mime_type.to_string(), target);
        assert_eq!(detection.format_version.as_deref(), version);
    }
}

#[test]
fn test_fallback_to_hint_then_unknown() {
    let text = detect("notes.txt", b"just some words");
    assert_eq!(text.source, DetectionSource::HostHint);
    assert_eq!(text.mime_type, mime("text/plain"));
    assert!(text.signature.is_none());

    let unknown = detect("blob", b"\x01\x02\x03\x04");
    assert!(unknown.is_unknown());
    assert_eq!(unknown.mime_type, MimeType::octet_stream());
    assert_eq!(unknown.host_hint, None);
}

#[test]
fn test_declared_type_selects_bucket() {
    let registry = SignatureRegistry::with_defaults();
    let resource = MemoryResource::new("upload", docx()).with_declared_type(MimeType::zip());
    let detection = registry.detect(&resource).unwrap();
    assert_eq!(detection.signature.as_deref(), Some("docx"));
    assert_eq!(detection.host_hint, Some(MimeType::zip()));
}

#[test]
fn test_format_version_and_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let gif = dir.path().join("anim.gif");
    std::fs::write(&gif, b"GIF87a\x01\x00\x01\x00").unwrap();
    let jar_path = dir.path().join("app.jar");
    std::fs::write(&jar_path, jar()).unwrap();

    let registry = SignatureRegistry::with_defaults();
    assert_eq!(
        registry.format_version(&FileResource::new(&gif)).unwrap().as_deref(),
        Some("87a")
    );
    assert_eq!(
        registry.detect_path(&jar_path).unwrap().signature.as_deref(),
        Some("jar")
    );
    assert!(
        registry
            .is_content_type_path(&jar_path, &MimeType::java_archive())
            .unwrap()
    );

    let url = format!("file://{}", jar_path.display());
    let resource = resource::resource_for(&url);
    assert_eq!(
        registry.detect(&resource).unwrap().signature.as_deref(),
        Some("jar")
    );
}

#[test]
fn test_entry_size_limit_applies() {
    let big = vec![b'x'; 4096];
    let archive = zip_bytes(&[("mimetype", b"application/vnd.oasis.opendocument.text"), ("big", big.as_slice())]);
    let registry = SignatureRegistry::builder()
        .with_defaults()
        .with_options(SniffOptions {
            max_entry_size: 8,
            ..SniffOptions::default()
        })
        .build();
    // The mimetype entry is longer than the limit, so it can no longer be
    // compared; the archive is still a ZIP.
    let detection = registry.detect_bytes("doc.bin", &archive).unwrap();
    assert_eq!(detection.signature.as_deref(), Some("zip"));
}

#[test]
fn test_zip_signature_on_corrupt_archive() {
    let registry = SignatureRegistry::new();
    registry.register(Arc::new(ZipSignature::new(SignatureInfo::new(
        "zip",
        MimeType::zip(),
    ))));
    let mut archive = docx();
    let len = archive.len();
    archive.truncate(len / 2);
    assert!(registry.detect_bytes("x.zip", &archive).unwrap().signature.is_none());
}
