//! Host-level content-type probing.
//!
//! The host prober is the coarse, platform-style guess (by name and a few
//! leading bytes) that partitions the signature registry. Its answer is a
//! hint, not a verdict: signatures registered under the hint are tried
//! first, and the hint is only reported when no signature matches.

use crate::mime::MimeType;

/// A low-level content-type guesser.
pub trait HostProber: Send + Sync {
    /// Guess the type of the resource named `locator` whose first bytes are
    /// `head`. Return `None` when the type is unknown.
    fn probe(&self, locator: &str, head: &[u8]) -> Option<MimeType>;

    /// Human-readable name for this prober (used in logging).
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// File extensions (lowercase) and the host type reported for them.
pub const EXTENSION_TYPES: &[(&str, &str)] = &[
    ("zip", "application/zip"),
    ("jar", "application/java-archive"),
    ("war", "application/java-archive"),
    ("ear", "application/java-archive"),
    ("xml", "application/xml"),
    ("xsl", "application/xml"),
    ("xsd", "application/xml"),
    ("dtd", "application/xml-dtd"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("xhtml", "application/xhtml+xml"),
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("gz", "application/gzip"),
    ("kml", "application/vnd.google-earth.kml+xml"),
    ("kmz", "application/vnd.google-earth.kmz"),
    ("gpx", "application/gpx+xml"),
    ("gml", "application/gml+xml"),
    ("shp", "application/x-esri-shape"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("odg", "application/vnd.oasis.opendocument.graphics"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("class", "application/java-vm"),
];

/// Leading-byte patterns recognised when the name gives no answer.
const HEAD_PATTERNS: &[(&[u8], &str)] = &[
    (b"<?xml", "application/xml"),
    (b"<!DOCTYPE html", "text/html"),
    (b"<!doctype html", "text/html"),
    (b"<html", "text/html"),
    (b"<HTML", "text/html"),
    (b"%PDF-", "application/pdf"),
    (b"\xCA\xFE\xBA\xBE", "application/java-vm"),
];

/// Extract the lowercase extension of the last path segment of `locator`.
fn extension(locator: &str) -> Option<String> {
    let segment = locator.rsplit(['/', '\\']).next().unwrap_or(locator);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Skip a UTF-8 byte order mark and leading ASCII whitespace.
fn trim_head(head: &[u8]) -> &[u8] {
    let head = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    &head[start..]
}

/// Built-in prober: extension table first, then leading-byte patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProber;

impl HostProber for BuiltinProber {
    fn probe(&self, locator: &str, head: &[u8]) -> Option<MimeType> {
        if let Some(ext) = extension(locator)
            && let Some((_, mime)) = EXTENSION_TYPES.iter().find(|(e, _)| *e == ext)
        {
            return MimeType::parse(mime).ok();
        }

        let head = trim_head(head);
        HEAD_PATTERNS
            .iter()
            .find(|(pattern, _)| head.starts_with(pattern))
            .and_then(|(_, mime)| MimeType::parse(mime).ok())
    }

    fn name(&self) -> &str {
        "BuiltinProber"
    }
}

/// Prober that never knows anything; every resource gets the
/// `application/octet-stream` placeholder hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProber;

impl HostProber for NullProber {
    fn probe(&self, _locator: &str, _head: &[u8]) -> Option<MimeType> {
        None
    }
}
