//! Built-in signature catalogue.
//!
//! Order matters: within a hint bucket the first match wins, so specific
//! archive formats come before the generic ZIP signature and specific XML
//! vocabularies before generic XML.

use std::sync::Arc;

use crate::mime::MimeType;
use crate::registry::SignatureFactory;
use crate::signature::{
    ByteSignature, EntryContent, EntryPresent, JarSignature, SchemaPattern, Signature,
    SignatureInfo, XmlMatcher, XmlSignature, ZipArchiveSignature, ZipSignature,
    ZippedXmlSignature,
};

pub(crate) const DEFAULTS: &[SignatureFactory] = &[
    odf_text,
    odf_spreadsheet,
    odf_presentation,
    odf_graphics,
    ooxml_document,
    ooxml_workbook,
    ooxml_presentation,
    kmz,
    jar,
    zip,
    xhtml_strict,
    xhtml_transitional,
    html_401,
    kml,
    gpx_10,
    gpx_11,
    svg,
    gml,
    png,
    gif87a,
    gif89a,
    jpeg,
    pdf,
    gzip,
    shapefile,
    xml,
];

// ============================================================================
// Hints
// ============================================================================

fn mime(primary: &str, sub: &str) -> MimeType {
    MimeType::from_parts(primary, sub)
}

/// Host types a ZIP container is commonly reported as.
fn zip_hints(target: &MimeType) -> Vec<MimeType> {
    vec![
        MimeType::zip(),
        MimeType::java_archive(),
        MimeType::octet_stream(),
        target.clone(),
    ]
}

/// Host types an XML document is commonly reported as.
fn xml_hints(target: &MimeType) -> Vec<MimeType> {
    vec![
        MimeType::xml(),
        mime("text", "xml"),
        MimeType::octet_stream(),
        mime("text", "plain"),
        target.clone(),
    ]
}

fn zip_info(id: &str, target: MimeType) -> SignatureInfo {
    let hints = zip_hints(&target);
    SignatureInfo::new(id, target).with_hints(hints)
}

fn xml_info(id: &str, target: MimeType) -> SignatureInfo {
    let hints = xml_hints(&target);
    SignatureInfo::new(id, target).with_hints(hints)
}

fn html_info(id: &str, target: MimeType) -> SignatureInfo {
    xml_info(id, target).with_hint(mime("text", "html"))
}

// ============================================================================
// Archives
// ============================================================================

fn odf(id: &str, kind: &str) -> Arc<dyn Signature> {
    let target = format!("vnd.oasis.opendocument.{kind}");
    let content = format!("application/{target}");
    Arc::new(ZipArchiveSignature::new(
        zip_info(id, mime("application", &target)),
        Some("mimetype".to_string()),
        EntryContent::new(content),
    ))
}

fn odf_text() -> Arc<dyn Signature> {
    odf("odf-text", "text")
}

fn odf_spreadsheet() -> Arc<dyn Signature> {
    odf("odf-spreadsheet", "spreadsheet")
}

fn odf_presentation() -> Arc<dyn Signature> {
    odf("odf-presentation", "presentation")
}

fn odf_graphics() -> Arc<dyn Signature> {
    odf("odf-graphics", "graphics")
}

fn ooxml(id: &str, kind: &str, entry: &str) -> Arc<dyn Signature> {
    let target = format!("vnd.openxmlformats-officedocument.{kind}");
    Arc::new(ZipArchiveSignature::new(
        zip_info(id, mime("application", &target)),
        Some(entry.to_string()),
        EntryPresent,
    ))
}

fn ooxml_document() -> Arc<dyn Signature> {
    ooxml(
        "docx",
        "wordprocessingml.document",
        "word/document.xml",
    )
}

fn ooxml_workbook() -> Arc<dyn Signature> {
    ooxml("xlsx", "spreadsheetml.sheet", "xl/workbook.xml")
}

fn ooxml_presentation() -> Arc<dyn Signature> {
    ooxml(
        "pptx",
        "presentationml.presentation",
        "ppt/presentation.xml",
    )
}

const KML_NAMESPACE: &str = r"http://www\.opengis\.net/kml/2\.[0-9]|http://earth\.google\.com/kml/2\.[0-9]";

fn kml_pattern() -> SchemaPattern {
    match SchemaPattern::regex(KML_NAMESPACE) {
        Ok(pattern) => pattern,
        Err(_) => SchemaPattern::literal("http://www.opengis.net/kml/2.2"),
    }
}

fn kmz() -> Arc<dyn Signature> {
    Arc::new(ZippedXmlSignature::xsl(
        zip_info("kmz", mime("application", "vnd.google-earth.kmz")),
        "kml",
        kml_pattern(),
    ))
}

fn jar() -> Arc<dyn Signature> {
    Arc::new(JarSignature::new(zip_info("jar", MimeType::java_archive())))
}

fn zip() -> Arc<dyn Signature> {
    Arc::new(ZipSignature::new(zip_info("zip", MimeType::zip())))
}

// ============================================================================
// XML vocabularies
// ============================================================================

fn xhtml_strict() -> Arc<dyn Signature> {
    Arc::new(XmlSignature::dtd(
        html_info("xhtml-1.0-strict", mime("application", "xhtml+xml")).with_version("1.0"),
        Some("-//W3C//DTD XHTML 1.0 Strict//EN"),
        Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd"),
    ))
}

fn xhtml_transitional() -> Arc<dyn Signature> {
    Arc::new(XmlSignature::dtd(
        html_info("xhtml-1.0-transitional", mime("application", "xhtml+xml"))
            .with_version("1.0"),
        Some("-//W3C//DTD XHTML 1.0 Transitional//EN"),
        Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd"),
    ))
}

fn html_401() -> Arc<dyn Signature> {
    Arc::new(XmlSignature::dtd(
        html_info("html-4.01", mime("text", "html")).with_version("4.01"),
        Some("-//W3C//DTD HTML 4.01//EN"),
        Some("http://www.w3.org/TR/html4/strict.dtd"),
    ))
}

fn kml() -> Arc<dyn Signature> {
    Arc::new(XmlSignature::xsl(
        xml_info("kml", mime("application", "vnd.google-earth.kml+xml")).with_version("2.2"),
        "kml",
        kml_pattern(),
    ))
}

fn gpx(id: &str, version: &str) -> Arc<dyn Signature> {
    let namespace = format!(
        "http://www.topografix.com/GPX/{}",
        version.replace('.', "/")
    );
    Arc::new(XmlSignature::new(
        xml_info(id, mime("application", "gpx+xml")).with_version(version),
        Some("gpx".to_string()),
        XmlMatcher::schema_version(SchemaPattern::literal(namespace), version),
    ))
}

fn gpx_10() -> Arc<dyn Signature> {
    gpx("gpx-1.0", "1.0")
}

fn gpx_11() -> Arc<dyn Signature> {
    gpx("gpx-1.1", "1.1")
}

fn svg() -> Arc<dyn Signature> {
    Arc::new(XmlSignature::xsl(
        xml_info("svg", mime("image", "svg+xml")),
        "svg",
        SchemaPattern::literal("http://www.w3.org/2000/svg"),
    ))
}

fn gml() -> Arc<dyn Signature> {
    let pattern = SchemaPattern::regex(r"http://www\.opengis\.net/gml(/3\.2)?")
        .unwrap_or_else(|_| SchemaPattern::literal("http://www.opengis.net/gml"));
    Arc::new(XmlSignature::xsl(
        xml_info("gml", mime("application", "gml+xml")),
        "FeatureCollection",
        pattern,
    ))
}

// ============================================================================
// Magic bytes
// ============================================================================

fn bytes(id: &str, target: MimeType, magic: &[u8]) -> ByteSignature {
    ByteSignature::new(SignatureInfo::new(id, target), magic, 0)
}

fn png() -> Arc<dyn Signature> {
    Arc::new(bytes("png", mime("image", "png"), b"\x89PNG\r\n\x1a\n"))
}

fn gif87a() -> Arc<dyn Signature> {
    let info = SignatureInfo::new("gif87a", mime("image", "gif")).with_version("87a");
    Arc::new(ByteSignature::new(info, b"GIF87a".as_slice(), 0))
}

fn gif89a() -> Arc<dyn Signature> {
    let info = SignatureInfo::new("gif89a", mime("image", "gif")).with_version("89a");
    Arc::new(ByteSignature::new(info, b"GIF89a".as_slice(), 0))
}

fn jpeg() -> Arc<dyn Signature> {
    Arc::new(bytes("jpeg", mime("image", "jpeg"), b"\xFF\xD8\xFF"))
}

fn pdf() -> Arc<dyn Signature> {
    Arc::new(bytes("pdf", mime("application", "pdf"), b"%PDF-"))
}

fn gzip() -> Arc<dyn Signature> {
    Arc::new(bytes("gzip", mime("application", "gzip"), b"\x1F\x8B"))
}

/// Main file header code 9994, big-endian.
fn shapefile() -> Arc<dyn Signature> {
    Arc::new(bytes(
        "esri-shapefile",
        mime("application", "x-esri-shape"),
        b"\x00\x00\x27\x0a",
    ))
}

fn xml() -> Arc<dyn Signature> {
    Arc::new(bytes("xml", MimeType::xml(), b"<?xml"))
}
