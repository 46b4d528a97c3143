//! XML prologue sniffing: DOCTYPE identifiers and root-element namespace.
//!
//! Only the prologue and the root start tag are read. Nothing is validated
//! and no external DTD is ever fetched; a document whose DOCTYPE points at
//! an unreachable URL is read exactly like one without a DOCTYPE.

use std::borrow::Cow;
use std::io::{BufReader, Read};

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use super::{Signature, SignatureInfo};
use crate::error::{ProbeError, ProbeResult};
use crate::stream::SniffableStream;

/// Identifying values pulled from an XML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlIdentity {
    pub namespace: Option<String>,
    pub version: Option<String>,
    pub dtd_system_id: Option<String>,
    pub dtd_public_id: Option<String>,
}

impl XmlIdentity {
    /// Parse the prologue of `input` up to its root element.
    ///
    /// DOCTYPE identifiers are always collected. When `root_element` names
    /// the document's root (by qualified or local name), its namespace and
    /// version attributes are collected too. Documents with no root element,
    /// with text before the root, or that fail to tokenize are
    /// [`ProbeError::Malformed`].
    pub fn extract<R: Read>(input: R, root_element: Option<&str>) -> ProbeResult<Self> {
        let mut reader = Reader::from_reader(BufReader::new(input));
        reader.config_mut().trim_text(true);

        let mut identity = XmlIdentity::default();
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::DocType(text)) => {
                    let raw = String::from_utf8_lossy(&text);
                    let (public_id, system_id) = parse_doctype(&raw);
                    identity.dtd_public_id = public_id;
                    identity.dtd_system_id = system_id;
                }
                Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                    if let Some(root) = root_element
                        && is_named(&element, root)
                    {
                        identity.read_root_attributes(&element)?;
                    }
                    return Ok(identity);
                }
                Ok(Event::Text(_)) | Ok(Event::CData(_)) => {
                    return Err(ProbeError::malformed("xml", "content before root element"));
                }
                Ok(Event::End(_)) => {
                    return Err(ProbeError::malformed("xml", "end tag before root element"));
                }
                Ok(Event::Eof) => {
                    return Err(ProbeError::malformed("xml", "no root element"));
                }
                Ok(_) => {}
                Err(e) => return Err(ProbeError::malformed("xml", e)),
            }
            buf.clear();
        }
    }

    fn read_root_attributes(&mut self, element: &BytesStart<'_>) -> ProbeResult<()> {
        let name = element.name();
        let prefix = name
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
        let namespace_key = match &prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        let prefixed_version = prefix.as_ref().map(|p| format!("{p}:version"));

        for attr in element.attributes() {
            let attr = attr.map_err(|e| ProbeError::malformed("xml", e))?;
            let key = attr.key.as_ref();
            if key == namespace_key.as_bytes() {
                self.namespace = Some(attribute_value(&attr));
            } else if self.version.is_none()
                && (key == b"version"
                    || prefixed_version
                        .as_deref()
                        .is_some_and(|k| key == k.as_bytes()))
            {
                self.version = Some(attribute_value(&attr));
            }
        }
        Ok(())
    }
}

fn is_named(element: &BytesStart<'_>, wanted: &str) -> bool {
    let name = element.name();
    name.as_ref() == wanted.as_bytes() || name.local_name().as_ref() == wanted.as_bytes()
}

/// Unescaped value, or the raw text when it references undefined entities.
fn attribute_value(attr: &Attribute<'_>) -> String {
    attr.unescape_value()
        .map(Cow::into_owned)
        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Split DOCTYPE content (`name PUBLIC "pub" "sys"` or `name SYSTEM "sys"`)
/// into its public and system identifiers.
fn parse_doctype(content: &str) -> (Option<String>, Option<String>) {
    let rest = content.trim_start();
    let name_end = rest
        .find(|c: char| c.is_whitespace() || c == '[')
        .unwrap_or(rest.len());
    let rest = rest[name_end..].trim_start();

    let keyword_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let (keyword, rest) = rest.split_at(keyword_end);

    if keyword.eq_ignore_ascii_case("PUBLIC") {
        let (public_id, rest) = quoted_literal(rest);
        let (system_id, _) = quoted_literal(rest);
        (public_id, system_id)
    } else if keyword.eq_ignore_ascii_case("SYSTEM") {
        let (system_id, _) = quoted_literal(rest);
        (None, system_id)
    } else {
        (None, None)
    }
}

fn quoted_literal(input: &str) -> (Option<String>, &str) {
    let input = input.trim_start();
    let Some(quote) = input.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return (None, input);
    };
    let body = &input[1..];
    match body.find(quote) {
        Some(end) => (Some(body[..end].to_string()), &body[end + 1..]),
        None => (None, ""),
    }
}

/// How a namespace is compared against a schema.
#[derive(Debug, Clone)]
pub enum SchemaPattern {
    /// Case-insensitive equality.
    Literal(String),
    /// Full-string regex match.
    Regex(Regex),
}

impl SchemaPattern {
    pub fn literal(schema: impl Into<String>) -> Self {
        SchemaPattern::Literal(schema.into())
    }

    /// Compile `pattern` anchored at both ends.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{pattern})$")).map(SchemaPattern::Regex)
    }

    pub fn matches(&self, namespace: &str) -> bool {
        match self {
            SchemaPattern::Literal(schema) => schema.eq_ignore_ascii_case(namespace),
            SchemaPattern::Regex(regex) => regex.is_match(namespace),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, SchemaPattern::Regex(_))
    }

    /// The configured schema text (the anchored pattern for regexes).
    pub fn as_str(&self) -> &str {
        match self {
            SchemaPattern::Literal(schema) => schema,
            SchemaPattern::Regex(regex) => regex.as_str(),
        }
    }
}

/// Predicate over an [`XmlIdentity`].
#[derive(Debug, Clone)]
pub enum XmlMatcher {
    /// Either DOCTYPE identifier equals the configured one, ignoring case.
    Dtd {
        public_id: Option<String>,
        system_id: Option<String>,
    },
    /// The root namespace matches `schema`, and the root version equals
    /// `version` when one is configured.
    Schema {
        schema: SchemaPattern,
        version: Option<String>,
    },
}

fn same_id(found: Option<&str>, wanted: Option<&str>) -> bool {
    matches!((found, wanted), (Some(f), Some(w)) if f.eq_ignore_ascii_case(w))
}

impl XmlMatcher {
    pub fn dtd(public_id: Option<&str>, system_id: Option<&str>) -> Self {
        XmlMatcher::Dtd {
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        }
    }

    pub fn schema(schema: SchemaPattern) -> Self {
        XmlMatcher::Schema {
            schema,
            version: None,
        }
    }

    /// Schema matcher that also requires the root `version` attribute.
    pub fn schema_version(schema: SchemaPattern, version: impl Into<String>) -> Self {
        XmlMatcher::Schema {
            schema,
            version: Some(version.into()),
        }
    }

    pub fn is_match(&self, identity: &XmlIdentity) -> bool {
        match self {
            XmlMatcher::Dtd {
                public_id,
                system_id,
            } => {
                same_id(identity.dtd_public_id.as_deref(), public_id.as_deref())
                    || same_id(identity.dtd_system_id.as_deref(), system_id.as_deref())
            }
            XmlMatcher::Schema { schema, version } => {
                let namespace_ok = identity
                    .namespace
                    .as_deref()
                    .is_some_and(|ns| schema.matches(ns));
                let version_ok = match version {
                    Some(wanted) => same_id(identity.version.as_deref(), Some(wanted)),
                    None => true,
                };
                namespace_ok && version_ok
            }
        }
    }
}

/// Read the current cursor of `stream` as XML.
///
/// Returns `None` for content that is not XML; I/O failures still propagate.
pub(crate) fn sniff_identity(
    stream: &mut SniffableStream<'_>,
    root_element: Option<&str>,
) -> ProbeResult<Option<XmlIdentity>> {
    let limit = stream.options().max_entry_size;
    let reader = stream.reader();
    identity_or_none(XmlIdentity::extract(reader.take(limit), root_element))
}

pub(crate) fn identity_or_none(
    result: ProbeResult<XmlIdentity>,
) -> ProbeResult<Option<XmlIdentity>> {
    match result {
        Ok(identity) => Ok(Some(identity)),
        Err(ProbeError::Malformed { message, .. }) => {
            tracing::trace!(%message, "not an XML document");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// XML document recognised by DOCTYPE or root namespace.
#[derive(Debug, Clone)]
pub struct XmlSignature {
    info: SignatureInfo,
    root_element: Option<String>,
    matcher: XmlMatcher,
}

impl XmlSignature {
    pub fn new(info: SignatureInfo, root_element: Option<String>, matcher: XmlMatcher) -> Self {
        Self {
            info,
            root_element,
            matcher,
        }
    }

    /// Match on DOCTYPE public or system identifier.
    pub fn dtd(info: SignatureInfo, public_id: Option<&str>, system_id: Option<&str>) -> Self {
        Self::new(info, None, XmlMatcher::dtd(public_id, system_id))
    }

    /// Match on the namespace of `root_element`.
    pub fn xsl(info: SignatureInfo, root_element: impl Into<String>, schema: SchemaPattern) -> Self {
        Self::new(info, Some(root_element.into()), XmlMatcher::schema(schema))
    }

    pub fn root_element(&self) -> Option<&str> {
        self.root_element.as_deref()
    }

    pub fn matcher(&self) -> &XmlMatcher {
        &self.matcher
    }
}

impl Signature for XmlSignature {
    fn info(&self) -> &SignatureInfo {
        &self.info
    }

    fn matches(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<bool> {
        let identity = sniff_identity(stream, self.root_element.as_deref())?;
        Ok(identity.is_some_and(|id| self.matcher.is_match(&id)))
    }
}
