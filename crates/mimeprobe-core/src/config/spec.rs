//! Signatures declared in configuration.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, ProbeResult};
use crate::mime::MimeType;
use crate::signature::{
    ByteSignature, EntryContent, EntryPresent, JarSignature, SchemaPattern, Signature,
    SignatureInfo, XmlEntry, XmlMatcher, XmlSignature, ZipArchiveSignature, ZipArchiveXmlSignature,
    ZipSignature, ZippedXmlSignature,
};

/// One `[[signature]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SignatureSpec {
    /// Unique identifier, used for listing and disabling.
    #[schemars(description = "Unique identifier, used for listing and disabling")]
    pub id: String,

    /// Media type reported on a match.
    #[schemars(description = "Media type reported on a match (e.g. \"application/x-foo\")")]
    pub mime_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Format revision reported alongside the media type")]
    pub format_version: Option<String>,

    /// Host types the signature is indexed under. Empty means "try for every
    /// resource".
    #[serde(default)]
    #[schemars(
        description = "Host media types the signature is tried for; empty means every resource"
    )]
    pub hints: Vec<String>,

    #[serde(flatten)]
    pub kind: SignatureKind,
}

/// Matching rule of a configured signature, selected by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SignatureKind {
    /// Literal bytes at a fixed offset. Exactly one of `content` or `hex`.
    Bytes {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hex: Option<String>,
        #[serde(default)]
        offset: usize,
    },
    /// XML document with a matching DOCTYPE.
    Dtd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        public_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        system_id: Option<String>,
    },
    /// XML document whose root element carries a matching namespace.
    Schema {
        #[serde(flatten)]
        schema: SchemaSpec,
    },
    /// Any readable ZIP archive.
    Zip,
    /// JAR archive, optionally requiring main manifest attributes.
    Jar {
        #[serde(default)]
        require_attributes: Vec<String>,
    },
    /// ZIP archive containing `entry`, optionally with exact `content`.
    ZipEntry {
        entry: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// ZIP archive whose `entry` (or first file) is XML with a matching DOCTYPE.
    ZipEntryDtd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        public_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        system_id: Option<String>,
    },
    /// ZIP archive whose `entry` (or first file) is XML with a matching namespace.
    ZipEntrySchema {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<String>,
        #[serde(flatten)]
        schema: SchemaSpec,
    },
    /// Compressed XML document: the archive's first file, matched by namespace.
    ZippedSchema {
        #[serde(flatten)]
        schema: SchemaSpec,
    },
}

/// Namespace test shared by the schema kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaSpec {
    /// Root element the namespace is read from. When absent, the first
    /// element is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_element: Option<String>,

    pub namespace: String,

    /// Treat `namespace` as a regular expression matched against the whole
    /// namespace.
    #[serde(default)]
    pub pattern: bool,

    /// Required value of the root element's `version` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SchemaSpec {
    fn matcher(&self, id: &str) -> ProbeResult<XmlMatcher> {
        let schema = if self.pattern {
            SchemaPattern::regex(&self.namespace)
                .map_err(|e| ProbeError::invalid_signature(id, e))?
        } else {
            SchemaPattern::literal(self.namespace.as_str())
        };
        Ok(match &self.version {
            Some(version) => XmlMatcher::schema_version(schema, version.as_str()),
            None => XmlMatcher::schema(schema),
        })
    }
}

impl SignatureSpec {
    fn info(&self) -> ProbeResult<SignatureInfo> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(ProbeError::invalid_signature(&self.id, "empty id"));
        }
        let target =
            MimeType::parse(&self.mime_type).map_err(|e| ProbeError::invalid_signature(id, e))?;
        let hints = self
            .hints
            .iter()
            .map(|h| MimeType::parse(h).map_err(|e| ProbeError::invalid_signature(id, e)))
            .collect::<ProbeResult<Vec<_>>>()?;
        let mut info = SignatureInfo::new(id, target).with_hints(hints);
        if let Some(version) = &self.format_version {
            info = info.with_version(version.as_str());
        }
        Ok(info)
    }

    /// Construct the signature this table describes.
    ///
    /// Every problem (bad media type, bad regex, empty magic, conflicting
    /// fields) is [`ProbeError::InvalidSignature`] naming the id.
    pub fn build(&self) -> ProbeResult<Arc<dyn Signature>> {
        let info = self.info()?;
        let id = info.id.clone();
        let signature: Arc<dyn Signature> = match &self.kind {
            SignatureKind::Bytes {
                content,
                hex,
                offset,
            } => {
                let magic = match (content, hex) {
                    (Some(text), None) => text.as_bytes().to_vec(),
                    (None, Some(hex)) => {
                        decode_hex(hex).map_err(|e| ProbeError::invalid_signature(&id, e))?
                    }
                    _ => {
                        return Err(ProbeError::invalid_signature(
                            &id,
                            "exactly one of 'content' or 'hex' is required",
                        ));
                    }
                };
                if magic.is_empty() {
                    return Err(ProbeError::invalid_signature(&id, "empty magic bytes"));
                }
                Arc::new(ByteSignature::new(info, magic, *offset))
            }
            SignatureKind::Dtd {
                public_id,
                system_id,
            } => {
                require_dtd_id(&id, public_id, system_id)?;
                Arc::new(XmlSignature::dtd(
                    info,
                    public_id.as_deref(),
                    system_id.as_deref(),
                ))
            }
            SignatureKind::Schema { schema } => Arc::new(XmlSignature::new(
                info,
                schema.root_element.clone(),
                schema.matcher(&id)?,
            )),
            SignatureKind::Zip => Arc::new(ZipSignature::new(info)),
            SignatureKind::Jar { require_attributes } => Arc::new(
                JarSignature::require_attributes(info, require_attributes.iter().cloned()),
            ),
            SignatureKind::ZipEntry { entry, content } => match content {
                Some(content) => Arc::new(ZipArchiveSignature::new(
                    info,
                    Some(entry.clone()),
                    EntryContent::new(content.as_bytes()),
                )),
                None => Arc::new(ZipArchiveSignature::new(
                    info,
                    Some(entry.clone()),
                    EntryPresent,
                )),
            },
            SignatureKind::ZipEntryDtd {
                entry,
                public_id,
                system_id,
            } => {
                require_dtd_id(&id, public_id, system_id)?;
                Arc::new(ZipArchiveXmlSignature::dtd(
                    info,
                    entry.clone(),
                    public_id.as_deref(),
                    system_id.as_deref(),
                ))
            }
            SignatureKind::ZipEntrySchema { entry, schema } => {
                Arc::new(ZipArchiveXmlSignature::new(
                    info,
                    entry.clone(),
                    XmlEntry::new(schema.root_element.clone(), schema.matcher(&id)?),
                ))
            }
            SignatureKind::ZippedSchema { schema } => Arc::new(ZippedXmlSignature::new(
                info,
                schema.root_element.clone(),
                schema.matcher(&id)?,
            )),
        };
        Ok(signature)
    }
}

fn require_dtd_id(id: &str, public_id: &Option<String>, system_id: &Option<String>) -> ProbeResult<()> {
    if public_id.is_none() && system_id.is_none() {
        return Err(ProbeError::invalid_signature(
            id,
            "one of 'public_id' or 'system_id' is required",
        ));
    }
    Ok(())
}

/// Decode a hex string, ignoring ASCII whitespace between digit pairs.
fn decode_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(&digits).map_err(|e| format!("invalid hex '{text}': {e}"))
}
