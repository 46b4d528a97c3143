//! The detection algorithm: host hint, candidate scan, fallback.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{ProbeError, ProbeResult};
use crate::mime::MimeType;
use crate::registry::SignatureRegistry;
use crate::resource::{FileResource, MemoryResource, Resource};
use crate::signature::Signature;
use crate::stream::SniffableStream;

/// Where a detected type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionSource {
    /// A registered signature matched.
    Signature,
    /// No signature matched; the host prober's guess is reported.
    HostHint,
    /// Nothing is known; the type is `application/octet-stream`.
    Unknown,
}

/// Outcome of a detection call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub mime_type: MimeType,
    pub format_version: Option<String>,
    /// Id of the matching signature.
    pub signature: Option<String>,
    pub host_hint: Option<MimeType>,
    pub source: DetectionSource,
}

impl Detection {
    fn from_signature(signature: &dyn Signature, host_hint: Option<MimeType>) -> Self {
        let info = signature.info();
        Self {
            mime_type: info.target.clone(),
            format_version: info.format_version.clone(),
            signature: Some(info.id.clone()),
            host_hint,
            source: DetectionSource::Signature,
        }
    }

    fn fallback(host_hint: Option<MimeType>) -> Self {
        match host_hint {
            Some(hint) => Self {
                mime_type: hint.clone(),
                format_version: None,
                signature: None,
                host_hint: Some(hint),
                source: DetectionSource::HostHint,
            },
            None => Self {
                mime_type: MimeType::octet_stream(),
                format_version: None,
                signature: None,
                host_hint: None,
                source: DetectionSource::Unknown,
            },
        }
    }

    /// `true` when nothing identified the content.
    pub fn is_unknown(&self) -> bool {
        self.source == DetectionSource::Unknown
    }
}

fn describe(hint: &Option<MimeType>) -> String {
    hint.as_ref()
        .map_or_else(|| "none".to_string(), ToString::to_string)
}

impl SignatureRegistry {
    /// Determine the media type and format version of `resource`.
    ///
    /// Signatures are tried in [`candidates_for`](Self::candidates_for)
    /// order and the first match wins. A signature that errors or panics
    /// counts as not matching. Only failure to open or read the resource
    /// itself is returned as an error ([`ProbeError::Unreachable`]).
    pub fn detect(&self, resource: &dyn Resource) -> ProbeResult<Detection> {
        let mut stream = SniffableStream::open(resource, *self.options())?;
        let hint = self.host_hint(&mut stream)?;
        let lookup = hint.clone().unwrap_or_else(MimeType::octet_stream);

        for signature in self.candidates_for(&lookup) {
            if self.try_candidate(signature.as_ref(), &mut stream) {
                debug!(
                    locator = resource.locator(),
                    signature = signature.name(),
                    "signature matched"
                );
                return Ok(Detection::from_signature(signature.as_ref(), hint));
            }
        }

        debug!(
            locator = resource.locator(),
            hint = %describe(&hint),
            "no signature matched"
        );
        Ok(Detection::fallback(hint))
    }

    /// Format version of the detected type, if the matching signature has one.
    pub fn format_version(&self, resource: &dyn Resource) -> ProbeResult<Option<String>> {
        Ok(self.detect(resource)?.format_version)
    }

    /// Whether `resource` is of type `desired` (compared by essence).
    ///
    /// A host hint with the desired essence settles the question without
    /// reading further. Otherwise only candidates whose own target has the
    /// desired essence are tried.
    pub fn is_content_type(&self, resource: &dyn Resource, desired: &MimeType) -> ProbeResult<bool> {
        let mut stream = SniffableStream::open(resource, *self.options())?;
        let hint = self.host_hint(&mut stream)?;
        if hint.as_ref().is_some_and(|h| h.same_essence(desired)) {
            trace!(locator = resource.locator(), "host hint settles content type");
            return Ok(true);
        }

        let lookup = hint.unwrap_or_else(MimeType::octet_stream);
        let matched = self
            .candidates_for(&lookup)
            .into_iter()
            .filter(|s| s.info().target.same_essence(desired))
            .any(|s| self.try_candidate(s.as_ref(), &mut stream));
        Ok(matched)
    }

    /// [`detect`](Self::detect) a file on disk.
    pub fn detect_path(&self, path: impl AsRef<Path>) -> ProbeResult<Detection> {
        self.detect(&FileResource::new(path.as_ref()))
    }

    /// [`detect`](Self::detect) an in-memory buffer. `name` feeds the host
    /// prober the way a file name would.
    pub fn detect_bytes(&self, name: &str, bytes: &[u8]) -> ProbeResult<Detection> {
        self.detect(&MemoryResource::new(name, bytes.to_vec()))
    }

    /// [`is_content_type`](Self::is_content_type) for a file on disk.
    pub fn is_content_type_path(
        &self,
        path: impl AsRef<Path>,
        desired: &MimeType,
    ) -> ProbeResult<bool> {
        self.is_content_type(&FileResource::new(path.as_ref()), desired)
    }

    /// Declared type if the resource has one, else the prober's guess from
    /// the locator and leading bytes.
    fn host_hint(&self, stream: &mut SniffableStream<'_>) -> ProbeResult<Option<MimeType>> {
        let resource = stream.resource();
        if let Some(declared) = resource.declared_type() {
            trace!(locator = resource.locator(), hint = %declared, "declared type");
            return Ok(Some(declared));
        }

        let head = match stream.peek_head(self.options().head_size) {
            Ok(head) => head,
            Err(ProbeError::Io(source)) => {
                return Err(ProbeError::Unreachable {
                    locator: resource.locator().to_string(),
                    source,
                });
            }
            Err(e) => return Err(e),
        };
        let hint = self.prober().probe(resource.locator(), head);
        trace!(
            locator = resource.locator(),
            prober = self.prober().name(),
            hint = %describe(&hint),
            "host hint"
        );
        Ok(hint)
    }

    /// Run one candidate with errors and panics turned into "no match".
    fn try_candidate(&self, signature: &dyn Signature, stream: &mut SniffableStream<'_>) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| signature.probe(stream))) {
            Ok(Ok(matched)) => {
                trace!(signature = signature.name(), matched, "candidate tried");
                matched
            }
            Ok(Err(e)) => {
                debug!(
                    locator = stream.locator(),
                    signature = signature.name(),
                    error = %e,
                    "signature failed, treating as no match"
                );
                false
            }
            Err(_) => {
                warn!(
                    locator = stream.locator(),
                    signature = signature.name(),
                    "signature panicked, treating as no match"
                );
                false
            }
        }
    }
}
