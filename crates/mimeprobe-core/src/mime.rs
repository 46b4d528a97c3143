//! MIME type value type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProbeError, ProbeResult};

/// A parsed `type/subtype[; name=value]*` media type.
///
/// The type and subtype are lower-cased on parse so that two values naming
/// the same media type compare equal; parameter values keep their case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType {
    primary: String,
    sub: String,
    params: Vec<(String, String)>,
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b)
        })
}

impl MimeType {
    /// Parse a media type string.
    pub fn parse(value: &str) -> ProbeResult<Self> {
        let invalid = || ProbeError::InvalidMimeType {
            value: value.to_string(),
        };

        let mut parts = value.split(';');
        let essence = parts.next().unwrap_or("").trim();
        let (primary, sub) = essence.split_once('/').ok_or_else(invalid)?;
        let (primary, sub) = (primary.trim(), sub.trim());
        if !is_token(primary) || !is_token(sub) {
            return Err(invalid());
        }

        let mut params = Vec::new();
        for param in parts {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (name, val) = param.split_once('=').ok_or_else(invalid)?;
            let name = name.trim();
            if !is_token(name) {
                return Err(invalid());
            }
            let val = val.trim().trim_matches('"');
            params.push((name.to_ascii_lowercase(), val.to_string()));
        }

        Ok(Self {
            primary: primary.to_ascii_lowercase(),
            sub: sub.to_ascii_lowercase(),
            params,
        })
    }

    pub fn primary_type(&self) -> &str {
        &self.primary
    }

    pub fn sub_type(&self) -> &str {
        &self.sub
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `type/subtype` part without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.primary, self.sub)
    }

    /// Case-insensitive comparison of the base `type/subtype`, ignoring
    /// parameters.
    #[must_use]
    pub fn same_essence(&self, other: &MimeType) -> bool {
        self.primary == other.primary && self.sub == other.sub
    }

    pub fn octet_stream() -> Self {
        Self::from_parts("application", "octet-stream")
    }

    pub fn zip() -> Self {
        Self::from_parts("application", "zip")
    }

    pub fn java_archive() -> Self {
        Self::from_parts("application", "java-archive")
    }

    pub fn xml() -> Self {
        Self::from_parts("application", "xml")
    }

    /// Build from parts already known to be valid lowercase tokens.
    pub(crate) fn from_parts(primary: &str, sub: &str) -> Self {
        Self {
            primary: primary.to_string(),
            sub: sub.to_string(),
            params: Vec::new(),
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary, self.sub)?;
        for (name, value) in &self.params {
            write!(f, "; {}={}", name, value)?;
        }
        Ok(())
    }
}

impl FromStr for MimeType {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MimeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MimeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MimeType::parse(&raw).map_err(serde::de::Error::custom)
    }
}
