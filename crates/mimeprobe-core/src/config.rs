//! Detector configuration

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, ProbeResult};
use crate::stream::{DEFAULT_HEAD_SIZE, DEFAULT_MAX_ENTRY_SIZE, SniffOptions};

mod schema;
mod spec;


pub use schema::{ConfigWarning, generate_schema};
pub use spec::{SignatureKind, SignatureSpec};

/// File name looked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "mimeprobe.toml";

/// Default cap on files visited by a directory scan.
pub const DEFAULT_MAX_FILES: usize = 100_000;

fn default_true() -> bool {
    true
}

fn default_max_entry_size() -> u64 {
    DEFAULT_MAX_ENTRY_SIZE
}

fn default_max_files() -> Option<usize> {
    Some(DEFAULT_MAX_FILES)
}

/// Resource limits applied while sniffing and scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LimitsConfig {
    /// Largest number of decompressed bytes read from one archive entry or
    /// one XML document.
    #[serde(default = "default_max_entry_size")]
    #[schemars(
        description = "Largest number of decompressed bytes read from one archive entry or XML document"
    )]
    pub max_entry_size: u64,

    /// Maximum number of files a directory scan visits. `None` disables
    /// the limit.
    #[serde(default = "default_max_files")]
    #[schemars(description = "Maximum number of files a directory scan visits (null for no limit)")]
    pub max_files: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            max_files: Some(DEFAULT_MAX_FILES),
        }
    }
}

/// Top-level configuration, usually read from `mimeprobe.toml`.
///
/// ```toml
/// disabled_signatures = ["gzip"]
///
/// [[signature]]
/// id = "foo"
/// kind = "bytes"
/// mime_type = "application/x-foo"
/// content = "FOOB"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProbeConfig {
    /// Register the built-in signature catalogue.
    #[serde(default = "default_true")]
    #[schemars(description = "Register the built-in signature catalogue")]
    pub builtin_signatures: bool,

    /// Signature ids to leave out of the registry.
    #[serde(default)]
    #[schemars(description = "Signature ids to leave out of the registry (e.g. [\"gzip\"])")]
    pub disabled_signatures: Vec<String>,

    /// Glob patterns skipped by directory scans.
    #[serde(default)]
    #[schemars(description = "Glob patterns skipped by directory scans")]
    pub exclude: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Resource limits applied while sniffing and scanning")]
    pub limits: LimitsConfig,

    /// Additional signatures, tried after the built-in ones.
    #[serde(default, rename = "signature")]
    #[schemars(description = "Additional signatures, tried after the built-in ones")]
    pub signatures: Vec<SignatureSpec>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            builtin_signatures: true,
            disabled_signatures: Vec::new(),
            exclude: Vec::new(),
            limits: LimitsConfig::default(),
            signatures: Vec::new(),
        }
    }
}

impl ProbeConfig {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> ProbeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ProbeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|e| match e {
            ProbeError::ConfigParse { message, .. } => ProbeError::ConfigParse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse config from TOML text.
    pub fn parse(content: &str) -> ProbeResult<Self> {
        toml::from_str(content).map_err(|e| ProbeError::ConfigParse {
            path: PathBuf::from("<inline>"),
            message: e.message().to_string(),
        })
    }

    /// Load config or use default, returning any load warning
    ///
    /// If a path is given but the file cannot be read or parsed, the default
    /// config is returned together with a message describing the error, so
    /// a typo never silently falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> (Self, Option<String>) {
        match path {
            Some(p) => match Self::load(p) {
                Ok(config) => (config, None),
                Err(e) => {
                    let warning = format!(
                        "failed to load config '{}', using defaults: {e}",
                        p.display()
                    );
                    (Self::default(), Some(warning))
                }
            },
            None => (Self::default(), None),
        }
    }

    /// Options handed to every [`SniffableStream`](crate::stream::SniffableStream)
    /// opened by a registry built from this config.
    pub fn sniff_options(&self) -> SniffOptions {
        SniffOptions {
            max_entry_size: self.limits.max_entry_size,
            head_size: DEFAULT_HEAD_SIZE,
        }
    }

    /// Compiled `exclude` patterns. Invalid patterns are skipped; they are
    /// reported by [`ProbeConfig::validate`].
    pub fn exclude_patterns(&self) -> Vec<glob::Pattern> {
        self.exclude
            .iter()
            .filter_map(|p| glob::Pattern::new(&p.replace('\\', "/")).ok())
            .collect()
    }
}
