use std::collections::HashSet;

use super::*;
use crate::registry::{BuiltinProvider, SignatureProvider};

/// Maximum number of exclude patterns before a warning is produced.
const MAX_EXCLUDE_PATTERNS: usize = 100;

impl ProbeConfig {
    /// Validate the configuration and return any warnings.
    ///
    /// This performs semantic validation beyond what TOML parsing can check:
    /// - configured signatures must build and have unique ids
    /// - disabled ids should name a known signature
    /// - exclude patterns must be valid relative globs
    /// - limits must be non-zero
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let mut known: HashSet<String> = if self.builtin_signatures {
            BuiltinProvider
                .signatures()
                .iter()
                .map(|s| s.info().id.clone())
                .collect()
        } else {
            HashSet::new()
        };

        for (index, spec) in self.signatures.iter().enumerate() {
            let field = format!("signature[{index}]");
            if let Err(e) = spec.build() {
                warnings.push(ConfigWarning {
                    field: field.clone(),
                    message: e.to_string(),
                    suggestion: None,
                });
            }
            if !known.insert(spec.id.trim().to_string()) {
                warnings.push(ConfigWarning {
                    field,
                    message: format!("duplicate signature id '{}'", spec.id),
                    suggestion: Some("Give each signature a unique id".to_string()),
                });
            }
        }

        for id in &self.disabled_signatures {
            if !known.contains(id) {
                warnings.push(ConfigWarning {
                    field: "disabled_signatures".to_string(),
                    message: format!("unknown signature id '{id}'"),
                    suggestion: Some("Run `mimeprobe list` to see registered ids".to_string()),
                });
            }
        }

        if self.exclude.len() > MAX_EXCLUDE_PATTERNS {
            warnings.push(ConfigWarning {
                field: "exclude".to_string(),
                message: format!(
                    "{} exclude patterns exceed the recommended limit of {MAX_EXCLUDE_PATTERNS}",
                    self.exclude.len()
                ),
                suggestion: Some("Combine patterns with wildcards".to_string()),
            });
        }
        for pattern in &self.exclude {
            let normalized = pattern.replace('\\', "/");
            if let Err(e) = glob::Pattern::new(&normalized) {
                warnings.push(ConfigWarning {
                    field: "exclude".to_string(),
                    message: format!("invalid glob pattern '{pattern}': {e}"),
                    suggestion: Some("Check the glob syntax".to_string()),
                });
            }
            if normalized.split('/').any(|part| part == "..") {
                warnings.push(ConfigWarning {
                    field: "exclude".to_string(),
                    message: format!("pattern '{pattern}' contains path traversal"),
                    suggestion: Some("Use patterns relative to the scan root".to_string()),
                });
            }
        }

        if self.limits.max_entry_size == 0 {
            warnings.push(ConfigWarning {
                field: "limits.max_entry_size".to_string(),
                message: "max_entry_size is 0; archive and XML signatures can never match"
                    .to_string(),
                suggestion: Some("Remove the key to use the default".to_string()),
            });
        }
        if self.limits.max_files == Some(0) {
            warnings.push(ConfigWarning {
                field: "limits.max_files".to_string(),
                message: "max_files is 0; every directory scan fails".to_string(),
                suggestion: Some("Remove the key to use the default".to_string()),
            });
        }

        warnings
    }
}

/// Warning from configuration validation.
///
/// These warnings indicate potential issues with the configuration that
/// don't prevent detection from running but may indicate user mistakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// The field path that has the issue (e.g., "disabled_signatures")
    pub field: String,
    /// Description of the issue
    pub message: String,
    /// Optional suggestion for how to fix the issue
    pub suggestion: Option<String>,
}

/// Generate a JSON Schema for the ProbeConfig type.
///
/// This can be used to provide editor autocompletion and validation
/// for `mimeprobe.toml` configuration files.
pub fn generate_schema() -> schemars::Schema {
    schemars::schema_for!(ProbeConfig)
}
