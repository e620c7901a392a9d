//! The override settings document.
//!
//! Loaded once per run from `overrides.toml` and read-only afterwards. The
//! rule semantics live in the core crate's override engine; this module only
//! describes the shape of the file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One content-path rewrite rule.
///
/// A path matches when it starts with `match_prefix` and ends with
/// `match_suffix` (both case-insensitive). The matched prefix is replaced by
/// `replace_prefix` and the matched suffix by `replace_suffix`; an unset
/// replacement keeps the matched text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathMappingEntry {
    /// Prefix the path must start with.
    pub match_prefix: String,
    /// Suffix the path must end with.
    pub match_suffix: String,
    /// Replacement for the matched prefix.
    pub replace_prefix: Option<String>,
    /// Replacement for the matched suffix.
    pub replace_suffix: Option<String>,
}

/// Settings that apply to a single package id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageSpecificOverrides {
    /// Use only `path_mapping` and skip the global rules.
    pub ignore_global_path_mapping: bool,
    /// Package rules, tried before the global ones.
    pub path_mapping: Option<Vec<PathMappingEntry>>,
    /// Allow-list of content path prefixes; unset keeps everything.
    pub content_filter_prefixes: Option<Vec<String>>,
    /// Extra files: target path inside the package to a local source file,
    /// relative to the configuration directory.
    pub overlays: BTreeMap<String, String>,
}

/// The whole override settings document.
///
/// # Example
///
/// ```
/// use unirepack_schema::OverrideSettings;
///
/// let settings = OverrideSettings::from_toml_str(r#"
///     [name_prefix_mapping]
///     "Acme." = "co.acme."
/// "#).unwrap();
/// assert_eq!(settings.name_prefix_mapping["Acme."], "co.acme.");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverrideSettings {
    /// Package-name prefix to replacement.
    pub name_prefix_mapping: BTreeMap<String, String>,
    /// Global path rewrite rules.
    pub path_mapping: Vec<PathMappingEntry>,
    /// Per-package settings keyed by package id.
    pub package_specific: BTreeMap<String, PackageSpecificOverrides>,
}

impl OverrideSettings {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed documents or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
