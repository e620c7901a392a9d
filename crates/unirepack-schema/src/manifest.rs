//! The Unity Package Manager manifest (`package.json`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Author block of a [`TargetManifest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAuthor {
    /// Author display name.
    pub name: String,
    /// Author e-mail address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Author home page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The target-format package descriptor.
///
/// Absent fields are omitted from the JSON rather than written as empty
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetManifest {
    /// Target package name (lowercase, reverse-domain style).
    pub name: String,
    /// Package version string.
    pub version: String,
    /// Human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Package description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Minimum engine version (`2021.3`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unity: Option<String>,
    /// Minimum engine release within `unity` (`0f1`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unity_release: Option<String>,
    /// Package author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<ManifestAuthor>,
    /// Changelog URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
    /// Documentation URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    /// License string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// License URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,
    /// Search keywords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    /// Dependencies: target package name to exact version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,
    /// Hide the package from the editor's package list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_in_editor: Option<bool>,
}

impl TargetManifest {
    /// Serialize to pretty-printed JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails, which cannot
    /// happen for this type in practice.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}
