//! Descriptive package metadata as published by the source registry.

use serde::{Deserialize, Serialize};

/// Descriptive fields read verbatim from the registry.
///
/// Every field is optional; registries are inconsistent about which ones
/// they fill. Values are never rewritten after loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Human-readable title.
    pub title: Option<String>,
    /// Comma-separated author list.
    pub authors: Option<String>,
    /// Comma-separated owner list.
    pub owners: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Short summary.
    pub summary: Option<String>,
    /// Space-separated tag list.
    pub tags: Option<String>,
    /// License expression (`MIT`, `Apache-2.0 OR MIT`).
    pub license: Option<String>,
    /// License URL.
    pub license_url: Option<String>,
    /// Project home page.
    pub project_url: Option<String>,
    /// Source repository URL.
    pub repository_url: Option<String>,
    /// Path of the readme inside the package.
    pub readme: Option<String>,
    /// Release notes text or URL.
    pub release_notes: Option<String>,
    /// Copyright notice.
    pub copyright: Option<String>,
    /// Icon URL.
    pub icon_url: Option<String>,
}

impl PackageMetadata {
    /// Tags split on whitespace and commas, empty entries removed.
    pub fn keywords(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_split() {
        let metadata = PackageMetadata {
            tags: Some("  json serialization,  fast ".into()),
            ..Default::default()
        };
        assert_eq!(metadata.keywords(), vec!["json", "serialization", "fast"]);
        assert!(PackageMetadata::default().keywords().is_empty());
    }
}
