//! Override engine: name mapping, path mapping, content filtering and
//! overlays, evaluated against one loaded [`OverrideSettings`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::read_optional;
use crate::content::{ContentSource, OverlayFile};
use crate::error::{RepackError, Result};
use crate::types::{OverrideSettings, PackageId, PackageSpecificOverrides, PathMappingEntry};

fn starts_with_ci(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn ends_with_ci(text: &str, suffix: &str) -> bool {
    text.len()
        .checked_sub(suffix.len())
        .and_then(|start| text.get(start..))
        .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

/// Longest `match_prefix` first, then longest `match_suffix`.
fn sort_rules(rules: &mut [PathMappingEntry]) {
    rules.sort_by(|a, b| {
        b.match_prefix
            .len()
            .cmp(&a.match_prefix.len())
            .then_with(|| b.match_suffix.len().cmp(&a.match_suffix.len()))
    });
}

/// Apply the first matching rule. `None` when no rule matches.
fn apply_rules(rules: &[PathMappingEntry], path: &str, owner: &PackageId) -> Option<String> {
    let rule = rules.iter().find(|rule| {
        path.len() >= rule.match_prefix.len() + rule.match_suffix.len()
            && starts_with_ci(path, &rule.match_prefix)
            && ends_with_ci(path, &rule.match_suffix)
    })?;

    if rule.replace_prefix.is_none() && rule.replace_suffix.is_none() {
        tracing::warn!(
            package = %owner,
            path,
            match_prefix = %rule.match_prefix,
            match_suffix = %rule.match_suffix,
            "path mapping rule has no replacement"
        );
        return Some(path.to_string());
    }

    let split_start = rule.match_prefix.len();
    let split_end = path.len() - rule.match_suffix.len();
    let head = rule.replace_prefix.as_deref().unwrap_or(&path[..split_start]);
    let tail = rule.replace_suffix.as_deref().unwrap_or(&path[split_end..]);
    Some(format!("{head}{}{tail}", &path[split_start..split_end]))
}

/// Applies [`OverrideSettings`] to package names and content paths.
///
/// Rules are sorted once at construction; lookups by package id are
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct OverrideEngine {
    /// Prefix → replacement, longest prefix first.
    name_prefixes: Vec<(String, String)>,
    global_rules: Vec<PathMappingEntry>,
    /// Keyed by lowercased package id.
    packages: HashMap<String, PackageSpecificOverrides>,
    package_rules: HashMap<String, Vec<PathMappingEntry>>,
    config_dir: PathBuf,
}

impl OverrideEngine {
    /// Build the engine. Overlay sources resolve against `config_dir`.
    pub fn new(settings: OverrideSettings, config_dir: impl Into<PathBuf>) -> Self {
        let mut name_prefixes: Vec<(String, String)> =
            settings.name_prefix_mapping.into_iter().collect();
        name_prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut global_rules = settings.path_mapping;
        sort_rules(&mut global_rules);

        let mut packages = HashMap::new();
        let mut package_rules = HashMap::new();
        for (id, overrides) in settings.package_specific {
            let key = id.to_ascii_lowercase();
            if let Some(rules) = &overrides.path_mapping {
                let mut rules = rules.clone();
                sort_rules(&mut rules);
                package_rules.insert(key.clone(), rules);
            }
            packages.insert(key, overrides);
        }

        Self {
            name_prefixes,
            global_rules,
            packages,
            package_rules,
            config_dir: config_dir.into(),
        }
    }

    /// Load `overrides.toml`. A missing file means no overrides.
    ///
    /// # Errors
    ///
    /// [`RepackError::Config`] if the file exists but is unreadable or
    /// malformed.
    pub async fn load(path: &Path) -> Result<Self> {
        let config_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let settings = match read_optional(path).await? {
            Some(text) => {
                OverrideSettings::from_toml_str(&text).map_err(|e| RepackError::config(path, e))?
            }
            None => {
                tracing::debug!(path = %path.display(), "no override file");
                OverrideSettings::default()
            }
        };
        Ok(Self::new(settings, config_dir))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn package(&self, owner: &PackageId) -> Option<&PackageSpecificOverrides> {
        self.packages.get(&owner.to_lowercase())
    }

    /// Target package name for a registry id.
    ///
    /// The longest configured prefix (case-insensitive) is replaced and the
    /// result normalized: `_` becomes `-`, everything lowercase.
    pub fn map_package_name(&self, id: &PackageId) -> String {
        let id = id.as_str();
        let mapped = self
            .name_prefixes
            .iter()
            .find(|(prefix, _)| starts_with_ci(id, prefix))
            .map(|(prefix, replacement)| format!("{replacement}{}", &id[prefix.len()..]))
            .unwrap_or_else(|| id.to_string());
        mapped.replace('_', "-").to_lowercase()
    }

    /// Rewrite a content path of `owner`.
    ///
    /// Package rules are tried before the global ones. `ignore_global_path_mapping`
    /// only applies to packages that have rules of their own; without them the
    /// global list is used.
    pub fn map_path(&self, path: &str, owner: &PackageId) -> String {
        let key = owner.to_lowercase();
        if let Some(rules) = self.package_rules.get(&key) {
            if let Some(mapped) = apply_rules(rules, path, owner) {
                return mapped;
            }
            if self
                .packages
                .get(&key)
                .is_some_and(|p| p.ignore_global_path_mapping)
            {
                return path.to_string();
            }
        }
        apply_rules(&self.global_rules, path, owner).unwrap_or_else(|| path.to_string())
    }

    /// Allow-list check. Packages without a filter keep everything.
    pub fn filter_content(&self, owner: &PackageId, path: &str) -> bool {
        match self.package(owner).and_then(|p| p.content_filter_prefixes.as_ref()) {
            None => true,
            Some(prefixes) => prefixes.iter().any(|prefix| starts_with_ci(path, prefix)),
        }
    }

    /// Overlay files for `owner`, as `(target path, source)` pairs.
    pub fn overlays(&self, owner: &PackageId) -> Vec<(String, Box<dyn ContentSource>)> {
        let Some(overrides) = self.package(owner) else {
            return Vec::new();
        };
        overrides
            .overlays
            .iter()
            .map(|(target, source)| {
                let file = OverlayFile::new(owner.clone(), target.clone(), self.config_dir.join(source));
                (target.clone(), Box::new(file) as Box<dyn ContentSource>)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::read_all;
    use tokio_util::sync::CancellationToken;

    fn engine(toml: &str) -> OverrideEngine {
        OverrideEngine::new(OverrideSettings::from_toml_str(toml).unwrap(), "/config")
    }

    #[test]
    fn test_name_mapping_longest_prefix() {
        let engine = engine(
            r#"
            [name_prefix_mapping]
            "Acme." = "co.acme."
            "Acme.Widgets." = "co.widgets."
            "#,
        );
        assert_eq!(engine.map_package_name(&"Acme.Widgets".into()), "co.acme.widgets");
        assert_eq!(engine.map_package_name(&"acme.widgets.Extra".into()), "co.widgets.extra");
        assert_eq!(engine.map_package_name(&"Other_Lib.Core".into()), "other-lib.core");
        let once = engine.map_package_name(&"Acme.Widgets".into());
        assert_eq!(engine.map_package_name(&once.as_str().into()), once);
    }

    #[test]
    fn test_path_mapping_replacements() {
        let engine = engine(
            r#"
            [[path_mapping]]
            match_prefix = "lib/netstandard2.0/"
            replace_prefix = "Runtime/"

            [[path_mapping]]
            match_prefix = "lib/"
            match_suffix = ".xml"
            replace_suffix = ".txt"

            [[path_mapping]]
            match_prefix = "docs/"
            "#,
        );
        let owner: PackageId = "Acme".into();
        assert_eq!(engine.map_path("lib/netstandard2.0/Acme.dll", &owner), "Runtime/Acme.dll");
        assert_eq!(engine.map_path("LIB/NETSTANDARD2.0/Acme.dll", &owner), "Runtime/Acme.dll");
        assert_eq!(engine.map_path("lib/net45/Acme.xml", &owner), "lib/net45/Acme.txt");
        assert_eq!(engine.map_path("docs/readme.md", &owner), "docs/readme.md");
        assert_eq!(
            engine.map_path("runtimes/win-x64/native/foo.dll", &owner),
            "runtimes/win-x64/native/foo.dll"
        );
    }

    #[test]
    fn test_longer_suffix_wins_prefix_tie() {
        let engine = engine(
            r#"
            [[path_mapping]]
            match_prefix = "lib/"
            replace_prefix = "A/"

            [[path_mapping]]
            match_prefix = "lib/"
            match_suffix = ".dll"
            replace_prefix = "B/"
            "#,
        );
        let owner: PackageId = "P".into();
        assert_eq!(engine.map_path("lib/x.dll", &owner), "B/x.dll");
        assert_eq!(engine.map_path("lib/x.xml", &owner), "A/x.xml");
    }

    #[test]
    fn test_package_rules_take_precedence() {
        let engine = engine(
            r#"
            [[path_mapping]]
            match_prefix = "lib/netstandard2.0/"
            replace_prefix = "Global/"

            [package_specific."Acme.Widgets"]
            path_mapping = [{ match_prefix = "lib/", replace_prefix = "Plugins/" }]

            [package_specific."Acme.Solo"]
            ignore_global_path_mapping = true
            path_mapping = [{ match_prefix = "lib/net45/", replace_prefix = "Old/" }]
            "#,
        );
        let path = "lib/netstandard2.0/A.dll";
        // The package rule has the shorter prefix but is still tried first.
        assert_eq!(engine.map_path(path, &"acme.widgets".into()), "Plugins/netstandard2.0/A.dll");
        assert_eq!(engine.map_path(path, &"Acme.Other".into()), "Global/A.dll");
        assert_eq!(engine.map_path(path, &"Acme.Solo".into()), path);
        assert_eq!(engine.map_path("lib/net45/A.dll", &"Acme.Solo".into()), "Old/A.dll");
    }

    #[test]
    fn test_ignore_global_without_own_rules_uses_global() {
        let engine = engine(
            r#"
            [[path_mapping]]
            match_prefix = "lib/netstandard2.0/"
            replace_prefix = "Runtime/"

            [package_specific."Acme.Filtered"]
            ignore_global_path_mapping = true
            content_filter_prefixes = ["lib/"]
            "#,
        );
        assert_eq!(
            engine.map_path("lib/netstandard2.0/A.dll", &"Acme.Filtered".into()),
            "Runtime/A.dll"
        );
    }

    #[test]
    fn test_filter_is_allow_list() {
        let engine = engine(
            r#"
            [package_specific."Acme.Widgets"]
            content_filter_prefixes = ["lib/netstandard2.0/", "runtimes/win"]
            "#,
        );
        let widgets: PackageId = "Acme.Widgets".into();
        assert!(engine.filter_content(&widgets, "lib/netstandard2.0/A.dll"));
        assert!(engine.filter_content(&widgets, "Runtimes/Win-x64/native/a.dll"));
        assert!(!engine.filter_content(&widgets, "lib/net45/A.dll"));
        assert!(engine.filter_content(&"Other".into(), "anything/at/all"));
    }

    #[tokio::test]
    async fn test_overlays_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("overlays")).unwrap();
        std::fs::write(dir.path().join("overlays/widgets.asmdef"), b"{\"name\":\"W\"}").unwrap();
        let overrides_path = dir.path().join("overrides.toml");
        std::fs::write(
            &overrides_path,
            r#"
            [package_specific."Acme.Widgets".overlays]
            "Runtime/Acme.Widgets.asmdef" = "overlays/widgets.asmdef"
            "#,
        )
        .unwrap();

        let engine = OverrideEngine::load(&overrides_path).await.unwrap();
        assert_eq!(engine.config_dir(), dir.path());
        let mut overlays = engine.overlays(&"ACME.WIDGETS".into());
        assert_eq!(overlays.len(), 1);
        let (target, source) = overlays.remove(0);
        assert_eq!(target, "Runtime/Acme.Widgets.asmdef");
        let bytes = read_all(source, &CancellationToken::new()).await.unwrap();
        assert_eq!(bytes, b"{\"name\":\"W\"}");
    }

    #[tokio::test]
    async fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.toml");
        let engine = OverrideEngine::load(&path).await.unwrap();
        assert!(engine.overlays(&"x".into()).is_empty());

        std::fs::write(&path, "[[path_mapping]]\nmatch_prefix = 3\n").unwrap();
        let err = OverrideEngine::load(&path).await.unwrap_err();
        assert!(matches!(err, RepackError::Config { .. }));
    }
}
