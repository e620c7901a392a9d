//! NuGet package → UPM package conversion.
//!
//! The converter consumes a loaded [`Package`] and returns a new one: the
//! identity and dependencies renamed, content filtered and remapped, a
//! `package.json` manifest prepended, `.meta` entries synthesized and
//! overlays merged last.

use std::collections::BTreeMap;

use crate::content::{ContentSource, GeneratedContent};
use crate::error::Result;
use crate::meta::{self, is_meta_path};
use crate::overrides::OverrideEngine;
use crate::package::{ContentMap, Package};
use crate::types::{
    MANIFEST_FILE_NAME, ManifestAuthor, PackageId, PackageIdentity, PackageMetadata, TargetManifest,
};

/// Engine version strings written into every manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestOptions {
    pub unity: Option<String>,
    pub unity_release: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

fn is_http_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Build the manifest of a renamed package.
///
/// `dependencies` must already carry target names.
pub fn build_manifest(
    identity: &PackageIdentity,
    metadata: &PackageMetadata,
    dependencies: &[PackageIdentity],
    is_primary: bool,
    options: &ManifestOptions,
) -> TargetManifest {
    let keywords = metadata.keywords();
    let dependencies: BTreeMap<String, String> = dependencies
        .iter()
        .map(|dep| (dep.id.to_string(), dep.version.to_string()))
        .collect();
    let project_url = non_empty(metadata.project_url.as_ref());

    TargetManifest {
        name: identity.id.to_string(),
        version: identity.version.to_string(),
        display_name: non_empty(metadata.title.as_ref()),
        description: non_empty(metadata.description.as_ref()),
        unity: non_empty(options.unity.as_ref()),
        unity_release: non_empty(options.unity_release.as_ref()),
        author: non_empty(metadata.authors.as_ref()).map(|name| ManifestAuthor {
            name,
            email: None,
            url: project_url.clone(),
        }),
        changelog_url: non_empty(metadata.release_notes.as_ref()).filter(|n| is_http_url(n)),
        documentation_url: non_empty(metadata.repository_url.as_ref()).or(project_url),
        license: non_empty(metadata.license.as_ref()),
        license_url: non_empty(metadata.license_url.as_ref()),
        keywords: (!keywords.is_empty()).then_some(keywords),
        dependencies: (!dependencies.is_empty()).then_some(dependencies),
        hide_in_editor: Some(!is_primary),
    }
}

/// Turns a loaded package into its UPM form: renamed identity, generated
/// `package.json`, filtered and mapped paths, `.meta` files and overlays.
pub struct Converter<'a> {
    engine: &'a OverrideEngine,
    options: &'a ManifestOptions,
}

impl<'a> Converter<'a> {
    pub fn new(engine: &'a OverrideEngine, options: &'a ManifestOptions) -> Self {
        Self { engine, options }
    }

    fn rename(&self, identity: &PackageIdentity) -> PackageIdentity {
        PackageIdentity::new(
            PackageId::new(self.engine.map_package_name(&identity.id)),
            identity.version.clone(),
        )
    }

    /// Convert one loaded package.
    ///
    /// # Errors
    ///
    /// Only manifest serialization can fail here; content is not read.
    pub fn convert(&self, package: Package, is_primary: bool) -> Result<Package> {
        let Package {
            identity: source_identity,
            dependencies,
            metadata,
            contents: source_contents,
            native_paths,
        } = package;
        let owner = &source_identity.id;
        let identity = self.rename(&source_identity);
        let dependencies: Vec<PackageIdentity> =
            dependencies.iter().map(|dep| self.rename(dep)).collect();
        let target_name = identity.id.as_str();

        let manifest = build_manifest(&identity, &metadata, &dependencies, is_primary, self.options);
        let manifest_bytes = manifest.to_json_bytes().map_err(std::io::Error::from)?;

        let mut contents = ContentMap::new();
        contents.insert(
            MANIFEST_FILE_NAME.to_string(),
            Box::new(GeneratedContent::new(manifest_bytes)),
        );

        for (path, source) in source_contents {
            if !self.engine.filter_content(owner, &path) {
                tracing::debug!(package = %source_identity, path = %path, "filtered out");
                continue;
            }
            let mapped = self.engine.map_path(&path, owner);
            if contents.contains_key(&mapped) {
                tracing::warn!(
                    package = %source_identity,
                    path = %path,
                    mapped = %mapped,
                    "content path collision, later entry wins"
                );
            }
            contents.insert(mapped, source);
        }

        let overlays = self.engine.overlays(owner);
        let mut covered: Vec<String> = contents
            .keys()
            .filter(|p| !is_meta_path(p))
            .cloned()
            .collect();
        for (target, _) in &overlays {
            if !is_meta_path(target) && !covered.contains(target) {
                covered.push(target.clone());
            }
        }

        let file_metas = covered.iter().map(|path| meta::meta_entry(path, target_name));
        let dir_metas = meta::directory_meta_entries(covered.iter().map(String::as_str));
        for (path, source) in file_metas.chain(dir_metas) {
            contents.insert(path, source);
        }

        for (target, source) in overlays {
            if contents.contains_key(&target) {
                tracing::warn!(package = %source_identity, overlay = %target, "overlay shadows an existing entry");
            }
            insert_last(&mut contents, target, source);
        }

        let native_paths = native_paths
            .iter()
            .filter(|path| self.engine.filter_content(owner, path))
            .map(|path| self.engine.map_path(path, owner))
            .collect();

        tracing::debug!(
            package = %source_identity,
            converted = %identity,
            entries = contents.len(),
            "converted"
        );
        Ok(Package {
            identity,
            dependencies,
            metadata,
            contents,
            native_paths,
        })
    }
}

/// Insert so that `path` is written after everything already present.
fn insert_last(contents: &mut ContentMap, path: String, source: Box<dyn ContentSource>) {
    contents.shift_remove(&path);
    contents.insert(path, source);
}
