//! Source registries.
//!
//! A [`Registry`] answers the questions the pipeline asks about packages it
//! does not have yet: which versions exist, what each version depends on
//! per framework, which files it ships per framework, and the bytes of any
//! one of those files. How a registry gets those answers is its own
//! business; the pipeline only talks to this trait.

pub mod folder;
pub mod memory;
mod nuspec;

pub use folder::FolderFeed;
pub use memory::MemoryRegistry;

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::types::{PackageId, PackageIdentity, PackageMetadata, TargetFramework, Version, VersionRange};

/// Path prefix under which packages ship platform-native binaries.
///
/// Native binaries are tagged by path (`runtimes/<rid>/native/...`), not by
/// framework group, so everything below this prefix is carried over as-is.
pub const NATIVE_RUNTIME_PREFIX: &str = "runtimes/";

/// A readable byte stream for one content item.
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid package archive {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("invalid nuspec in {}: {message}", path.display())]
    Nuspec { path: PathBuf, message: String },

    #[error("package {0} not found")]
    NotFound(String),

    #[error("content '{path}' not found in {package}")]
    MissingContent { package: String, path: String },
}

/// One declared dependency: an id and the versions it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDemand {
    pub id: PackageId,
    pub range: VersionRange,
}

impl DependencyDemand {
    pub fn new(id: impl Into<PackageId>, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
        }
    }
}

/// Dependencies declared for one target framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGroup {
    pub framework: TargetFramework,
    pub dependencies: Vec<DependencyDemand>,
}

/// Library items built for one target framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibGroup {
    pub framework: TargetFramework,
    pub items: Vec<String>,
}

/// Content listing of a package version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentGroups {
    /// Framework-tagged library groups.
    pub lib: Vec<LibGroup>,
    /// Every item under [`NATIVE_RUNTIME_PREFIX`].
    pub native: Vec<String>,
    /// Lib items under framework folders that do not parse
    /// (`lib/monoandroid10/...`). Never selected, but they mean the package
    /// does ship binaries.
    pub unsupported: Vec<String>,
}

impl ContentGroups {
    /// Returns `true` if the package ships nothing under `lib/`.
    pub fn has_no_lib(&self) -> bool {
        self.lib.is_empty() && self.unsupported.is_empty()
    }
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Name used in logs and source mapping.
    fn name(&self) -> &str;

    /// All published versions of `id`, in no particular order. Unknown ids
    /// yield an empty list.
    async fn list_versions(&self, id: &PackageId) -> Result<Vec<Version>, RegistryError>;

    /// Dependency groups of one version, or `None` if this registry does not
    /// carry it.
    async fn dependency_groups(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Option<Vec<DependencyGroup>>, RegistryError>;

    async fn content_groups(&self, identity: &PackageIdentity) -> Result<ContentGroups, RegistryError>;

    async fn open_content(
        &self,
        identity: &PackageIdentity,
        path: &str,
    ) -> Result<ContentStream, RegistryError>;

    async fn metadata(&self, identity: &PackageIdentity) -> Result<PackageMetadata, RegistryError>;
}

/// Group the file list of a package the way NuGet lays packages out.
///
/// `lib/<tfm>/...` items form one group per framework folder, items directly
/// under `lib/` form an `any` group, and everything under `runtimes/` is the
/// native list. Items in framework folders that do not parse land in
/// [`ContentGroups::unsupported`].
pub fn content_groups_from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> ContentGroups {
    let mut groups = ContentGroups::default();
    for path in paths {
        if is_native_runtime_path(path) {
            groups.native.push(path.to_string());
            continue;
        }
        let Some(rest) = path
            .get(..4)
            .filter(|head| head.eq_ignore_ascii_case("lib/"))
            .map(|_| &path[4..])
        else {
            continue;
        };
        let framework = match rest.split_once('/') {
            Some((folder, _)) => match folder.parse::<TargetFramework>() {
                Ok(fw) => fw,
                Err(e) => {
                    tracing::debug!(path, "unsupported lib framework: {e}");
                    groups.unsupported.push(path.to_string());
                    continue;
                }
            },
            None => TargetFramework::ANY,
        };
        match groups.lib.iter_mut().find(|g| g.framework == framework) {
            Some(group) => group.items.push(path.to_string()),
            None => groups.lib.push(LibGroup {
                framework,
                items: vec![path.to_string()],
            }),
        }
    }
    groups
}

/// Returns `true` if `path` lies under [`NATIVE_RUNTIME_PREFIX`].
pub fn is_native_runtime_path(path: &str) -> bool {
    path.get(..NATIVE_RUNTIME_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(NATIVE_RUNTIME_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_runtime_prefix_is_case_insensitive() {
        assert!(is_native_runtime_path("runtimes/win-x64/native/foo.dll"));
        assert!(is_native_runtime_path("Runtimes/linux-x64/native/libfoo.so"));
        assert!(!is_native_runtime_path("lib/netstandard2.0/foo.dll"));
        assert!(!is_native_runtime_path("run"));
    }

    #[test]
    fn test_content_groups_from_paths() {
        let groups = content_groups_from_paths([
            "lib/netstandard2.0/Acme.dll",
            "lib/netstandard2.0/Acme.xml",
            "lib/net45/Acme.dll",
            "lib/Legacy.dll",
            "lib/weird-folder/x.dll",
            "runtimes/win-x64/native/acme.dll",
            "README.md",
        ]);
        assert_eq!(groups.lib.len(), 3);
        assert_eq!(groups.lib[0].framework, "netstandard2.0".parse::<TargetFramework>().unwrap());
        assert_eq!(groups.lib[0].items.len(), 2);
        assert_eq!(groups.lib[2].framework, TargetFramework::ANY);
        assert_eq!(groups.native, vec!["runtimes/win-x64/native/acme.dll"]);
        assert_eq!(groups.unsupported, vec!["lib/weird-folder/x.dll"]);
        assert!(!groups.has_no_lib());
    }

    #[test]
    fn test_unknown_frameworks_still_count_as_lib() {
        let groups = content_groups_from_paths([
            "lib/monoandroid10/Droid.dll",
            "lib/xamarinios10/Droid.dll",
        ]);
        assert!(groups.lib.is_empty());
        assert_eq!(groups.unsupported.len(), 2);
        assert!(!groups.has_no_lib());

        assert!(content_groups_from_paths(["README.md"]).has_no_lib());
    }
}
