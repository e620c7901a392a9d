//! A loaded or converted package.

use std::fmt;

use indexmap::IndexMap;

use crate::content::ContentSource;
use crate::types::{PackageIdentity, PackageMetadata};

/// Relative path → lazy content, in archive write order.
pub type ContentMap = IndexMap<String, Box<dyn ContentSource>>;

/// One package version with its selected content.
///
/// Produced once by the loader. The converter takes it by value and returns
/// a new `Package`, moving over the content sources it keeps unchanged.
pub struct Package {
    pub identity: PackageIdentity,
    /// Resolved dependency identities for the selected framework.
    pub dependencies: Vec<PackageIdentity>,
    pub metadata: PackageMetadata,
    pub contents: ContentMap,
    /// Paths in `contents` that are platform-native binaries (`runtimes/...`).
    pub native_paths: Vec<String>,
}

impl Package {
    pub fn content_paths(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.contents.keys().map(String::as_str)
    }

    /// `id@version => dep@version, ...`
    pub fn dependency_line(&self) -> String {
        let deps: Vec<String> = self.dependencies.iter().map(ToString::to_string).collect();
        format!("{} => {}", self.identity, deps.join(", "))
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("identity", &self.identity)
            .field("dependencies", &self.dependencies)
            .field("contents", &self.contents.keys().collect::<Vec<_>>())
            .field("native_paths", &self.native_paths)
            .finish_non_exhaustive()
    }
}
