//! In-memory registry, for tests and for embedders that already hold the
//! package data.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{
    ContentGroups, ContentStream, DependencyDemand, DependencyGroup, Registry, RegistryError,
    content_groups_from_paths,
};
use crate::types::{PackageId, PackageIdentity, PackageMetadata, TargetFramework, Version, VersionRange};

/// One package version held by a [`MemoryRegistry`].
#[derive(Debug, Clone)]
pub struct MemoryPackage {
    identity: PackageIdentity,
    dependency_groups: Vec<DependencyGroup>,
    files: BTreeMap<String, Vec<u8>>,
    metadata: PackageMetadata,
}

impl MemoryPackage {
    pub fn new(id: impl Into<PackageId>, version: Version) -> Self {
        Self {
            identity: PackageIdentity::new(id, version),
            dependency_groups: Vec::new(),
            files: BTreeMap::new(),
            metadata: PackageMetadata::default(),
        }
    }

    /// Declare a dependency for `framework`.
    pub fn dependency(mut self, framework: TargetFramework, id: impl Into<PackageId>, range: VersionRange) -> Self {
        let demand = DependencyDemand::new(id, range);
        match self
            .dependency_groups
            .iter_mut()
            .find(|g| g.framework == framework)
        {
            Some(group) => group.dependencies.push(demand),
            None => self.dependency_groups.push(DependencyGroup {
                framework,
                dependencies: vec![demand],
            }),
        }
        self
    }

    /// Declare an empty dependency group for `framework`.
    pub fn dependency_group(mut self, framework: TargetFramework) -> Self {
        if !self.dependency_groups.iter().any(|g| g.framework == framework) {
            self.dependency_groups.push(DependencyGroup {
                framework,
                dependencies: Vec::new(),
            });
        }
        self
    }

    pub fn file(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), bytes.into());
        self
    }

    pub fn metadata(mut self, metadata: PackageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// String shorthands for fixtures.
#[cfg(test)]
impl MemoryPackage {
    pub(crate) fn fixture(id: &str, version: &str) -> Self {
        Self::new(id, version.parse().unwrap())
    }

    pub(crate) fn depends(self, framework: &str, id: &str, range: &str) -> Self {
        self.dependency(framework.parse().unwrap(), id, range.parse().unwrap())
    }

    pub(crate) fn empty_group(self, framework: &str) -> Self {
        self.dependency_group(framework.parse().unwrap())
    }
}

/// A [`Registry`] over packages held in memory.
///
/// Counts dependency queries and opened streams so callers can check what
/// was actually fetched.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    name: String,
    packages: HashMap<PackageIdentity, MemoryPackage>,
    dependency_queries: AtomicUsize,
    opened: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_package(mut self, package: MemoryPackage) -> Self {
        self.packages.insert(package.identity.clone(), package);
        self
    }

    /// Number of `dependency_groups` calls answered so far.
    pub fn dependency_queries(&self) -> usize {
        self.dependency_queries.load(Ordering::Relaxed)
    }

    /// Number of content streams opened so far.
    pub fn opened_streams(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    fn get(&self, identity: &PackageIdentity) -> Result<&MemoryPackage, RegistryError> {
        self.packages
            .get(identity)
            .ok_or_else(|| RegistryError::NotFound(identity.to_string()))
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_versions(&self, id: &PackageId) -> Result<Vec<Version>, RegistryError> {
        Ok(self
            .packages
            .keys()
            .filter(|ident| ident.id == *id)
            .map(|ident| ident.version.clone())
            .collect())
    }

    async fn dependency_groups(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Option<Vec<DependencyGroup>>, RegistryError> {
        self.dependency_queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .packages
            .get(identity)
            .map(|pkg| pkg.dependency_groups.clone()))
    }

    async fn content_groups(&self, identity: &PackageIdentity) -> Result<ContentGroups, RegistryError> {
        let pkg = self.get(identity)?;
        Ok(content_groups_from_paths(pkg.files.keys().map(String::as_str)))
    }

    async fn open_content(
        &self,
        identity: &PackageIdentity,
        path: &str,
    ) -> Result<ContentStream, RegistryError> {
        let pkg = self.get(identity)?;
        let bytes = pkg
            .files
            .get(path)
            .ok_or_else(|| RegistryError::MissingContent {
                package: identity.to_string(),
                path: path.to_string(),
            })?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::pin(Cursor::new(bytes.clone())))
    }

    async fn metadata(&self, identity: &PackageIdentity) -> Result<PackageMetadata, RegistryError> {
        Ok(self.get(identity)?.metadata.clone())
    }
}
