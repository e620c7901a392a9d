//! Content loading.
//!
//! Turns every resolved identity into a [`Package`]: the nearest lib group
//! for the target framework, every native runtime item, metadata, and the
//! dependency list rewritten to resolved identities. Content bytes are not
//! fetched here; each entry is a [`RegistryContent`] opened at write time.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::IgnoreList;
use crate::content::{ContentSource, RegistryContent};
use crate::error::{RepackError, Result, until_cancelled};
use crate::gather::{DependencyGraph, GatheredPackage};
use crate::package::{ContentMap, Package};
use crate::registry::{ContentGroups, LibGroup, Registry, RegistryError};
use crate::resolver::ResolvedGraph;
use crate::types::{PackageIdentity, TargetFramework};

/// Concurrent package loads.
pub fn default_concurrency() -> usize {
    (num_cpus::get() * 2).max(4)
}

/// Loads resolved identities into [`Package`]s, a bounded number at a time.
pub struct Loader<'a> {
    graph: &'a DependencyGraph,
    resolved: &'a ResolvedGraph,
    framework: TargetFramework,
    ignored: &'a IgnoreList,
    cancel: &'a CancellationToken,
    concurrency: usize,
}

impl<'a> Loader<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        resolved: &'a ResolvedGraph,
        framework: TargetFramework,
        ignored: &'a IgnoreList,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            graph,
            resolved,
            framework,
            ignored,
            cancel,
            concurrency: default_concurrency(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Load every resolved package. The first failure aborts the rest.
    pub async fn load_all(&self) -> Result<BTreeMap<PackageIdentity, Package>> {
        let packages: Vec<Package> = stream::iter(self.resolved.identities())
            .map(|identity| self.load(identity))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        Ok(packages
            .into_iter()
            .map(|package| (package.identity.clone(), package))
            .collect())
    }

    /// Load one resolved identity.
    pub async fn load(&self, identity: &PackageIdentity) -> Result<Package> {
        let gathered = self.graph.get(identity).ok_or_else(|| {
            RepackError::registry(
                "<gathered>",
                identity,
                RegistryError::NotFound(identity.to_string()),
            )
        })?;
        let registry = &gathered.source;
        let wrap = |e: RegistryError| RepackError::registry(registry.name(), identity, e);

        let groups = until_cancelled(self.cancel, registry.content_groups(identity))
            .await?
            .map_err(wrap)?;
        let lib = self.select_lib(identity, &groups)?;
        if let (Some(lib), Some(dep_fw)) = (lib, gathered.dependency_framework) {
            if lib.framework != dep_fw {
                tracing::warn!(
                    package = %identity,
                    dependencies = %dep_fw,
                    lib = %lib.framework,
                    "dependency group and lib group target different frameworks"
                );
            }
        }

        let metadata = until_cancelled(self.cancel, registry.metadata(identity))
            .await?
            .map_err(wrap)?;

        let mut contents = ContentMap::new();
        for path in lib.iter().flat_map(|g| g.items.iter()) {
            contents.insert(path.clone(), self.content(registry, identity, path));
        }
        for path in &groups.native {
            contents.insert(path.clone(), self.content(registry, identity, path));
        }

        let dependencies = self.dependencies(gathered)?;
        tracing::debug!(
            package = %identity,
            items = contents.len(),
            native = groups.native.len(),
            "loaded"
        );
        Ok(Package {
            identity: identity.clone(),
            dependencies,
            metadata,
            contents,
            native_paths: groups.native,
        })
    }

    /// Nearest lib group; `None` for packages that ship no lib items at all.
    ///
    /// Lib folders for frameworks that do not parse still count as lib
    /// content, so a package shipping only those is incompatible.
    fn select_lib<'g>(
        &self,
        identity: &PackageIdentity,
        groups: &'g ContentGroups,
    ) -> Result<Option<&'g LibGroup>> {
        if groups.has_no_lib() {
            tracing::debug!(package = %identity, "no lib content, treating as any");
            return Ok(None);
        }
        match self.framework.nearest(&groups.lib, |g| g.framework) {
            Some(group) => Ok(Some(group)),
            None => Err(RepackError::IncompatiblePlatform {
                package: identity.clone(),
                framework: self.framework,
            }),
        }
    }

    fn content(
        &self,
        registry: &Arc<dyn Registry>,
        identity: &PackageIdentity,
        path: &str,
    ) -> Box<dyn ContentSource> {
        Box::new(RegistryContent::new(registry.clone(), identity.clone(), path))
    }

    /// Declared dependencies rewritten to resolved identities, ignored ids
    /// dropped.
    fn dependencies(&self, gathered: &GatheredPackage) -> Result<Vec<PackageIdentity>> {
        let mut deps: Vec<PackageIdentity> = Vec::new();
        for demand in &gathered.dependencies {
            if demand.id == gathered.identity.id || self.ignored.contains(&demand.id) {
                continue;
            }
            let resolved = self.resolved.get(&demand.id).ok_or_else(|| {
                RepackError::UnresolvedDependency {
                    package: gathered.identity.clone(),
                    dependency: demand.id.clone(),
                }
            })?;
            if !deps.contains(resolved) {
                deps.push(resolved.clone());
            }
        }
        Ok(deps)
    }
}
