//! Dependency gathering.
//!
//! Walks the dependency graph reachable from the primary packages. Each
//! dependency is followed at the lowest version its range allows; that is
//! only a stand-in to keep the walk going, the resolver picks the final
//! versions afterwards.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, until_cancelled};
use crate::registry::{DependencyDemand, DependencyGroup, Registry};
use crate::sources::SourceSet;
use crate::types::{PackageId, PackageIdentity, TargetFramework, Version, VersionRange};

/// One visited package version and what it declares.
#[derive(Clone)]
pub struct GatheredPackage {
    pub identity: PackageIdentity,
    /// Registry that answered for this version.
    pub source: Arc<dyn Registry>,
    /// Framework of the selected dependency group, `None` if nothing was
    /// selected.
    pub dependency_framework: Option<TargetFramework>,
    pub dependencies: Vec<DependencyDemand>,
}

impl std::fmt::Debug for GatheredPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatheredPackage")
            .field("identity", &self.identity)
            .field("source", &self.source.name())
            .field("dependency_framework", &self.dependency_framework)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Everything the walk visited, in visit order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    packages: IndexMap<PackageIdentity, GatheredPackage>,
}

impl DependencyGraph {
    pub fn get(&self, identity: &PackageIdentity) -> Option<&GatheredPackage> {
        self.packages.get(identity)
    }

    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.packages.contains_key(identity)
    }

    pub fn packages(&self) -> impl Iterator<Item = &GatheredPackage> {
        self.packages.values()
    }

    /// Visited versions of `id`, ascending.
    pub fn versions_of(&self, id: &PackageId) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .packages
            .keys()
            .filter(|ident| ident.id == *id)
            .map(|ident| ident.version.clone())
            .collect();
        versions.sort();
        versions
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

struct Visit {
    id: PackageId,
    range: VersionRange,
    /// Package that declared this demand, for logs.
    parent: Option<PackageIdentity>,
}

/// Builds the [`DependencyGraph`] for one run.
pub struct Gatherer<'a> {
    sources: &'a SourceSet,
    framework: TargetFramework,
    cancel: &'a CancellationToken,
}

impl<'a> Gatherer<'a> {
    pub fn new(sources: &'a SourceSet, framework: TargetFramework, cancel: &'a CancellationToken) -> Self {
        Self {
            sources,
            framework,
            cancel,
        }
    }

    /// Walk depth-first from `primaries`, one primary after the other.
    ///
    /// Children are visited in declaration order, each subtree completely
    /// before the next sibling. Registries that fail or lack a package are
    /// skipped with a warning; a version no registry carries simply does
    /// not appear in the graph.
    pub async fn gather(&self, primaries: &[PackageIdentity]) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::default();
        let mut visited: HashSet<PackageIdentity> = HashSet::new();

        for primary in primaries {
            let mut stack = vec![Visit {
                id: primary.id.clone(),
                range: VersionRange::exact(primary.version.clone()),
                parent: None,
            }];

            while let Some(visit) = stack.pop() {
                let Some((identity, groups, source)) = self.locate(&visit, &visited).await? else {
                    continue;
                };
                visited.insert(identity.clone());

                let selected = self.select_group(&identity, &groups);
                let dependency_framework = selected.map(|g| g.framework);
                let dependencies = selected.map(|g| g.dependencies.clone()).unwrap_or_default();

                tracing::debug!(
                    package = %identity,
                    source = source.name(),
                    dependencies = dependencies.len(),
                    "gathered"
                );

                for dep in dependencies.iter().rev() {
                    stack.push(Visit {
                        id: dep.id.clone(),
                        range: dep.range.clone(),
                        parent: Some(identity.clone()),
                    });
                }

                graph.packages.insert(
                    identity.clone(),
                    GatheredPackage {
                        identity,
                        source,
                        dependency_framework,
                        dependencies,
                    },
                );
            }
        }

        Ok(graph)
    }

    /// Pick the identity to visit for a demand and fetch its dependency
    /// groups. `None` when it was already visited or nothing carries it.
    async fn locate(
        &self,
        visit: &Visit,
        visited: &HashSet<PackageIdentity>,
    ) -> Result<Option<(PackageIdentity, Vec<DependencyGroup>, Arc<dyn Registry>)>> {
        let repositories = self.sources.repositories_for(&visit.id);
        if repositories.is_empty() {
            tracing::warn!(package = %visit.id, "no source is mapped for this package");
            return Ok(None);
        }

        if let Some(min) = visit
            .range
            .min_version()
            .filter(|_| visit.range.is_min_inclusive())
        {
            let identity = PackageIdentity::new(visit.id.clone(), min.clone());
            if visited.contains(&identity) {
                return Ok(None);
            }
            if let Some((groups, source)) = self.query(&repositories, &identity).await? {
                return Ok(Some((identity, groups, source)));
            }
        }

        // Exclusive or open lower bound, or the minimum is not published.
        let Some(version) = self.lowest_listed(&repositories, visit).await? else {
            match &visit.parent {
                Some(parent) => tracing::warn!(
                    package = %visit.id,
                    range = %visit.range,
                    parent = %parent,
                    "no source has a version in range"
                ),
                None => tracing::warn!(package = %visit.id, range = %visit.range, "package not found in any source"),
            }
            return Ok(None);
        };
        let identity = PackageIdentity::new(visit.id.clone(), version);
        if visited.contains(&identity) {
            return Ok(None);
        }
        Ok(self
            .query(&repositories, &identity)
            .await?
            .map(|(groups, source)| (identity, groups, source)))
    }

    async fn query(
        &self,
        repositories: &[Arc<dyn Registry>],
        identity: &PackageIdentity,
    ) -> Result<Option<(Vec<DependencyGroup>, Arc<dyn Registry>)>> {
        for repo in repositories {
            match until_cancelled(self.cancel, repo.dependency_groups(identity)).await? {
                Ok(Some(groups)) => return Ok(Some((groups, Arc::clone(repo)))),
                Ok(None) => {
                    tracing::trace!(package = %identity, source = repo.name(), "not in source");
                }
                Err(e) => {
                    tracing::warn!(package = %identity, source = repo.name(), "skipping source: {e}");
                }
            }
        }
        Ok(None)
    }

    async fn lowest_listed(
        &self,
        repositories: &[Arc<dyn Registry>],
        visit: &Visit,
    ) -> Result<Option<Version>> {
        let mut lowest: Option<Version> = None;
        for repo in repositories {
            let versions = match until_cancelled(self.cancel, repo.list_versions(&visit.id)).await? {
                Ok(versions) => versions,
                Err(e) => {
                    tracing::warn!(package = %visit.id, source = repo.name(), "cannot list versions: {e}");
                    continue;
                }
            };
            for v in versions.into_iter().filter(|v| visit.range.satisfies(v)) {
                if lowest.as_ref().is_none_or(|l| v < *l) {
                    lowest = Some(v);
                }
            }
        }
        Ok(lowest)
    }

    fn select_group<'g>(
        &self,
        identity: &PackageIdentity,
        groups: &'g [DependencyGroup],
    ) -> Option<&'g DependencyGroup> {
        if groups.is_empty() {
            tracing::debug!(package = %identity, "no dependency groups declared");
            return None;
        }
        let nearest = self.framework.nearest(groups, |g| g.framework);
        if nearest.is_none() {
            tracing::warn!(
                package = %identity,
                framework = %self.framework,
                "no dependency group for target framework, treating as leaf"
            );
        }
        nearest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::{MemoryPackage, MemoryRegistry};

    fn ident(s: &str) -> PackageIdentity {
        s.parse().unwrap()
    }

    fn ns20() -> TargetFramework {
        "netstandard2.0".parse().unwrap()
    }

    async fn gather(registry: MemoryRegistry, primaries: &[&str]) -> (DependencyGraph, Arc<MemoryRegistry>) {
        let registry = Arc::new(registry);
        let sources = SourceSet::new().with_source(registry.clone());
        let cancel = CancellationToken::new();
        let primaries: Vec<_> = primaries.iter().map(|p| ident(p)).collect();
        let graph = Gatherer::new(&sources, ns20(), &cancel)
            .gather(&primaries)
            .await
            .unwrap();
        (graph, registry)
    }

    #[tokio::test]
    async fn test_diamond_visits_each_identity_once() {
        let registry = MemoryRegistry::new("mem")
            .with_package(
                MemoryPackage::fixture("A", "1.0.0")
                    .depends("netstandard2.0", "B", "1.0.0")
                    .depends("netstandard2.0", "C", "1.0.0"),
            )
            .with_package(MemoryPackage::fixture("B", "1.0.0").depends("any", "D", "2.0.0"))
            .with_package(MemoryPackage::fixture("C", "1.0.0").depends("any", "D", "2.0.0"))
            .with_package(MemoryPackage::fixture("D", "2.0.0"));

        let (graph, registry) = gather(registry, &["A@1.0.0"]).await;
        let order: Vec<String> = graph.packages().map(|p| p.identity.to_string()).collect();
        assert_eq!(order, ["A@1.0.0", "B@1.0.0", "D@2.0.0", "C@1.0.0"]);
        assert_eq!(registry.dependency_queries(), 4);
    }

    #[tokio::test]
    async fn test_follows_minimum_of_range() {
        let registry = MemoryRegistry::new("mem")
            .with_package(MemoryPackage::fixture("A", "1.0.0").depends("any", "B", "[1.0.0, 2.0.0)"))
            .with_package(MemoryPackage::fixture("B", "1.0.0"))
            .with_package(MemoryPackage::fixture("B", "1.5.0"));

        let (graph, _) = gather(registry, &["A@1.0.0"]).await;
        assert_eq!(graph.versions_of(&"b".into()), vec!["1.0.0".parse::<Version>().unwrap()]);
    }

    #[tokio::test]
    async fn test_exclusive_minimum_falls_back_to_listing() {
        let registry = MemoryRegistry::new("mem")
            .with_package(MemoryPackage::fixture("A", "1.0.0").depends("any", "B", "(1.0.0, )"))
            .with_package(MemoryPackage::fixture("A", "2.0.0").depends("any", "C", "1.1.0"))
            .with_package(MemoryPackage::fixture("B", "1.0.0"))
            .with_package(MemoryPackage::fixture("B", "1.2.0"))
            .with_package(MemoryPackage::fixture("B", "1.5.0"))
            .with_package(MemoryPackage::fixture("C", "1.3.0"));

        let (graph, _) = gather(registry, &["A@1.0.0", "A@2.0.0"]).await;
        assert!(graph.contains(&ident("B@1.2.0")));
        // 1.1.0 is not published, so the lowest listed match is used.
        assert!(graph.contains(&ident("C@1.3.0")));
    }

    #[tokio::test]
    async fn test_no_compatible_group_is_leaf() {
        let registry = MemoryRegistry::new("mem")
            .with_package(MemoryPackage::fixture("A", "1.0.0").depends("net6.0", "B", "1.0.0"))
            .with_package(MemoryPackage::fixture("B", "1.0.0"));

        let (graph, _) = gather(registry, &["A@1.0.0"]).await;
        assert_eq!(graph.len(), 1);
        let a = graph.get(&ident("A@1.0.0")).unwrap();
        assert!(a.dependencies.is_empty());
        assert!(a.dependency_framework.is_none());
    }

    #[tokio::test]
    async fn test_missing_package_is_skipped() {
        let registry = MemoryRegistry::new("mem")
            .with_package(MemoryPackage::fixture("A", "1.0.0").depends("any", "Ghost", "1.0.0"));
        let (graph, _) = gather(registry, &["A@1.0.0"]).await;
        assert_eq!(graph.len(), 1);
    }

    #[tokio::test]
    async fn test_first_source_with_package_wins() {
        let first = Arc::new(MemoryRegistry::new("first"));
        let second = Arc::new(
            MemoryRegistry::new("second").with_package(MemoryPackage::fixture("A", "1.0.0")),
        );
        let sources = SourceSet::new()
            .with_source(first.clone())
            .with_source(second.clone());
        let cancel = CancellationToken::new();
        let graph = Gatherer::new(&sources, ns20(), &cancel)
            .gather(&[ident("A@1.0.0")])
            .await
            .unwrap();
        assert_eq!(graph.get(&ident("A@1.0.0")).unwrap().source.name(), "second");
        assert_eq!(first.dependency_queries(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_gather() {
        let sources = SourceSet::new().with_source(Arc::new(
            MemoryRegistry::new("mem").with_package(MemoryPackage::fixture("A", "1.0.0")),
        ));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = Gatherer::new(&sources, ns20(), &cancel)
            .gather(&[ident("A@1.0.0")])
            .await;
        assert!(matches!(result, Err(crate::error::RepackError::Cancelled)));
    }
}
