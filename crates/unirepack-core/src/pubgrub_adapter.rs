//! PubGrub adapter for lowest-version resolution.
//!
//! Implements the `DependencyProvider` trait over a gathered
//! [`DependencyGraph`]. Candidate versions are the versions the gatherer
//! visited; the provider always offers them lowest first, so the solver
//! settles on the lowest version that satisfies every range.

use std::borrow::Borrow;
use std::error::Error;
use std::fmt;

use pubgrub::error::PubGrubError;
use pubgrub::range::Range;
use pubgrub::report::{DerivationTree, DefaultStringReporter, External, Reporter};
use pubgrub::solver::{
    Dependencies, DependencyConstraints, DependencyProvider, choose_package_with_fewest_versions,
};
use tokio_util::sync::CancellationToken;

use crate::error::RepackError;
use crate::gather::DependencyGraph;
use crate::types::{PackageId, PackageIdentity, Version, VersionRange};

/// Package key for the solver: the synthetic root or a registry id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PkgId {
    Root,
    Id(PackageId),
}

impl fmt::Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "<requested packages>"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// A [`Version`] with a bump counter.
///
/// PubGrub expresses `v == x` as `x <= v < x.bump()`. NuGet versions have no
/// natural successor, so a counter that sorts after the version itself
/// stands in for one: `(x, 0) < (x, 1) < (y, 0)` for every `y > x`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SolverVersion {
    version: Version,
    bump: u32,
}

impl SolverVersion {
    pub fn new(version: Version) -> Self {
        Self { version, bump: 0 }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for SolverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}

impl pubgrub::version::Version for SolverVersion {
    fn lowest() -> Self {
        // `0.0.0-0` sorts below every other version.
        let version = Version::new(0, 0, 0)
            .with_prerelease("0")
            .unwrap_or_else(|_| Version::new(0, 0, 0));
        Self::new(version)
    }

    fn bump(&self) -> Self {
        Self {
            version: self.version.clone(),
            bump: self.bump.saturating_add(1),
        }
    }
}

/// Translate an interval into a solver range.
pub fn to_solver_range(range: &VersionRange) -> Range<SolverVersion> {
    let lower = match range.min_version() {
        None => Range::any(),
        Some(min) if range.is_min_inclusive() => Range::higher_than(SolverVersion::new(min.clone())),
        Some(min) => Range::higher_than(pubgrub::version::Version::bump(&SolverVersion::new(min.clone()))),
    };
    let upper = match range.max_version() {
        None => Range::any(),
        Some(max) if range.is_max_inclusive() => {
            Range::strictly_lower_than(pubgrub::version::Version::bump(&SolverVersion::new(max.clone())))
        }
        Some(max) => Range::strictly_lower_than(SolverVersion::new(max.clone())),
    };
    lower.intersection(&upper)
}

/// Adapter that feeds the gathered graph to the PubGrub solver.
pub struct GraphDependencyProvider<'a> {
    graph: &'a DependencyGraph,
    primaries: &'a [PackageIdentity],
    cancel: &'a CancellationToken,
}

impl<'a> GraphDependencyProvider<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        primaries: &'a [PackageIdentity],
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            graph,
            primaries,
            cancel,
        }
    }

    fn candidates(&self, pkg: &PkgId) -> std::vec::IntoIter<SolverVersion> {
        match pkg {
            PkgId::Root => vec![root_version()].into_iter(),
            PkgId::Id(id) => self
                .graph
                .versions_of(id)
                .into_iter()
                .map(SolverVersion::new)
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }
}

fn root_version() -> SolverVersion {
    SolverVersion::new(Version::new(0, 0, 0))
}

impl DependencyProvider<PkgId, SolverVersion> for GraphDependencyProvider<'_> {
    fn choose_package_version<T: Borrow<PkgId>, U: Borrow<Range<SolverVersion>>>(
        &self,
        potential_packages: impl Iterator<Item = (T, U)>,
    ) -> Result<(T, Option<SolverVersion>), Box<dyn Error>> {
        Ok(choose_package_with_fewest_versions(
            |pkg: &PkgId| self.candidates(pkg),
            potential_packages,
        ))
    }

    fn get_dependencies(
        &self,
        pkg: &PkgId,
        version: &SolverVersion,
    ) -> Result<Dependencies<PkgId, SolverVersion>, Box<dyn Error>> {
        let mut deps: DependencyConstraints<PkgId, SolverVersion> = DependencyConstraints::default();
        let demands: Vec<(PackageId, VersionRange)> = match pkg {
            PkgId::Root => self
                .primaries
                .iter()
                .map(|p| (p.id.clone(), VersionRange::exact(p.version.clone())))
                .collect(),
            PkgId::Id(id) => {
                let identity = PackageIdentity::new(id.clone(), version.version.clone());
                let Some(gathered) = self.graph.get(&identity) else {
                    return Ok(Dependencies::Unknown);
                };
                gathered
                    .dependencies
                    .iter()
                    .filter(|d| {
                        let own = d.id == *id;
                        if own {
                            tracing::warn!(package = %identity, "ignoring dependency on itself");
                        }
                        !own
                    })
                    .map(|d| (d.id.clone(), d.range.clone()))
                    .collect()
            }
        };
        for (id, range) in demands {
            let range = to_solver_range(&range);
            deps.entry(PkgId::Id(id))
                .and_modify(|existing| *existing = existing.intersection(&range))
                .or_insert(range);
        }
        Ok(Dependencies::Known(deps))
    }

    fn should_cancel(&self) -> Result<(), Box<dyn Error>> {
        if self.cancel.is_cancelled() {
            return Err(Box::new(RepackError::Cancelled));
        }
        Ok(())
    }
}

/// Run the solver and return one identity per package id.
///
/// # Errors
///
/// [`RepackError::Unsatisfiable`] naming a conflicting id and every range
/// demanded for it, or [`RepackError::Cancelled`].
pub fn solve(
    graph: &DependencyGraph,
    primaries: &[PackageIdentity],
    cancel: &CancellationToken,
) -> Result<Vec<PackageIdentity>, RepackError> {
    let provider = GraphDependencyProvider::new(graph, primaries, cancel);
    match pubgrub::solver::resolve(&provider, PkgId::Root, root_version()) {
        Ok(solution) => {
            let mut resolved: Vec<PackageIdentity> = solution
                .into_iter()
                .filter_map(|(pkg, v)| match pkg {
                    PkgId::Root => None,
                    PkgId::Id(id) => Some(PackageIdentity::new(id, v.version)),
                })
                .collect();
            resolved.sort();
            Ok(resolved)
        }
        Err(PubGrubError::ErrorInShouldCancel(_)) => Err(RepackError::Cancelled),
        Err(PubGrubError::NoSolution(tree)) => {
            let detail = DefaultStringReporter::report(&tree);
            let id = conflicting_id(graph, primaries)
                .or_else(|| missing_in_tree(&tree))
                .or_else(|| primaries.first().map(|p| p.id.clone()))
                .unwrap_or_else(|| PackageId::new("<none>"));
            Err(unsatisfiable(graph, primaries, id, detail))
        }
        Err(PubGrubError::DependencyOnTheEmptySet { dependent, .. }) => {
            let id = match dependent {
                PkgId::Id(id) => id,
                PkgId::Root => PackageId::new("<requested packages>"),
            };
            let detail = "declared ranges for this id do not overlap".to_string();
            Err(unsatisfiable(graph, primaries, id, detail))
        }
        Err(e) => {
            let id = primaries
                .first()
                .map(|p| p.id.clone())
                .unwrap_or_else(|| PackageId::new("<none>"));
            Err(RepackError::Unsatisfiable {
                id,
                ranges: Vec::new(),
                detail: e.to_string(),
            })
        }
    }
}

/// Every range demanded for `id`, by primaries and by gathered packages.
fn demanded_ranges(
    graph: &DependencyGraph,
    primaries: &[PackageIdentity],
    id: &PackageId,
) -> Vec<VersionRange> {
    let mut ranges: Vec<VersionRange> = primaries
        .iter()
        .filter(|p| p.id == *id)
        .map(|p| VersionRange::exact(p.version.clone()))
        .collect();
    for pkg in graph.packages() {
        for dep in pkg.dependencies.iter().filter(|d| d.id == *id) {
            if !ranges.contains(&dep.range) {
                ranges.push(dep.range.clone());
            }
        }
    }
    ranges
}

/// First id whose demanded ranges share no visited candidate.
fn conflicting_id(graph: &DependencyGraph, primaries: &[PackageIdentity]) -> Option<PackageId> {
    let ids = primaries
        .iter()
        .map(|p| p.id.clone())
        .chain(graph.packages().flat_map(|p| p.dependencies.iter().map(|d| d.id.clone())));
    for id in ids {
        let ranges = demanded_ranges(graph, primaries, &id);
        let candidates = graph.versions_of(&id);
        if !candidates
            .iter()
            .any(|v| ranges.iter().all(|r| r.satisfies(v)))
        {
            return Some(id);
        }
    }
    None
}

fn missing_in_tree(tree: &DerivationTree<PkgId, SolverVersion>) -> Option<PackageId> {
    match tree {
        DerivationTree::External(
            External::NoVersions(PkgId::Id(id), _) | External::UnavailableDependencies(PkgId::Id(id), _),
        ) => Some(id.clone()),
        DerivationTree::External(_) => None,
        DerivationTree::Derived(derived) => {
            missing_in_tree(&derived.cause1).or_else(|| missing_in_tree(&derived.cause2))
        }
    }
}

fn unsatisfiable(
    graph: &DependencyGraph,
    primaries: &[PackageIdentity],
    id: PackageId,
    detail: String,
) -> RepackError {
    let ranges = demanded_ranges(graph, primaries, &id)
        .iter()
        .map(ToString::to_string)
        .collect();
    RepackError::Unsatisfiable { id, ranges, detail }
}
