use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use crate::config::IgnoreList;
use crate::error::{RepackError, Result};
use crate::gather::DependencyGraph;
use crate::pubgrub_adapter;
use crate::types::{PackageId, PackageIdentity};

/// One concrete version per package id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedGraph {
    packages: BTreeMap<PackageId, PackageIdentity>,
}

impl ResolvedGraph {
    pub fn get(&self, id: &PackageId) -> Option<&PackageIdentity> {
        self.packages.get(id)
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.packages.contains_key(id)
    }

    /// Resolved identities, ordered by id.
    pub fn identities(&self) -> impl Iterator<Item = &PackageIdentity> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Remove ignored ids, returning what was removed.
    pub fn prune(&mut self, ignored: &IgnoreList) -> Vec<PackageIdentity> {
        let mut removed = Vec::new();
        self.packages.retain(|id, identity| {
            let keep = !ignored.contains(id);
            if !keep {
                removed.push(identity.clone());
            }
            keep
        });
        removed
    }
}

impl FromIterator<PackageIdentity> for ResolvedGraph {
    fn from_iter<I: IntoIterator<Item = PackageIdentity>>(iter: I) -> Self {
        Self {
            packages: iter
                .into_iter()
                .map(|identity| (identity.id.clone(), identity))
                .collect(),
        }
    }
}

/// Resolve the gathered graph with the primaries pinned exactly.
///
/// Lowest-applicable-version policy: among the gathered versions that
/// satisfy every range demanded for an id, the lowest is selected.
///
/// # Errors
///
/// Returns [`RepackError::Unsatisfiable`] when some id cannot satisfy all of
/// its ranges at once, including when two primaries name the same id with
/// different versions.
pub fn resolve_versions(
    graph: &DependencyGraph,
    primaries: &[PackageIdentity],
    cancel: &CancellationToken,
) -> Result<ResolvedGraph> {
    let mut pinned: BTreeMap<&PackageId, &PackageIdentity> = BTreeMap::new();
    for primary in primaries {
        if let Some(other) = pinned.insert(&primary.id, primary) {
            if other.version != primary.version {
                return Err(RepackError::Unsatisfiable {
                    id: primary.id.clone(),
                    ranges: vec![format!("[{}]", other.version), format!("[{}]", primary.version)],
                    detail: "requested twice with different versions".to_string(),
                });
            }
        }
    }

    let resolved: ResolvedGraph = pubgrub_adapter::solve(graph, primaries, cancel)?
        .into_iter()
        .collect();
    for identity in resolved.identities() {
        tracing::debug!(package = %identity, "resolved");
    }
    Ok(resolved)
}
