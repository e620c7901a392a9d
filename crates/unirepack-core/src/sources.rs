//! Configured registries and the id → registry mapping.

use std::collections::BTreeMap;
use std::sync::Arc;

use glob::{MatchOptions, Pattern};

use crate::error::{RepackError, Result};
use crate::registry::Registry;
use crate::types::PackageId;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Registries in configuration order, plus optional source mapping.
#[derive(Clone, Default)]
pub struct SourceSet {
    sources: Vec<Arc<dyn Registry>>,
    mapping: Vec<(usize, Vec<Pattern>)>,
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSet")
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("mapped", &self.mapping.len())
            .finish()
    }
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn Registry>) -> Self {
        self.push(source);
        self
    }

    pub fn push(&mut self, source: Arc<dyn Registry>) {
        self.sources.push(source);
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Restrict ids to sources by glob pattern (`"Acme.*"`).
    ///
    /// Once any mapping is set, an id is only looked up in sources with at
    /// least one matching pattern. Mappings naming an unknown source are
    /// skipped with a warning.
    pub fn set_mapping(&mut self, mapping: &BTreeMap<String, Vec<String>>) -> Result<()> {
        self.mapping.clear();
        for (name, patterns) in mapping {
            let Some(idx) = self.sources.iter().position(|s| s.name() == name) else {
                tracing::warn!(source = %name, "source mapping names an unknown source");
                continue;
            };
            let compiled = patterns
                .iter()
                .map(|p| {
                    Pattern::new(p).map_err(|e| {
                        RepackError::config(
                            "source_mapping",
                            format!("bad pattern '{p}' for source '{name}': {e}"),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            self.mapping.push((idx, compiled));
        }
        Ok(())
    }

    /// Every source, in configuration order.
    pub fn all(&self) -> &[Arc<dyn Registry>] {
        &self.sources
    }

    /// Sources that may carry `id`, in configuration order.
    pub fn repositories_for(&self, id: &PackageId) -> Vec<Arc<dyn Registry>> {
        if self.mapping.is_empty() {
            return self.sources.clone();
        }
        self.sources
            .iter()
            .enumerate()
            .filter(|(idx, _)| {
                self.mapping.iter().any(|(mapped, patterns)| {
                    mapped == idx
                        && patterns
                            .iter()
                            .any(|p| p.matches_with(id.as_str(), MATCH_OPTIONS))
                })
            })
            .map(|(_, source)| Arc::clone(source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    fn set() -> SourceSet {
        SourceSet::new()
            .with_source(Arc::new(MemoryRegistry::new("public")))
            .with_source(Arc::new(MemoryRegistry::new("internal")))
    }

    fn names(sources: &[Arc<dyn Registry>]) -> Vec<&str> {
        sources.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_unmapped_uses_every_source() {
        let sources = set();
        assert_eq!(names(&sources.repositories_for(&"Anything".into())), ["public", "internal"]);
    }

    #[test]
    fn test_mapping_restricts_by_glob() {
        let mut sources = set();
        let mut mapping = BTreeMap::new();
        mapping.insert("internal".to_string(), vec!["Acme.*".to_string()]);
        mapping.insert("public".to_string(), vec!["*".to_string()]);
        mapping.insert("missing".to_string(), vec!["*".to_string()]);
        sources.set_mapping(&mapping).unwrap();

        assert_eq!(names(&sources.repositories_for(&"acme.core".into())), ["public", "internal"]);
        assert_eq!(names(&sources.repositories_for(&"Newtonsoft.Json".into())), ["public"]);
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let mut sources = set();
        let mut mapping = BTreeMap::new();
        mapping.insert("public".to_string(), vec!["[".to_string()]);
        assert!(matches!(sources.set_mapping(&mapping), Err(RepackError::Config { .. })));
    }
}
