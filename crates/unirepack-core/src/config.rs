//! Run configuration and the ignored-dependency list.
//!
//! Both files are optional. A missing file means defaults; a file that
//! exists but cannot be read or parsed is a [`RepackError::Config`] and
//! aborts the run before any registry is touched.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{RepackError, Result};
use crate::registry::FolderFeed;
use crate::sources::SourceSet;
use crate::types::{PackageId, TargetFramework};

pub const CONFIG_FILE_NAME: &str = "repackager.toml";
pub const OVERRIDES_FILE_NAME: &str = "overrides.toml";
pub const IGNORE_LIST_FILE_NAME: &str = "ignored-dependencies.txt";

/// Read a file, mapping "not found" to `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RepackError::config(path, e)),
    }
}

/// A folder feed entry of the run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
}

/// `repackager.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepackConfig {
    pub framework: Option<TargetFramework>,
    pub unity: Option<String>,
    pub unity_release: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub sources: Vec<SourceConfig>,
    /// Source name → id glob patterns it serves.
    pub source_mapping: BTreeMap<String, Vec<String>>,
}

impl RepackConfig {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| RepackError::config(path, e))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        match read_optional(path).await? {
            Some(text) => Self::from_toml_str(&text, path),
            None => {
                tracing::debug!(path = %path.display(), "no run configuration, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Open every configured feed, relative paths resolved against `base_dir`.
    pub fn build_sources(&self, base_dir: &Path) -> Result<SourceSet> {
        let mut sources = SourceSet::new();
        for source in &self.sources {
            if sources.all().iter().any(|s| s.name() == source.name) {
                return Err(RepackError::config(
                    CONFIG_FILE_NAME,
                    format!("duplicate source name '{}'", source.name),
                ));
            }
            let root = if source.path.is_absolute() {
                source.path.clone()
            } else {
                base_dir.join(&source.path)
            };
            sources.push(Arc::new(FolderFeed::new(source.name.clone(), root)));
        }
        sources.set_mapping(&self.source_mapping)?;
        Ok(sources)
    }
}

/// Package ids pruned after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    ids: HashSet<PackageId>,
}

impl IgnoreList {
    /// One id per line; blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Self {
        let ids = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(PackageId::from)
            .collect();
        Self { ids }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        Ok(read_optional(path)
            .await?
            .map(|text| Self::parse(&text))
            .unwrap_or_default())
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

impl<S: Into<PackageId>> FromIterator<S> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
