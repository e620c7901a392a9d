//! One conversion run.
//!
//! A [`Repackager`] owns everything a run needs: the sources, the override
//! engine, the ignore list and the cancellation token. Each run builds its
//! own dependency graph and resolved graph and drops them when done, so two
//! runs never share state.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveWriter;
use crate::config::IgnoreList;
use crate::convert::{Converter, ManifestOptions};
use crate::error::Result;
use crate::gather::Gatherer;
use crate::loader::Loader;
use crate::overrides::OverrideEngine;
use crate::reporter::Reporter;
use crate::resolver::resolve_versions;
use crate::sources::SourceSet;
use crate::types::{PackageIdentity, TargetFramework};
use crate::validate::validate;

/// Per-run settings that do not come from the override file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub framework: TargetFramework,
    pub manifest: ManifestOptions,
    pub output_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            framework: TargetFramework::default(),
            manifest: ManifestOptions::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Target identities, in write order.
    pub converted: Vec<PackageIdentity>,
    pub archives: Vec<PathBuf>,
    /// Resolved packages dropped by the ignore list.
    pub ignored: Vec<PackageIdentity>,
    /// Validation problems across all packages.
    pub problems: usize,
}

/// Runs conversions. Holds no per-run state, so it can run more than once.
pub struct Repackager {
    sources: SourceSet,
    overrides: OverrideEngine,
    ignored: IgnoreList,
    options: RunOptions,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
}

impl fmt::Debug for Repackager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repackager")
            .field("sources", &self.sources)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Repackager {
    pub fn new(
        sources: SourceSet,
        overrides: OverrideEngine,
        ignored: IgnoreList,
        options: RunOptions,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            sources,
            overrides,
            ignored,
            options,
            reporter,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one cancelled on Ctrl-C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Gather, resolve, load, convert, validate and write.
    ///
    /// # Errors
    ///
    /// Any fatal error of the run. Archives written before the failure stay
    /// in place; the failing one does not.
    pub async fn run(&self, primaries: &[PackageIdentity]) -> Result<RunSummary> {
        let started = Instant::now();
        let framework = self.options.framework;
        let cancel = &self.cancel;
        let mut summary = RunSummary::default();

        if self.sources.is_empty() {
            tracing::warn!("no package sources configured");
        }
        tracing::info!(%framework, primaries = primaries.len(), "starting run");

        self.reporter.phase("Gathering dependencies");
        let graph = Gatherer::new(&self.sources, framework, cancel)
            .gather(primaries)
            .await?;

        self.reporter.phase("Resolving versions");
        let mut resolved = resolve_versions(&graph, primaries, cancel)?;
        summary.ignored = resolved.prune(&self.ignored);
        for identity in &summary.ignored {
            tracing::info!(package = %identity, "ignored");
            self.reporter.ignored(identity);
        }

        self.reporter.phase("Loading packages");
        let loaded = Loader::new(&graph, &resolved, framework, &self.ignored, cancel)
            .load_all()
            .await?;
        drop(graph);

        self.reporter.phase("Converting packages");
        let converter = Converter::new(&self.overrides, &self.options.manifest);
        let mut converted = Vec::with_capacity(loaded.len());
        for (identity, package) in loaded {
            let is_primary = primaries.contains(&identity);
            let package = converter.convert(package, is_primary)?;
            self.reporter.converted(&package.dependency_line());
            converted.push(package);
        }

        for package in &converted {
            summary.problems += validate(package);
        }
        if summary.problems > 0 {
            tracing::warn!(problems = summary.problems, "validation found problems");
        }

        self.reporter.phase("Writing archives");
        let writer = ArchiveWriter::new(&self.options.output_dir);
        for package in converted {
            let identity = package.identity.clone();
            let path = writer.write(package, cancel).await?;
            self.reporter.written(&identity, &path);
            summary.converted.push(identity);
            summary.archives.push(path);
        }

        self.reporter.summary(
            summary.converted.len(),
            summary.problems,
            started.elapsed().as_secs_f64(),
        );
        Ok(summary)
    }
}
