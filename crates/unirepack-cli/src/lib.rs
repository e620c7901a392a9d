//! unirepack - NuGet to Unity Package Manager repackager
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Resolves the dependency closure of the requested NuGet packages against
//! local folder feeds and writes one UPM tarball per resolved package.
//!
//! # Files
//!
//! ```text
//! ./repackager.toml           # feeds, framework, engine version, output dir
//! ./overrides.toml            # renaming, path mapping, filters, overlays
//! ./ignored-dependencies.txt  # ids dropped after resolution
//! ```

pub mod reporter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;

use unirepack_core::config::{
    CONFIG_FILE_NAME, IGNORE_LIST_FILE_NAME, IgnoreList, OVERRIDES_FILE_NAME, RepackConfig,
    SourceConfig,
};
use unirepack_core::convert::ManifestOptions;
use unirepack_core::overrides::OverrideEngine;
use unirepack_core::{Repackager, Reporter, RunOptions, RunSummary};
use unirepack_schema::{PackageIdentity, TargetFramework};

pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_UNITY: &str = "2021.3";

#[derive(Debug, Parser)]
#[command(name = "unirepack")]
#[command(author, version, about = "Convert NuGet packages and their dependencies into UPM packages")]
pub struct Cli {
    /// Packages to convert, as `Id@Version`
    #[arg(required = true, value_name = "PACKAGE@VERSION")]
    pub packages: Vec<PackageIdentity>,

    /// Directory the archives are written to [default: output]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Target framework used to pick dependency and lib groups [default: netstandard2.1]
    #[arg(short, long, value_name = "TFM")]
    pub framework: Option<TargetFramework>,

    /// Minimum Unity version written into every manifest [default: 2021.3]
    #[arg(short, long, value_name = "VERSION")]
    pub unity: Option<String>,

    /// Minimum Unity release written into every manifest
    #[arg(short = 'r', long, value_name = "REL")]
    pub unity_release: Option<String>,

    /// Extra local folder feed (repeatable)
    #[arg(short, long = "source", value_name = "DIR")]
    pub sources: Vec<PathBuf>,

    /// Run configuration file
    #[arg(long, value_name = "FILE", default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Override settings file [default: next to the run configuration]
    #[arg(long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,

    /// Ignored-dependency list [default: next to the run configuration]
    #[arg(long, value_name = "FILE")]
    pub ignore_list: Option<PathBuf>,

    /// Fail when validation finds problems
    #[arg(long)]
    pub strict: bool,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Directory holding the run configuration.
    pub fn config_dir(&self) -> PathBuf {
        match self.config.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn overrides_path(&self) -> PathBuf {
        self.overrides
            .clone()
            .unwrap_or_else(|| self.config_dir().join(OVERRIDES_FILE_NAME))
    }

    pub fn ignore_list_path(&self) -> PathBuf {
        self.ignore_list
            .clone()
            .unwrap_or_else(|| self.config_dir().join(IGNORE_LIST_FILE_NAME))
    }

    /// Tracing directive for the `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Merge flags over the file configuration. Flags win.
    pub fn merge(&self, mut config: RepackConfig) -> (RepackConfig, RunOptions) {
        for (i, path) in self.sources.iter().enumerate() {
            config.sources.push(SourceConfig {
                name: format!("cli-{}", i + 1),
                path: path.clone(),
            });
        }
        let config_dir = self.config_dir();
        let output_dir = match (&self.output_dir, &config.output_dir) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dir)) => config_dir.join(dir),
            (None, None) => PathBuf::from(DEFAULT_OUTPUT_DIR),
        };
        let options = RunOptions {
            framework: self.framework.or(config.framework).unwrap_or_default(),
            manifest: ManifestOptions {
                unity: self
                    .unity
                    .clone()
                    .or_else(|| config.unity.clone())
                    .or_else(|| Some(DEFAULT_UNITY.to_string())),
                unity_release: self.unity_release.clone().or_else(|| config.unity_release.clone()),
            },
            output_dir,
        };
        (config, options)
    }
}

/// Load every configuration file, then run the pipeline.
///
/// All configuration is read before the first registry call, so a malformed
/// file never leaves partial output behind.
pub async fn execute(
    cli: &Cli,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let config = RepackConfig::load(&cli.config).await?;
    let (config, options) = cli.merge(config);
    let sources = config.build_sources(&cli.config_dir())?;
    let overrides = OverrideEngine::load(&cli.overrides_path()).await?;
    let ignored = IgnoreList::load(&cli.ignore_list_path()).await?;
    tracing::debug!(
        sources = sources.len(),
        ignored = ignored.len(),
        output = %options.output_dir.display(),
        "configuration loaded"
    );

    let repackager = Repackager::new(sources, overrides, ignored, options, reporter)
        .with_cancellation(cancel);
    let summary = repackager
        .run(&cli.packages)
        .await
        .context("conversion failed")?;

    if cli.strict && summary.problems > 0 {
        anyhow::bail!(
            "validation found {} problem(s) and --strict is set",
            summary.problems
        );
    }
    Ok(summary)
}

/// Relative display of an archive path.
pub fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
