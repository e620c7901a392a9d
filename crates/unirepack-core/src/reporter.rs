//! Reporter trait for dependency injection
//!
//! Lets the pipeline report progress to the operator without being coupled
//! to a console. Diagnostics still go through `tracing`.

use std::path::Path;

use crate::types::PackageIdentity;

pub trait Reporter: Send + Sync {
    /// A pipeline phase started (e.g. "Resolving").
    fn phase(&self, title: &str);

    /// A package was converted; `line` is `id@version => dep@version, ...`.
    fn converted(&self, line: &str);

    /// An archive was written.
    fn written(&self, identity: &PackageIdentity, path: &Path);

    /// A package was dropped by the ignore list.
    fn ignored(&self, identity: &PackageIdentity);

    /// Final tally.
    fn summary(&self, packages: usize, problems: usize, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn phase(&self, title: &str) {
        (**self).phase(title);
    }
    fn converted(&self, line: &str) {
        (**self).converted(line);
    }
    fn written(&self, identity: &PackageIdentity, path: &Path) {
        (**self).written(identity, path);
    }
    fn ignored(&self, identity: &PackageIdentity) {
        (**self).ignored(identity);
    }
    fn summary(&self, packages: usize, problems: usize, elapsed_secs: f64) {
        (**self).summary(packages, problems, elapsed_secs);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn phase(&self, _title: &str) {}
    fn converted(&self, _line: &str) {}
    fn written(&self, _identity: &PackageIdentity, _path: &Path) {}
    fn ignored(&self, _identity: &PackageIdentity) {}
    fn summary(&self, _packages: usize, _problems: usize, _elapsed_secs: f64) {}
}
