//! Console output for a run.
//!
//! Progress goes to stderr, results to stdout, so the converted-package lines
//! can be piped.

use std::path::Path;

use unirepack_core::Reporter;
use unirepack_schema::PackageIdentity;

use crate::display_path;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn phase(&self, title: &str) {
        eprintln!("==> {title}");
    }

    fn converted(&self, line: &str) {
        println!("{line}");
    }

    fn written(&self, _identity: &PackageIdentity, path: &Path) {
        eprintln!("    wrote {}", display_path(path));
    }

    fn ignored(&self, identity: &PackageIdentity) {
        eprintln!("    ignoring {identity}");
    }

    fn summary(&self, packages: usize, problems: usize, elapsed_secs: f64) {
        let noun = if packages == 1 { "package" } else { "packages" };
        if problems == 0 {
            println!("Converted {packages} {noun} in {elapsed_secs:.2}s");
        } else {
            println!(
                "Converted {packages} {noun} in {elapsed_secs:.2}s ({problems} validation problem(s))"
            );
        }
    }
}
