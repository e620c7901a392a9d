//! Structural checks over a converted package.

use std::collections::HashSet;

use crate::meta::{is_meta_path, meta_path};
use crate::package::Package;
use crate::types::META_SUFFIX;

const NATIVE_BINARY_SUFFIXES: &[&str] = &[".dll", ".so", ".a", ".dylib"];

/// One structural problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// A native binary without its `.meta`.
    MissingMeta(String),
    /// A `.meta` with nothing behind it.
    StrayMeta(String),
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingMeta(path) => write!(f, "native binary '{path}' has no meta file"),
            Self::StrayMeta(path) => write!(f, "stray meta file '{path}'"),
        }
    }
}

/// List every problem in `package` without logging.
pub fn problems(package: &Package) -> Vec<Problem> {
    let keys: HashSet<&str> = package.content_paths().collect();
    let mut found = Vec::new();

    for path in &package.native_paths {
        let lower = path.to_ascii_lowercase();
        if NATIVE_BINARY_SUFFIXES.iter().any(|s| lower.ends_with(s))
            && !keys.contains(meta_path(path).as_str())
        {
            found.push(Problem::MissingMeta(path.clone()));
        }
    }

    for path in package.content_paths().filter(|p| is_meta_path(p)) {
        let base = &path[..path.len() - META_SUFFIX.len()];
        let dir = format!("{base}/");
        let backed = keys.contains(base) || package.content_paths().any(|p| p.starts_with(&dir));
        if !backed {
            found.push(Problem::StrayMeta(path.to_string()));
        }
    }
    found
}

/// Log every problem as a warning and return how many there were.
pub fn validate(package: &Package) -> usize {
    let found = problems(package);
    for problem in &found {
        tracing::warn!(package = %package.identity, "{problem}");
    }
    found.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::GeneratedContent;
    use crate::package::ContentMap;

    fn package(paths: &[&str], native: &[&str]) -> Package {
        let mut contents = ContentMap::new();
        for path in paths {
            contents.insert((*path).to_string(), Box::new(GeneratedContent::new(Vec::new())));
        }
        Package {
            identity: "co.acme.widgets@1.0.0".parse().unwrap(),
            dependencies: Vec::new(),
            metadata: Default::default(),
            contents,
            native_paths: native.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    #[test]
    fn test_clean_package() {
        let pkg = package(
            &[
                "package.json",
                "package.json.meta",
                "Plugins.meta",
                "Plugins/x.dll",
                "Plugins/x.dll.meta",
                "Runtime.meta",
                "Runtime/a.txt",
                "Runtime/a.txt.meta",
            ],
            &["Plugins/x.dll"],
        );
        assert_eq!(validate(&pkg), 0);
    }

    #[test]
    fn test_missing_native_meta() {
        let pkg = package(
            &["runtimes/linux-x64/native/libfoo.so", "runtimes/linux-x64/native/notes.md"],
            &["runtimes/linux-x64/native/libfoo.so", "runtimes/linux-x64/native/notes.md"],
        );
        assert_eq!(
            problems(&pkg),
            [Problem::MissingMeta("runtimes/linux-x64/native/libfoo.so".into())]
        );
    }

    #[test]
    fn test_stray_meta() {
        let pkg = package(&["a.txt", "a.txt.meta", "gone.dll.meta", "Run.meta", "Runtime/b.txt"], &[]);
        // `Run.meta` is not backed by `Runtime/...`; directory match needs the slash.
        assert_eq!(
            problems(&pkg),
            [
                Problem::StrayMeta("gone.dll.meta".into()),
                Problem::StrayMeta("Run.meta".into()),
            ]
        );
        assert_eq!(validate(&pkg), 2);
    }
}
