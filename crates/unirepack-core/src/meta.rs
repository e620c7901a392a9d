//! Companion `.meta` files.
//!
//! Every file and directory in a Unity package needs a `.meta` file naming
//! its importer and a GUID. The GUIDs of the manifest and of assembly
//! definitions are derived from the package name so they stay stable across
//! runs; every other GUID is random.

use indexmap::IndexSet;
use sha2::{Digest, Sha256};

use crate::content::{ContentSource, GeneratedContent};
use crate::types::{MANIFEST_FILE_NAME, META_SUFFIX};

const PLUGIN_SUFFIXES: &[&str] = &[".dll", ".dll.config", ".so", ".dylib", ".a", ".bundle"];
const TEXT_SUFFIXES: &[&str] = &[".json", ".xml", ".txt"];

/// Importer written into a `.meta` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImporterKind {
    /// `package.json`.
    PackageManifest,
    /// `.asmdef`.
    AssemblyDefinition,
    /// Managed and native binaries.
    Plugin,
    /// `.json`, `.xml`, `.txt`.
    TextScript,
    /// Folders and anything unrecognized.
    Default,
}

fn ends_with_any(path: &str, suffixes: &[&str]) -> bool {
    let lower = path.to_ascii_lowercase();
    suffixes.iter().any(|s| lower.ends_with(s))
}

impl ImporterKind {
    pub fn for_file(path: &str) -> Self {
        if path.eq_ignore_ascii_case(MANIFEST_FILE_NAME) {
            Self::PackageManifest
        } else if ends_with_any(path, &[".asmdef"]) {
            Self::AssemblyDefinition
        } else if ends_with_any(path, PLUGIN_SUFFIXES) {
            Self::Plugin
        } else if ends_with_any(path, TEXT_SUFFIXES) {
            Self::TextScript
        } else {
            Self::Default
        }
    }

    /// Whether the GUID is derived from the package name.
    pub fn has_stable_guid(self) -> bool {
        matches!(self, Self::PackageManifest | Self::AssemblyDefinition)
    }
}

/// First 16 bytes of SHA-256 over the package name, hex encoded.
pub fn stable_guid(package_name: &str) -> String {
    let digest = Sha256::digest(package_name.as_bytes());
    hex::encode(&digest[..16])
}

/// Fresh identifier: 16 random bytes, hex-encoded.
pub fn random_guid() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

const IMPORTER_TRAILER: &str = "  userData: \n  assetBundleName: \n  assetBundleVariant: \n";

const PLUGIN_BODY: &str = "PluginImporter:
  externalObjects: {}
  serializedVersion: 2
  iconMap: {}
  executionOrder: {}
  defineConstraints: []
  isPreloaded: 0
  isOverridable: 0
  isExplicitlyReferenced: 0
  validateReferences: 1
  platformData:
  - first:
      Any:
    second:
      enabled: 1
      settings: {}
  - first:
      Editor: Editor
    second:
      enabled: 0
      settings:
        DefaultValueInitialized: true
  - first:
      Windows Store Apps: WindowsStoreApps
    second:
      enabled: 0
      settings:
        CPU: AnyCPU
";

/// Render the `.meta` body for `kind`.
pub fn render(kind: ImporterKind, guid: &str) -> String {
    let body = match kind {
        ImporterKind::Plugin => PLUGIN_BODY,
        ImporterKind::PackageManifest => "PackageManifestImporter:\n  externalObjects: {}\n",
        ImporterKind::AssemblyDefinition => "AssemblyDefinitionImporter:\n  externalObjects: {}\n",
        ImporterKind::TextScript => "TextScriptImporter:\n  externalObjects: {}\n",
        ImporterKind::Default => "folderAsset: yes\nDefaultImporter:\n  externalObjects: {}\n",
    };
    format!("fileFormatVersion: 2\nguid: {guid}\n{body}{IMPORTER_TRAILER}")
}

/// `path.meta`
pub fn meta_path(path: &str) -> String {
    format!("{path}{META_SUFFIX}")
}

/// Returns `true` for `.meta` files.
pub fn is_meta_path(path: &str) -> bool {
    path.ends_with(META_SUFFIX)
}

/// `(path.meta, content)` for one content file of `package_name`.
pub fn meta_entry(path: &str, package_name: &str) -> (String, Box<dyn ContentSource>) {
    let kind = ImporterKind::for_file(path);
    let guid = if kind.has_stable_guid() {
        stable_guid(package_name)
    } else {
        random_guid()
    };
    (
        meta_path(path),
        Box::new(GeneratedContent::new(render(kind, &guid))),
    )
}

/// `(dir.meta, content)` for a directory.
pub fn directory_meta_entry(dir: &str) -> (String, Box<dyn ContentSource>) {
    (
        meta_path(dir),
        Box::new(GeneratedContent::new(render(ImporterKind::Default, &random_guid()))),
    )
}

/// Every ancestor directory of `paths`, deduplicated, in first-seen order.
pub fn implied_directories<'a>(paths: impl IntoIterator<Item = &'a str>) -> IndexSet<String> {
    let mut dirs = IndexSet::new();
    for path in paths {
        for (i, _) in path.match_indices('/') {
            if i > 0 {
                dirs.insert(path[..i].to_string());
            }
        }
    }
    dirs
}

/// One folder meta per implied directory of `paths`.
pub fn directory_meta_entries<'a>(
    paths: impl IntoIterator<Item = &'a str>,
) -> Vec<(String, Box<dyn ContentSource>)> {
    implied_directories(paths)
        .iter()
        .map(|dir| directory_meta_entry(dir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::read_all;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_importer_selection() {
        assert_eq!(ImporterKind::for_file("package.json"), ImporterKind::PackageManifest);
        assert_eq!(ImporterKind::for_file("Samples/package.json"), ImporterKind::TextScript);
        assert_eq!(ImporterKind::for_file("Runtime/Acme.asmdef"), ImporterKind::AssemblyDefinition);
        assert_eq!(ImporterKind::for_file("lib/Acme.DLL"), ImporterKind::Plugin);
        assert_eq!(ImporterKind::for_file("lib/Acme.dll.config"), ImporterKind::Plugin);
        assert_eq!(ImporterKind::for_file("runtimes/osx/native/libacme.dylib"), ImporterKind::Plugin);
        assert_eq!(ImporterKind::for_file("lib/Acme.xml"), ImporterKind::TextScript);
        assert_eq!(ImporterKind::for_file("LICENSE.md"), ImporterKind::Default);
    }

    #[test]
    fn test_stable_guid_is_reproducible() {
        let a = stable_guid("co.acme.widgets");
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(a, stable_guid("co.acme.widgets"));
        assert_ne!(a, stable_guid("co.acme.core"));
        assert_ne!(random_guid(), random_guid());
    }

    #[tokio::test]
    async fn test_manifest_meta_is_stable_plugin_meta_is_not() {
        let cancel = CancellationToken::new();
        let (path, first) = meta_entry("package.json", "co.acme.widgets");
        assert_eq!(path, "package.json.meta");
        let (_, second) = meta_entry("package.json", "co.acme.widgets");
        assert_eq!(read_all(first, &cancel).await.unwrap(), read_all(second, &cancel).await.unwrap());

        let (path, plugin) = meta_entry("runtimes/win-x64/native/foo.dll", "co.acme.widgets");
        assert_eq!(path, "runtimes/win-x64/native/foo.dll.meta");
        let text = String::from_utf8(read_all(plugin, &cancel).await.unwrap()).unwrap();
        assert!(text.starts_with("fileFormatVersion: 2\nguid: "));
        assert!(text.contains("PluginImporter:"));
        assert!(text.contains("Windows Store Apps: WindowsStoreApps"));
        assert!(text.ends_with("assetBundleVariant: \n"));
    }

    #[test]
    fn test_implied_directories() {
        let dirs = implied_directories(["a/b/c.dll", "a/d.txt", "e.txt", "a/b/f.xml"]);
        assert_eq!(dirs.into_iter().collect::<Vec<_>>(), ["a", "a/b"]);
        assert_eq!(directory_meta_entries(["x/y/z"]).len(), 2);
    }

    #[test]
    fn test_folder_meta_body() {
        let text = render(ImporterKind::Default, "00ff");
        assert_eq!(
            text,
            "fileFormatVersion: 2\nguid: 00ff\nfolderAsset: yes\nDefaultImporter:\n  externalObjects: {}\n  userData: \n  assetBundleName: \n  assetBundleVariant: \n"
        );
    }
}
