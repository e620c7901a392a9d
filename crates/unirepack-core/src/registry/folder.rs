//! Local folder feed: a directory tree of `.nupkg` files.
//!
//! The feed is indexed on first use. Both the flat layout
//! (`<id>.<version>.nupkg`) and the hierarchical one
//! (`<id>/<version>/<id>.<version>.nupkg`) work since the identity is read
//! from each package's nuspec rather than from its file name.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use tokio::sync::OnceCell;
use walkdir::WalkDir;
use zip::ZipArchive;

use super::nuspec::{Nuspec, parse_nuspec};
use super::{
    ContentGroups, ContentStream, DependencyGroup, Registry, RegistryError,
    content_groups_from_paths,
};
use crate::types::{PackageId, PackageIdentity, PackageMetadata, Version};

#[derive(Debug)]
struct FeedEntry {
    archive: PathBuf,
    nuspec: Nuspec,
    /// Decoded item paths.
    files: Vec<String>,
    /// Decoded path → zip entry name, for names that were percent-encoded.
    encoded_names: HashMap<String, String>,
}

/// Largest buffer reserved up front for one item, whatever the zip claims.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

fn initial_capacity(declared_size: u64) -> usize {
    usize::try_from(declared_size.min(MAX_PREALLOCATION)).unwrap_or(0)
}

/// Package items are stored percent-encoded (`My%20Lib.dll`). Names that do
/// not decode to UTF-8 are kept as stored.
fn decode_item_name(name: &str) -> Cow<'_, str> {
    percent_decode_str(name)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(name))
}

type FeedIndex = HashMap<PackageIdentity, FeedEntry>;

#[derive(Debug)]
pub struct FolderFeed {
    name: String,
    root: PathBuf,
    index: OnceCell<FeedIndex>,
}

impl FolderFeed {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            index: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn index(&self) -> Result<&FeedIndex, RegistryError> {
        self.index
            .get_or_try_init(|| {
                let root = self.root.clone();
                let name = self.name.clone();
                async move {
                    let index = tokio::task::spawn_blocking(move || scan_feed(&name, &root))
                        .await
                        .map_err(std::io::Error::other)??;
                    Ok::<_, RegistryError>(index)
                }
            })
            .await
    }

    async fn entry(&self, identity: &PackageIdentity) -> Result<&FeedEntry, RegistryError> {
        self.index()
            .await?
            .get(identity)
            .ok_or_else(|| RegistryError::NotFound(identity.to_string()))
    }
}

fn archive_error(path: &Path, e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Zip entries that belong to the package format itself, not the package.
fn is_packaging_entry(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("_rels/")
        || lower.starts_with("package/")
        || lower == "[content_types].xml"
        || lower == ".signature.p7s"
        || (!lower.contains('/') && lower.ends_with(".nuspec"))
}

fn read_package(path: &Path) -> Result<FeedEntry, RegistryError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| archive_error(path, e))?;

    let mut nuspec_text = None;
    let mut files = Vec::new();
    let mut encoded_names = HashMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| archive_error(path, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if !name.contains('/') && name.to_ascii_lowercase().ends_with(".nuspec") {
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            nuspec_text = Some(text);
        } else if !is_packaging_entry(&name) {
            let decoded = decode_item_name(&name).into_owned();
            if decoded != name {
                encoded_names.insert(decoded.clone(), name);
            }
            files.push(decoded);
        }
    }

    let text = nuspec_text.ok_or_else(|| archive_error(path, "no nuspec at archive root"))?;
    let nuspec = parse_nuspec(&text).map_err(|message| RegistryError::Nuspec {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(FeedEntry {
        archive: path.to_path_buf(),
        nuspec,
        files,
        encoded_names,
    })
}

fn scan_feed(name: &str, root: &Path) -> Result<FeedIndex, RegistryError> {
    if !root.is_dir() {
        return Err(RegistryError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("feed directory {} does not exist", root.display()),
        )));
    }

    let mut index = FeedIndex::new();
    for dent in WalkDir::new(root).follow_links(true) {
        let dent = dent.map_err(|e| RegistryError::Io(e.into()))?;
        let is_nupkg = dent
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("nupkg"));
        if !dent.file_type().is_file() || !is_nupkg {
            continue;
        }
        match read_package(dent.path()) {
            Ok(entry) => {
                tracing::trace!(feed = name, package = %entry.nuspec.identity, "indexed");
                index.insert(entry.nuspec.identity.clone(), entry);
            }
            Err(e) => tracing::warn!(feed = name, "skipping unreadable package: {e}"),
        }
    }
    tracing::debug!(feed = name, packages = index.len(), "feed indexed");
    Ok(index)
}

#[async_trait]
impl Registry for FolderFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_versions(&self, id: &PackageId) -> Result<Vec<Version>, RegistryError> {
        Ok(self
            .index()
            .await?
            .keys()
            .filter(|ident| ident.id == *id)
            .map(|ident| ident.version.clone())
            .collect())
    }

    async fn dependency_groups(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Option<Vec<DependencyGroup>>, RegistryError> {
        Ok(self
            .index()
            .await?
            .get(identity)
            .map(|entry| entry.nuspec.dependency_groups.clone()))
    }

    async fn content_groups(&self, identity: &PackageIdentity) -> Result<ContentGroups, RegistryError> {
        let entry = self.entry(identity).await?;
        Ok(content_groups_from_paths(entry.files.iter().map(String::as_str)))
    }

    async fn open_content(
        &self,
        identity: &PackageIdentity,
        path: &str,
    ) -> Result<ContentStream, RegistryError> {
        let entry = self.entry(identity).await?;
        let archive = entry.archive.clone();
        let item = path.to_string();
        let stored = entry
            .encoded_names
            .get(path)
            .cloned()
            .unwrap_or_else(|| item.clone());
        let package = identity.to_string();
        let bytes = tokio::task::spawn_blocking(move || {
            let file = File::open(&archive)?;
            let mut zip = ZipArchive::new(file).map_err(|e| archive_error(&archive, e))?;
            let mut entry = zip
                .by_name(&stored)
                .map_err(|_| RegistryError::MissingContent { package, path: item })?;
            let mut bytes = Vec::with_capacity(initial_capacity(entry.size()));
            entry.read_to_end(&mut bytes)?;
            Ok::<_, RegistryError>(bytes)
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(Box::pin(Cursor::new(bytes)))
    }

    async fn metadata(&self, identity: &PackageIdentity) -> Result<PackageMetadata, RegistryError> {
        Ok(self.entry(identity).await?.nuspec.metadata.clone())
    }
}
