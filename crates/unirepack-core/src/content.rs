//! Lazy content sources.
//!
//! A [`ContentSource`] stands for the bytes of one content entry. Nothing is
//! fetched until [`ContentSource::open`] is called, and `open` consumes the
//! source, so every entry is opened at most once.

use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::error::{RepackError, Result, until_cancelled};
use crate::registry::{ContentStream, Registry};
use crate::types::{PackageId, PackageIdentity};

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Open the stream. The source is spent afterwards.
    async fn open(self: Box<Self>, cancel: &CancellationToken) -> Result<ContentStream>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

impl fmt::Debug for dyn ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// One item inside a registry package.
pub struct RegistryContent {
    registry: Arc<dyn Registry>,
    identity: PackageIdentity,
    path: String,
}

impl RegistryContent {
    pub fn new(registry: Arc<dyn Registry>, identity: PackageIdentity, path: impl Into<String>) -> Self {
        Self {
            registry,
            identity,
            path: path.into(),
        }
    }
}

#[async_trait]
impl ContentSource for RegistryContent {
    async fn open(self: Box<Self>, cancel: &CancellationToken) -> Result<ContentStream> {
        tracing::trace!(package = %self.identity, path = %self.path, "opening registry content");
        until_cancelled(cancel, self.registry.open_content(&self.identity, &self.path))
            .await?
            .map_err(|e| RepackError::registry(self.registry.name(), &self.identity, e))
    }

    fn describe(&self) -> String {
        format!("{}:{}!{}", self.registry.name(), self.identity, self.path)
    }
}

/// Bytes produced during conversion (manifest, meta files).
pub struct GeneratedContent {
    bytes: Vec<u8>,
}

impl GeneratedContent {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }
}

#[async_trait]
impl ContentSource for GeneratedContent {
    async fn open(self: Box<Self>, _cancel: &CancellationToken) -> Result<ContentStream> {
        Ok(Box::pin(Cursor::new(self.bytes)))
    }

    fn describe(&self) -> String {
        format!("generated ({} bytes)", self.bytes.len())
    }
}

/// A local file injected as an overlay.
pub struct OverlayFile {
    package: PackageId,
    target: String,
    path: PathBuf,
}

impl OverlayFile {
    pub fn new(package: PackageId, target: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            package,
            target: target.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl ContentSource for OverlayFile {
    async fn open(self: Box<Self>, cancel: &CancellationToken) -> Result<ContentStream> {
        let file = until_cancelled(cancel, tokio::fs::File::open(&self.path))
            .await?
            .map_err(|error| RepackError::Overlay {
                package: self.package.clone(),
                target: self.target.clone(),
                source_path: self.path.clone(),
                error,
            })?;
        Ok(Box::pin(file))
    }

    fn describe(&self) -> String {
        format!("overlay {}", self.path.display())
    }
}

/// Open `source` and read it to the end, honouring cancellation.
pub async fn read_all(source: Box<dyn ContentSource>, cancel: &CancellationToken) -> Result<Vec<u8>> {
    let mut stream = source.open(cancel).await?;
    let mut bytes = Vec::new();
    until_cancelled(cancel, stream.read_to_end(&mut bytes)).await??;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::{MemoryPackage, MemoryRegistry};

    #[tokio::test]
    async fn test_registry_content_is_lazy() {
        let registry = Arc::new(
            MemoryRegistry::new("mem")
                .with_package(MemoryPackage::fixture("A", "1.0.0").file("lib/A.dll", b"MZ".to_vec())),
        );
        let ident = PackageIdentity::new("A", "1.0.0".parse().unwrap());
        let source: Box<dyn ContentSource> =
            Box::new(RegistryContent::new(registry.clone(), ident, "lib/A.dll"));
        assert_eq!(registry.opened_streams(), 0);

        let bytes = read_all(source, &CancellationToken::new()).await.unwrap();
        assert_eq!(bytes, b"MZ");
        assert_eq!(registry.opened_streams(), 1);
    }

    #[tokio::test]
    async fn test_missing_overlay_is_overlay_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Box::new(OverlayFile::new(
            "Acme.Widgets".into(),
            "Runtime/extra.txt",
            dir.path().join("absent.txt"),
        ));
        let err = read_all(source, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RepackError::Overlay { ref target, .. } if target == "Runtime/extra.txt"));
    }

    #[tokio::test]
    async fn test_cancelled_open() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");
        std::fs::write(&path, b"x").unwrap();
        let source = Box::new(OverlayFile::new("P".into(), "x.txt", path));
        assert!(matches!(read_all(source, &cancel).await, Err(RepackError::Cancelled)));
    }
}
