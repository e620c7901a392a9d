//! Gzipped tarball output.
//!
//! One archive per converted package, named `<id>-<version>.tgz`. Entries
//! are `<id>/<path>` in content-map order followed by `<id>.meta` for the
//! package root. The archive is built under a `.tmp` name and renamed into
//! place once complete, so a failed or cancelled write leaves nothing
//! behind.

use std::path::{Path, PathBuf};

use async_compression::tokio::write::GzipEncoder;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_tar::{Builder, Header};
use tokio_util::sync::CancellationToken;

use crate::content::read_all;
use crate::error::{RepackError, Result, until_cancelled};
use crate::meta::directory_meta_entry;
use crate::package::Package;
use crate::types::PackageIdentity;

pub const ARCHIVE_EXTENSION: &str = "tgz";

type TarBuilder = Builder<GzipEncoder<BufWriter<fs::File>>>;

/// Writes converted packages as `<name>-<version>.tgz` into one directory.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    output_dir: PathBuf,
}

impl ArchiveWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn archive_path(&self, identity: &PackageIdentity) -> PathBuf {
        self.output_dir
            .join(format!("{}-{}.{ARCHIVE_EXTENSION}", identity.id, identity.version))
    }

    /// Write `package`, consuming its content sources.
    ///
    /// # Errors
    ///
    /// [`RepackError::Archive`] naming the package, or
    /// [`RepackError::Cancelled`]. Either way no partial file remains.
    pub async fn write(&self, package: Package, cancel: &CancellationToken) -> Result<PathBuf> {
        let identity = package.identity.clone();
        let path = self.archive_path(&identity);
        let mut tmp_name = path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let written = async {
            fs::create_dir_all(&self.output_dir).await?;
            write_tarball(package, &tmp, cancel).await?;
            fs::rename(&tmp, &path).await?;
            Ok::<(), RepackError>(())
        };
        match until_cancelled(cancel, written).await.and_then(|r| r) {
            Ok(()) => {
                tracing::info!(package = %identity, path = %path.display(), "archive written");
                Ok(path)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&tmp).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %tmp.display(), "could not remove partial archive: {rm}");
                    }
                }
                Err(match e {
                    RepackError::Cancelled => RepackError::Cancelled,
                    error => RepackError::Archive {
                        package: identity,
                        error: Box::new(error),
                    },
                })
            }
        }
    }
}

async fn write_tarball(package: Package, tmp: &Path, cancel: &CancellationToken) -> Result<()> {
    let file = fs::File::create(tmp).await?;
    let mut builder: TarBuilder = Builder::new(GzipEncoder::new(BufWriter::new(file)));
    let mtime = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    let root = package.identity.id.to_string();

    let (root_meta, root_meta_source) = directory_meta_entry(&root);
    let entries = package
        .contents
        .into_iter()
        .map(|(path, source)| (format!("{root}/{path}"), source))
        .chain(std::iter::once((root_meta, root_meta_source)));

    for (name, source) in entries {
        let bytes = read_all(source, cancel).await?;
        let mut header = Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        builder.append_data(&mut header, &name, bytes.as_slice()).await?;
        tracing::trace!(entry = %name, size = bytes.len(), "archived");
    }

    builder.finish().await?;
    let mut encoder = builder.into_inner().await?;
    encoder.shutdown().await?;
    Ok(())
}
