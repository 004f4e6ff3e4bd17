//! Local copies of downloaded assets.
//!
//! The cache only suppresses local writes. Every asset is still fetched from
//! Drive, since the bytes are needed for the mirror and describe steps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::drive::error::DriveError;
use crate::drive::{Asset, AssetSource};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Download(#[from] DriveError),

    #[error("Unable to create local folder {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error checking if file exists {path}: {source}")]
    Probe {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to write file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Written,
    AlreadyPresent,
}

pub struct LocalCache {
    source: Arc<dyn AssetSource>,
    folder: PathBuf,
}

impl LocalCache {
    pub fn new(source: Arc<dyn AssetSource>, folder: PathBuf) -> Self {
        Self { source, folder }
    }

    /// Where the local copy of `asset` lives. Path separators in Drive names
    /// are replaced so every copy stays directly inside the folder.
    pub fn local_path(&self, asset: &Asset) -> PathBuf {
        self.folder.join(local_file_name(&asset.name))
    }

    /// Download the asset and keep a local copy, returning the downloaded
    /// bytes whether or not the copy was written.
    pub async fn fetch(&self, asset: &Asset) -> Result<(Vec<u8>, CacheStatus), CacheError> {
        let bytes = self.source.download(asset).await?;
        tracing::debug!("Obtained file bytes {} ({})", asset.name, bytes.len());
        if let Some(listed) = asset.size.filter(|&s| s != bytes.len() as u64) {
            tracing::warn!(
                "{}: listed size {} but downloaded {} bytes",
                asset.name,
                listed,
                bytes.len()
            );
        }

        tokio::fs::create_dir_all(&self.folder)
            .await
            .map_err(|source| CacheError::CreateDir {
                path: self.folder.clone(),
                source,
            })?;

        let path = self.local_path(asset);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| CacheError::Probe {
                path: path.clone(),
                source,
            })?;
        if exists {
            tracing::info!(
                "File '{}' exists locally, skipping write.",
                path.display()
            );
            return Ok((bytes, CacheStatus::AlreadyPresent));
        }

        tracing::debug!("writing {} ...", path.display());
        write_atomic(&path, &bytes)
            .await
            .map_err(|source| CacheError::Write {
                path: path.clone(),
                source,
            })?;
        Ok((bytes, CacheStatus::Written))
    }
}

fn local_file_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Write to a uniquely named `.part` sibling, then rename into place so a
/// crash never leaves a truncated file under the final name.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let part_path = dir.join(format!(
        ".{}.{}.part",
        file_name,
        uuid::Uuid::new_v4().simple()
    ));

    if let Err(e) = tokio::fs::write(&part_path, bytes).await {
        let _ = tokio::fs::remove_file(&part_path).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&part_path, path).await {
        let _ = tokio::fs::remove_file(&part_path).await;
        return Err(e);
    }
    Ok(())
}
