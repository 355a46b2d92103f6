//! Asset hashing and staging
//!
//! Assets are content addressed: the sha256 of a file's bytes, or of every
//! file in a directory (relative path and bytes, in sorted path order).
//! Staged copies land in `<outdir>/asset.<hash>` and are never rewritten.

use crate::error::{Result, SynthError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stackflow_core::{AssetSource, Packaging};
use std::path::{Path, PathBuf};
use tokio::fs;

/// An asset with its content hash and staging location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub id: String,
    pub source_path: PathBuf,
    pub packaging: Packaging,
    pub hash: String,
}

impl AssetEntry {
    /// Hashes the asset's source path
    pub fn from_source(source: &AssetSource) -> Result<Self> {
        Ok(Self {
            id: source.id.clone(),
            source_path: source.path.clone(),
            packaging: source.packaging,
            hash: hash_path(&source.path)?,
        })
    }

    /// Key in the staging bucket
    pub fn object_key(&self) -> String {
        match self.packaging {
            Packaging::Zip => format!("{}.zip", self.hash),
            Packaging::File => match self.source_path.extension() {
                Some(ext) => format!("{}.{}", self.hash, ext.to_string_lossy()),
                None => self.hash.clone(),
            },
        }
    }

    /// Directory or file name inside the cloud assembly
    pub fn staged_name(&self) -> String {
        match (self.packaging, self.source_path.extension()) {
            (Packaging::File, Some(ext)) => format!("asset.{}.{}", self.hash, ext.to_string_lossy()),
            _ => format!("asset.{}", self.hash),
        }
    }
}

/// sha256 of a file or a directory tree, lowercase hex
pub fn hash_path(path: &Path) -> Result<String> {
    if path.is_file() {
        let bytes = std::fs::read(path)?;
        return Ok(format!("{:x}", Sha256::digest(&bytes)));
    }
    if !path.is_dir() {
        return Err(SynthError::AssetNotFound(path.to_path_buf()));
    }

    let mut hasher = Sha256::new();
    for (relative, file) in directory_files(path)? {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(&file)?);
        hasher.update([0u8]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Files under `dir` with `/`-separated relative paths, sorted
fn directory_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries = glob::glob(&pattern)
        .map_err(|e| SynthError::InvalidTemplate(format!("Invalid asset pattern: {}", e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| SynthError::Io(e.into_error()))?;
        if !path.is_file() {
            continue;
        }
        let relative = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((relative, path));
    }
    files.sort();
    Ok(files)
}

/// Copies the asset into `<outdir>/<staged name>` unless already staged.
pub async fn stage(entry: &AssetEntry, outdir: &Path) -> Result<PathBuf> {
    let target = outdir.join(entry.staged_name());
    if target.exists() {
        tracing::debug!(asset = %entry.id, "Asset already staged");
        return Ok(target);
    }

    if entry.source_path.is_file() {
        fs::copy(&entry.source_path, &target).await?;
    } else {
        for (relative, file) in directory_files(&entry.source_path)? {
            let destination = target.join(&relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(&file, &destination).await?;
        }
        // empty directories still produce a staged asset
        fs::create_dir_all(&target).await?;
    }

    tracing::debug!(asset = %entry.id, path = %target.display(), "Staged asset");
    Ok(target)
}
