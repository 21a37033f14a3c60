//! Asset staging: locate the schema file and code directory and fingerprint their contents.
//! Staging happens before any resource is registered, so a missing asset aborts with nothing built.

use crate::error::ConfigError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    File,
    Directory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub id: String,
    pub kind: AssetKind,
    pub source: PathBuf,
    /// Lowercase hex SHA-256 over the asset contents.
    pub hash: String,
    /// Files of a directory asset as staged; packaging reads exactly these.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<AssetFile>,
}

/// One file of a staged directory: `/`-separated path relative to the asset source and its SHA-256.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssetFile {
    pub path: String,
    pub digest: String,
}

impl Asset {
    /// Object key under which the packaged asset is published.
    pub fn object_key(&self) -> String {
        match self.kind {
            AssetKind::File => self.hash.clone(),
            AssetKind::Directory => format!("{}.zip", self.hash),
        }
    }
}

/// A staged file asset together with its text, for definitions that are inlined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedFile {
    pub asset: Asset,
    pub contents: String,
}

fn read_error(path: &Path, e: std::io::Error) -> ConfigError {
    ConfigError::Load(format!("{}: {}", path.display(), e))
}

/// Stage a single text file (e.g. the GraphQL schema).
pub fn stage_file(id: &str, kind: &'static str, path: &Path) -> Result<StagedFile, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::MissingAsset {
            kind,
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path).map_err(|e| read_error(path, e))?;
    let hash = file_digest(contents.as_bytes());
    tracing::debug!(id, path = %path.display(), hash = %hash, "staged file asset");
    Ok(StagedFile {
        asset: Asset {
            id: id.to_string(),
            kind: AssetKind::File,
            source: path.to_path_buf(),
            hash,
            files: Vec::new(),
        },
        contents,
    })
}

/// Stage a directory (e.g. function code). The hash covers relative paths and contents
/// of every file, in sorted order.
pub fn stage_directory(id: &str, kind: &'static str, path: &Path) -> Result<Asset, ConfigError> {
    if !path.is_dir() {
        return Err(ConfigError::MissingAsset {
            kind,
            path: path.to_path_buf(),
        });
    }
    let listing = directory_files(path).map_err(|e| read_error(path, e))?;
    let mut hasher = Sha256::new();
    let mut files = Vec::with_capacity(listing.len());
    for (rel, abs) in listing {
        let bytes = fs::read(&abs).map_err(|e| read_error(&abs, e))?;
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        hasher.update(&bytes);
        hasher.update([0u8]);
        files.push(AssetFile {
            path: rel,
            digest: file_digest(&bytes),
        });
    }
    let hash = format!("{:x}", hasher.finalize());
    tracing::debug!(id, path = %path.display(), files = files.len(), hash = %hash, "staged directory asset");
    Ok(Asset {
        id: id.to_string(),
        kind: AssetKind::Directory,
        source: path.to_path_buf(),
        hash,
        files,
    })
}

pub fn file_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// All files under `root` as (`/`-separated relative path, absolute path), sorted by relative path.
/// Symbolic links are followed; a directory reachable twice through links is walked once.
pub fn directory_files(root: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    visited.insert(fs::canonicalize(root)?);
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            // fs::metadata resolves links; a dangling link is an error, not a skipped file.
            let meta = fs::metadata(&path)?;
            if meta.is_dir() {
                if visited.insert(fs::canonicalize(&path)?) {
                    pending.push(path);
                }
            } else if meta.is_file() {
                let rel = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push((rel, path));
            }
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
