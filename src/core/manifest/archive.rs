use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use super::model::ManifestModel;
use crate::core::error::{ModError, ModResult};

/// Name of the manifest entry at the root of every mod archive.
pub const MANIFEST_FILE: &str = "mod.json";

/// A packaged mod archive on local disk, with its manifest already parsed.
#[derive(Debug, Clone)]
pub struct ModArchive {
    path: PathBuf,
    manifest: ManifestModel,
}

impl ModArchive {
    /// Open a zip archive and parse its `mod.json`.
    pub async fn open(path: &Path) -> ModResult<Self> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::open_blocking(owned))
            .await
            .map_err(|e| ModError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?
    }

    fn open_blocking(path: PathBuf) -> ModResult<Self> {
        let file = File::open(&path).map_err(|source| ModError::Io {
            path: path.clone(),
            source,
        })?;
        let mut archive = ZipArchive::new(file)?;

        let raw = {
            let mut entry = archive.by_name(MANIFEST_FILE).map_err(|e| match e {
                ZipError::FileNotFound => ModError::InvalidManifest(format!(
                    "archive {:?} has no {}",
                    path, MANIFEST_FILE
                )),
                other => ModError::Zip(other),
            })?;
            let mut raw = String::new();
            entry.read_to_string(&mut raw).map_err(|source| ModError::Io {
                path: path.clone(),
                source,
            })?;
            raw
        };

        let manifest = ManifestModel::from_json(&raw)?;
        debug!("Opened archive {:?} for mod {} v{}", path, manifest.id, manifest.version);
        Ok(Self { path, manifest })
    }

    pub fn manifest(&self) -> &ManifestModel {
        &self.manifest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract the whole archive into `dest`, replacing anything already there.
    pub async fn extract_to(&self, dest: &Path) -> ModResult<()> {
        let source = self.path.clone();
        let target = dest.to_path_buf();
        tokio::task::spawn_blocking(move || -> ModResult<()> {
            if target.exists() {
                std::fs::remove_dir_all(&target).map_err(|e| ModError::Io {
                    path: target.clone(),
                    source: e,
                })?;
            }
            std::fs::create_dir_all(&target).map_err(|e| ModError::Io {
                path: target.clone(),
                source: e,
            })?;

            let file = File::open(&source).map_err(|e| ModError::Io {
                path: source.clone(),
                source: e,
            })?;
            ZipArchive::new(file)?.extract(&target)?;
            Ok(())
        })
        .await
        .map_err(|e| ModError::Io {
            path: dest.to_path_buf(),
            source: std::io::Error::other(e),
        })?
    }
}
