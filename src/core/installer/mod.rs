mod install;
mod resolver;
mod uninstall;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

pub use resolver::ResolutionStack;

use crate::core::deploy::DeviceLayout;
use crate::core::downloader::{ArchiveFetcher, Downloader, MirrorResolver};
use crate::core::error::{ModError, ModResult};
use crate::core::manifest::{ManifestModel, ModArchive};
use crate::core::registry::{ModEvent, ModRegistry};
use crate::core::remote::RemoteFs;
use crate::core::state::{staging_dir, Settings};

/// Owns the mod registry and drives install, uninstall and loading
/// against one target device.
///
/// Every mutating operation takes `&mut self`: at most one runs at a time.
/// Callers that share a manager wrap it in `Arc<tokio::sync::Mutex<_>>`.
pub struct ModManager {
    registry: ModRegistry,
    layout: DeviceLayout,
    remote: Arc<dyn RemoteFs>,
    fetcher: Arc<dyn ArchiveFetcher>,
    mirror: Option<Arc<dyn MirrorResolver>>,
    /// Host directory for downloaded archives and extraction.
    staging_dir: PathBuf,
    package_version: Option<String>,
}

impl ModManager {
    pub fn new(
        layout: DeviceLayout,
        remote: Arc<dyn RemoteFs>,
        fetcher: Arc<dyn ArchiveFetcher>,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            registry: ModRegistry::new(),
            layout,
            remote,
            fetcher,
            mirror: None,
            staging_dir,
            package_version: None,
        }
    }

    /// Build a manager with the HTTP downloader and the configured mirror.
    pub fn from_settings(
        settings: &Settings,
        data_dir: &Path,
        remote: Arc<dyn RemoteFs>,
    ) -> ModResult<Self> {
        let mut manager = Self::new(
            settings.layout.clone(),
            remote,
            Arc::new(Downloader::new()?),
            staging_dir(data_dir),
        );
        if let Some(mirror) = settings.active_mirror() {
            manager = manager.with_mirror(Arc::new(mirror.clone()));
        }
        if let Some(version) = &settings.package_version {
            manager = manager.with_package_version(version.clone());
        }
        Ok(manager)
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn MirrorResolver>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_package_version(mut self, version: impl Into<String>) -> Self {
        self.package_version = Some(version.into());
        self
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    pub fn layout(&self) -> &DeviceLayout {
        &self.layout
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModEvent> {
        self.registry.subscribe()
    }

    /// Create every loader directory and the storage root on the device.
    pub async fn prepare_directories(&self) -> ModResult<()> {
        self.remote
            .create_directories(&self.layout.all_directories())
            .await
    }

    /// Register a manifest whose payload is already in device storage.
    pub async fn register(&mut self, manifest: ManifestModel) -> ModResult<()> {
        manifest.validate()?;
        self.replace_entry(manifest).await
    }

    /// Open a mod archive, push its payload to device storage and register
    /// it. Returns the mod id.
    pub async fn load_from_archive(&mut self, path: &Path) -> ModResult<String> {
        let archive = ModArchive::open(path).await?;
        self.import_archive(&archive).await
    }

    async fn import_archive(&mut self, archive: &ModArchive) -> ModResult<String> {
        let manifest = archive.manifest().clone();
        let id = manifest.id.clone();

        self.ensure_staging().await?;
        let extracted = self.staging_dir.join(format!("extract-{}", Uuid::new_v4()));
        archive.extract_to(&extracted).await?;

        let uploaded = self
            .remote
            .upload_directory(&extracted, &self.layout.storage_dir(&id))
            .await;
        if let Err(e) = tokio::fs::remove_dir_all(&extracted).await {
            debug!("Could not remove staging dir {:?}: {}", extracted, e);
        }
        uploaded?;

        info!("Loaded mod {} v{}", id, manifest.version);
        self.replace_entry(manifest).await?;
        Ok(id)
    }

    /// Upgrade-replace: an installed mod with the same id is undeployed
    /// before its entry is swapped.
    async fn replace_entry(&mut self, manifest: ManifestModel) -> ModResult<()> {
        if let Some(existing) = self.registry.get(&manifest.id) {
            if existing.is_installed() {
                info!(
                    "Replacing installed mod {} v{} with v{}",
                    manifest.id,
                    existing.version(),
                    manifest.version
                );
                self.undeploy(&manifest.id).await?;
            }
        }
        self.registry.insert(manifest);
        Ok(())
    }

    /// Uninstall (if needed), drop the extracted payload and forget the mod.
    pub async fn delete_mod(&mut self, id: &str) -> ModResult<()> {
        let installed = self
            .registry
            .get(id)
            .ok_or_else(|| ModError::ModNotFound(id.to_string()))?
            .is_installed();
        if installed {
            self.uninstall(id).await?;
        }
        self.discard(id).await
    }

    async fn discard(&mut self, id: &str) -> ModResult<()> {
        info!("Deleting mod {}", id);
        self.remote
            .remove_directory(&self.layout.storage_dir(id))
            .await?;
        self.registry.remove(id);
        Ok(())
    }

    /// Read the mod's cover image from device storage, fully buffered.
    /// Returns `None` when the manifest declares no cover.
    pub async fn open_cover_image(&self, id: &str) -> ModResult<Option<Vec<u8>>> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| ModError::ModNotFound(id.to_string()))?;
        let Some(cover) = &entry.manifest().cover_image else {
            return Ok(None);
        };

        let remote_path = crate::core::remote::join(&self.layout.storage_dir(id), cover);
        self.ensure_staging().await?;
        // Removed on drop, whichever way this returns.
        let local = tempfile::Builder::new()
            .prefix("cover-")
            .tempfile_in(&self.staging_dir)
            .map_err(|source| ModError::Io {
                path: self.staging_dir.clone(),
                source,
            })?;

        self.remote.download_file(&remote_path, local.path()).await?;
        let bytes = tokio::fs::read(local.path())
            .await
            .map_err(|source| ModError::Io {
                path: local.path().to_path_buf(),
                source,
            })?;
        Ok(Some(bytes))
    }

    async fn ensure_staging(&self) -> ModResult<()> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|source| ModError::Io {
                path: self.staging_dir.clone(),
                source,
            })
    }
}
