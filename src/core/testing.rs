//! Shared fixtures for unit tests: a recording device backed by a temp
//! directory and a fetcher that serves archives from a URL map.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use semver::Version;
use tempfile::TempDir;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::core::deploy::DeviceLayout;
use crate::core::downloader::ArchiveFetcher;
use crate::core::error::{ModError, ModResult};
use crate::core::installer::ModManager;
use crate::core::manifest::{parse_version_range, Dependency, LoaderVariant, ManifestModel, MANIFEST_FILE};
use crate::core::remote::{LocalDevice, RemoteFs};

pub(crate) const PACKAGE: &str = "com.example.game";

pub(crate) fn manifest(id: &str, version: &str) -> ManifestModel {
    ManifestModel {
        id: id.to_string(),
        name: id.to_string(),
        author: "tester".to_string(),
        version: Version::parse(version).unwrap(),
        package_version: None,
        loader_variant: LoaderVariant::Legacy,
        dependencies: Vec::new(),
        library_files: Vec::new(),
        standard_mod_files: Vec::new(),
        late_mod_files: Vec::new(),
        file_copies: Vec::new(),
        cover_image: None,
        is_library: false,
    }
}

pub(crate) fn dependency(id: &str, range: &str, url: Option<&str>) -> Dependency {
    Dependency {
        id: id.to_string(),
        version_range: parse_version_range(range).unwrap(),
        download_url: url.map(str::to_string),
    }
}

/// Write a zip with `mod.json` plus the given entries into `dir`.
pub(crate) fn write_archive(dir: &Path, manifest: serde_json::Value, files: &[(&str, &[u8])]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{}.qmod", Uuid::new_v4()));
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default();

    writer.start_file(MANIFEST_FILE, options).unwrap();
    writer.write_all(manifest.to_string().as_bytes()).unwrap();
    for (name, bytes) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// A [`LocalDevice`] that logs the name of every batch operation.
pub(crate) struct RecordingFs {
    device: LocalDevice,
    ops: Mutex<Vec<String>>,
}

impl RecordingFs {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self {
            device: LocalDevice::new(root),
            ops: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn device(&self) -> &LocalDevice {
        &self.device
    }

    pub(crate) fn operations(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    fn record(&self, op: &str) {
        self.ops.lock().unwrap().push(op.to_string());
    }
}

#[async_trait]
impl RemoteFs for RecordingFs {
    async fn create_directories(&self, paths: &[String]) -> ModResult<()> {
        self.record("mkdir");
        self.device.create_directories(paths).await
    }

    async fn copy_files(&self, copies: &[(String, String)]) -> ModResult<()> {
        self.record("copy");
        self.device.copy_files(copies).await
    }

    async fn chmod(&self, paths: &[String], mode: &str) -> ModResult<()> {
        self.record("chmod");
        self.device.chmod(paths, mode).await
    }

    async fn delete_files(&self, paths: &[String]) -> ModResult<()> {
        self.record("delete");
        self.device.delete_files(paths).await
    }

    async fn download_file(&self, remote: &str, local: &Path) -> ModResult<()> {
        self.record("download");
        self.device.download_file(remote, local).await
    }

    async fn upload_directory(&self, local: &Path, remote: &str) -> ModResult<()> {
        self.record("upload");
        self.device.upload_directory(local, remote).await
    }

    async fn remove_directory(&self, remote: &str) -> ModResult<()> {
        self.record("rmdir");
        self.device.remove_directory(remote).await
    }
}

/// Serves local archive files by URL; anything else is a 404.
#[derive(Default)]
pub(crate) struct MapFetcher {
    routes: Mutex<HashMap<String, PathBuf>>,
    fetched: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub(crate) fn serve(&self, url: &str, archive: PathBuf) {
        self.routes.lock().unwrap().insert(url.to_string(), archive);
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveFetcher for MapFetcher {
    async fn fetch(&self, url: &str, dest: &Path, _label: &str) -> ModResult<()> {
        self.fetched.lock().unwrap().push(url.to_string());
        let source = self.routes.lock().unwrap().get(url).cloned();
        let Some(source) = source else {
            return Err(ModError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            });
        };
        tokio::fs::copy(&source, dest)
            .await
            .map_err(|e| ModError::Io { path: source, source: e })?;
        Ok(())
    }
}

/// A manager wired to a recording device and a map fetcher, all under one
/// temp directory.
pub(crate) struct Fixture {
    tmp: TempDir,
    pub(crate) fs: Arc<RecordingFs>,
    pub(crate) fetcher: Arc<MapFetcher>,
    pub(crate) manager: ModManager,
}

impl Fixture {
    pub(crate) async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let fs = Arc::new(RecordingFs::new(tmp.path().join("device")));
        let fetcher = Arc::new(MapFetcher::default());
        let manager = ModManager::new(
            DeviceLayout::for_package(PACKAGE),
            fs.clone(),
            fetcher.clone(),
            tmp.path().join("staging"),
        );
        manager.prepare_directories().await.unwrap();
        fs.clear();

        Self {
            tmp,
            fs,
            fetcher,
            manager,
        }
    }

    /// A fresh manager over the same device, fetcher and staging directory.
    pub(crate) fn rebuild_manager(&self) -> ModManager {
        ModManager::new(
            DeviceLayout::for_package(PACKAGE),
            self.fs.clone(),
            self.fetcher.clone(),
            self.tmp.path().join("staging"),
        )
    }

    /// Put the manifest's payload into device storage and register it.
    /// Each file's content is its own name.
    pub(crate) async fn add(&mut self, manifest: ManifestModel) {
        let storage = self.manager.layout().storage_dir(&manifest.id);
        let names = manifest
            .library_files
            .iter()
            .chain(&manifest.standard_mod_files)
            .chain(&manifest.late_mod_files)
            .chain(manifest.file_copies.iter().map(|c| &c.name))
            .chain(manifest.cover_image.iter());
        for name in names {
            let path = self
                .fs
                .device()
                .resolve(&crate::core::remote::join(&storage, name))
                .unwrap();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, name.as_bytes()).unwrap();
        }
        self.manager.register(manifest).await.unwrap();
    }

    pub(crate) fn archive(&self, manifest: serde_json::Value, files: &[(&str, &[u8])]) -> PathBuf {
        write_archive(&self.tmp.path().join("archives"), manifest, files)
    }

    /// Host path next to the device root, outside of it.
    pub(crate) fn outside_device(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }

    /// Number of entries left in the staging directory.
    pub(crate) fn staging_entries(&self) -> usize {
        std::fs::read_dir(self.tmp.path().join("staging"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub(crate) fn exists(&self, remote: &str) -> bool {
        self.fs.device().resolve(remote).unwrap().exists()
    }

    /// Every file on the device, relative to its root, sorted.
    pub(crate) fn device_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, root: &Path, out: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, root, out);
                } else {
                    out.push(path.strip_prefix(root).unwrap().to_path_buf());
                }
            }
        }

        let root = self.fs.device().root();
        let mut files = Vec::new();
        walk(root, root, &mut files);
        files.sort();
        files
    }
}
