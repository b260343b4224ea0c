use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::RemoteFs;
use crate::core::error::{ModError, ModResult};

/// A device whose filesystem is a directory on the host.
///
/// Device path `/a/b` maps to `<root>/a/b`. Used for mounted or emulated
/// targets and for exercising the installer end to end.
#[derive(Debug, Clone)]
pub struct LocalDevice {
    root: PathBuf,
}

impl LocalDevice {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host location of a device path. Paths that would leave the root
    /// through `..` are refused.
    pub fn resolve(&self, remote: &str) -> ModResult<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(remote).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(ModError::remote(
                        "resolve",
                        format!("device path {remote} escapes the device root"),
                    ));
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl RemoteFs for LocalDevice {
    async fn create_directories(&self, paths: &[String]) -> ModResult<()> {
        for path in paths {
            let target = self.resolve(path)?;
            tokio::fs::create_dir_all(&target)
                .await
                .map_err(|source| ModError::Io {
                    path: target,
                    source,
                })?;
        }
        Ok(())
    }

    async fn copy_files(&self, copies: &[(String, String)]) -> ModResult<()> {
        for (source, destination) in copies {
            let from = self.resolve(source)?;
            let to = self.resolve(destination)?;
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ModError::Io {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
            }
            tokio::fs::copy(&from, &to)
                .await
                .map_err(|e| ModError::Io { path: from, source: e })?;
            debug!("Copied {} -> {}", source, destination);
        }
        Ok(())
    }

    async fn chmod(&self, paths: &[String], mode: &str) -> ModResult<()> {
        if mode != super::READ_PERMISSION {
            return Err(ModError::remote("chmod", format!("unsupported mode {mode}")));
        }
        for path in paths {
            let target = self.resolve(path)?;
            let metadata = tokio::fs::metadata(&target)
                .await
                .map_err(|source| ModError::Io {
                    path: target.clone(),
                    source,
                })?;
            let mut permissions = metadata.permissions();
            grant_read(&mut permissions);
            tokio::fs::set_permissions(&target, permissions)
                .await
                .map_err(|source| ModError::Io {
                    path: target,
                    source,
                })?;
        }
        Ok(())
    }

    async fn delete_files(&self, paths: &[String]) -> ModResult<()> {
        let mut failures = Vec::new();
        for path in paths {
            let target = match self.resolve(path) {
                Ok(target) => target,
                Err(e) => {
                    failures.push(e.to_string());
                    continue;
                }
            };
            if let Err(e) = tokio::fs::remove_file(target).await {
                failures.push(format!("{path}: {e}"));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        Err(ModError::remote("delete", failures.join("; ")))
    }

    async fn download_file(&self, remote: &str, local: &Path) -> ModResult<()> {
        let source = self.resolve(remote)?;
        tokio::fs::copy(&source, local)
            .await
            .map_err(|e| ModError::Io { path: source, source: e })?;
        Ok(())
    }

    async fn upload_directory(&self, local: &Path, remote: &str) -> ModResult<()> {
        let source = local.to_path_buf();
        let destination = self.resolve(remote)?;
        tokio::task::spawn_blocking(move || -> ModResult<()> {
            if destination.exists() {
                std::fs::remove_dir_all(&destination).map_err(|e| ModError::Io {
                    path: destination.clone(),
                    source: e,
                })?;
            }
            std::fs::create_dir_all(&destination).map_err(|e| ModError::Io {
                path: destination.clone(),
                source: e,
            })?;
            copy_dir_recursive(&source, &destination).map_err(|e| ModError::Io {
                path: source.clone(),
                source: e,
            })
        })
        .await
        .map_err(|e| ModError::remote("upload", e.to_string()))?
    }

    async fn remove_directory(&self, remote: &str) -> ModResult<()> {
        let target = self.resolve(remote)?;
        if !target.exists() {
            return Ok(());
        }
        tokio::fs::remove_dir_all(&target)
            .await
            .map_err(|source| ModError::Io {
                path: target,
                source,
            })
    }
}

#[cfg(unix)]
fn grant_read(permissions: &mut std::fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(permissions.mode() | 0o444);
}

#[cfg(not(unix))]
fn grant_read(_permissions: &mut std::fs::Permissions) {}

fn copy_dir_recursive(source: &Path, destination: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_reports_missing_files_after_trying_all() {
        let tmp = tempfile::tempdir().unwrap();
        let device = LocalDevice::new(tmp.path().to_path_buf());
        std::fs::create_dir_all(device.resolve("/mods").unwrap()).unwrap();
        std::fs::write(device.resolve("/mods/a.so").unwrap(), b"a").unwrap();

        let result = device
            .delete_files(&["/mods/missing.so".into(), "/mods/a.so".into()])
            .await;

        assert!(result.is_err());
        assert!(!device.resolve("/mods/a.so").unwrap().exists());
    }

    #[tokio::test]
    async fn upload_replaces_previous_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let device = LocalDevice::new(tmp.path().join("device"));
        let local = tmp.path().join("local");
        std::fs::create_dir_all(local.join("nested")).unwrap();
        std::fs::write(local.join("nested/b.so"), b"b").unwrap();

        std::fs::create_dir_all(device.resolve("/store/x").unwrap()).unwrap();
        std::fs::write(device.resolve("/store/x/stale.so").unwrap(), b"old").unwrap();

        device.upload_directory(&local, "/store/x").await.unwrap();

        assert!(device.resolve("/store/x/nested/b.so").unwrap().exists());
        assert!(!device.resolve("/store/x/stale.so").unwrap().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chmod_grants_read_to_everyone() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let device = LocalDevice::new(tmp.path().to_path_buf());
        let path = device.resolve("/lib.so").unwrap();
        std::fs::write(&path, b"x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        device
            .chmod(&["/lib.so".into()], super::super::READ_PERMISSION)
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o444, 0o444);
    }

    #[tokio::test]
    async fn parent_components_cannot_leave_the_root() {
        let tmp = tempfile::tempdir().unwrap();
        let device = LocalDevice::new(tmp.path().join("device"));
        std::fs::create_dir_all(device.root()).unwrap();
        std::fs::write(device.resolve("/payload.txt").unwrap(), b"x").unwrap();

        assert!(device.resolve("/../escaped.txt").is_err());
        assert_eq!(
            device.resolve("/sdcard/./mods/a.so").unwrap(),
            tmp.path().join("device/sdcard/mods/a.so")
        );

        let copied = device
            .copy_files(&[("/payload.txt".into(), "/../escaped.txt".into())])
            .await;
        assert!(copied.is_err());
        assert!(!tmp.path().join("escaped.txt").exists());
    }
}
