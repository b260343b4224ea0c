pub mod local;

use std::path::Path;

use async_trait::async_trait;

use crate::core::error::ModResult;

pub use local::LocalDevice;

/// Permission change applied to every deployed file so the loader can read it.
pub const READ_PERMISSION: &str = "+r";

/// File operations on the target device. Paths are absolute POSIX paths on
/// the device; every batch is a single logical operation.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn create_directories(&self, paths: &[String]) -> ModResult<()>;

    /// Copy device-side files, `(source, destination)` pairs.
    async fn copy_files(&self, copies: &[(String, String)]) -> ModResult<()>;

    async fn chmod(&self, paths: &[String], mode: &str) -> ModResult<()>;

    /// Delete every path. Implementations attempt all of them and report
    /// missing or undeletable files in one error.
    async fn delete_files(&self, paths: &[String]) -> ModResult<()>;

    /// Pull a single device file to the host.
    async fn download_file(&self, remote: &str, local: &Path) -> ModResult<()>;

    /// Push a host directory to the device, replacing previous contents.
    async fn upload_directory(&self, local: &Path, remote: &str) -> ModResult<()>;

    async fn remove_directory(&self, remote: &str) -> ModResult<()>;
}

/// Join a device path and a relative name with `/`.
pub fn join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        return format!("/{name}");
    }
    format!("{base}/{name}")
}

/// Last component of a device or archive path.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Parent directory of a device path, if it has one below the root.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}
