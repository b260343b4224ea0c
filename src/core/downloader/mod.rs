mod client;
mod mirror;

use std::path::Path;

use async_trait::async_trait;

use crate::core::error::ModResult;

pub use client::Downloader;
pub use mirror::{MirrorResolver, PrefixMirror};

/// Fetches a dependency archive to a local path. `label` names what is
/// being fetched for progress output.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path, label: &str) -> ModResult<()>;
}
