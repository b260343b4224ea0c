use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::ArchiveFetcher;
use crate::core::error::{ModError, ModResult};
use crate::core::http::build_http_client;

/// HTTP fetcher for mod archives.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> ModResult<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Download `url` to `dest`, creating parent directories as needed.
    pub async fn download_file(&self, url: &str, dest: &Path) -> ModResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ModError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        // Scope the handle so it is closed before the archive is reopened.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| ModError::Io {
                    path: dest.to_path_buf(),
                    source: e,
                })?;
            file.write_all(&bytes).await.map_err(|e| ModError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            file.flush().await.map_err(|e| ModError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl ArchiveFetcher for Downloader {
    async fn fetch(&self, url: &str, dest: &Path, label: &str) -> ModResult<()> {
        info!("Downloading {} from {}", label, url);
        let size = self.download_file(url, dest).await?;
        info!("Downloaded {} ({} bytes)", label, size);
        Ok(())
    }
}
