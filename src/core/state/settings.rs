use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::deploy::DeviceLayout;
use crate::core::downloader::PrefixMirror;
use crate::core::error::{ModError, ModResult};

const APP_DIR_NAME: &str = "ModBridge";
const SETTINGS_FILE: &str = "settings.json";

/// Persistent installer configuration, stored as `settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Package id of the application mods are deployed into.
    pub package_id: String,
    /// Installed application version, compared against each mod's
    /// advisory target version.
    #[serde(default)]
    pub package_version: Option<String>,
    #[serde(default)]
    pub use_mirror_download: bool,
    #[serde(default)]
    pub mirror: Option<PrefixMirror>,
    pub layout: DeviceLayout,
}

impl Settings {
    pub fn new(package_id: &str) -> Self {
        Self {
            package_id: package_id.to_string(),
            package_version: None,
            use_mirror_download: false,
            mirror: None,
            layout: DeviceLayout::for_package(package_id),
        }
    }

    /// Load settings from `data_dir`, falling back to defaults for
    /// `package_id` when the file is missing or unreadable.
    pub fn load_or_default(data_dir: &Path, package_id: &str) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return Self::new(package_id),
        };

        match serde_json::from_str::<Settings>(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Corrupt settings at {:?}: {}", path, e);
                Self::new(package_id)
            }
        }
    }

    pub fn save(&self, data_dir: &Path) -> ModResult<()> {
        std::fs::create_dir_all(data_dir).map_err(|source| ModError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let path = data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| ModError::Io { path, source })
    }

    /// The mirror to apply before fetching, when mirror mode is on.
    pub fn active_mirror(&self) -> Option<&PrefixMirror> {
        if self.use_mirror_download {
            self.mirror.as_ref()
        } else {
            None
        }
    }
}

/// Host directory for settings and transient downloads.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Where archives are downloaded and extracted before upload.
pub fn staging_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("staging")
}
