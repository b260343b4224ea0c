use serde::{Deserialize, Serialize};

use crate::core::error::{ModError, ModResult};
use crate::core::manifest::LoaderVariant;
use crate::core::remote;

/// Directories one loader variant reads from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoaderLayout {
    pub libs: String,
    /// Standard mods; early mods for the modern loader.
    pub early_mods: String,
    /// `None` when the loader has no late-mod stage.
    pub late_mods: Option<String>,
}

/// Directory table for a target application, selected by loader variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceLayout {
    pub legacy: LoaderLayout,
    pub modern: LoaderLayout,
    /// Where each mod's extracted payload is kept on the device.
    pub storage: String,
}

impl DeviceLayout {
    pub fn for_package(package_id: &str) -> Self {
        let legacy_root = format!("/sdcard/Android/data/{package_id}/files");
        let modern_root = format!("/sdcard/ModData/{package_id}/Modloader");

        Self {
            legacy: LoaderLayout {
                libs: remote::join(&legacy_root, "libs"),
                early_mods: remote::join(&legacy_root, "mods"),
                late_mods: None,
            },
            modern: LoaderLayout {
                libs: remote::join(&modern_root, "libs"),
                early_mods: remote::join(&modern_root, "early_mods"),
                late_mods: Some(remote::join(&modern_root, "mods")),
            },
            storage: format!("/sdcard/ModData/{package_id}/Mods"),
        }
    }

    /// Layout for a mod's loader variant; unknown variants are refused.
    pub fn for_variant(&self, mod_id: &str, variant: LoaderVariant) -> ModResult<&LoaderLayout> {
        match variant {
            LoaderVariant::Legacy => Ok(&self.legacy),
            LoaderVariant::Modern => Ok(&self.modern),
            LoaderVariant::Unknown => Err(ModError::UnsupportedLoaderVariant {
                id: mod_id.to_string(),
            }),
        }
    }

    pub fn storage_dir(&self, mod_id: &str) -> String {
        remote::join(&self.storage, mod_id)
    }

    /// Every directory the installer expects to exist up front.
    pub fn all_directories(&self) -> Vec<String> {
        let mut dirs = Vec::new();
        for layout in [&self.legacy, &self.modern] {
            dirs.push(layout.libs.clone());
            dirs.push(layout.early_mods.clone());
            if let Some(late) = &layout.late_mods {
                dirs.push(late.clone());
            }
        }
        dirs.push(self.storage.clone());
        dirs.dedup();
        dirs
    }
}
