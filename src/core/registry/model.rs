use chrono::{DateTime, Utc};
use semver::Version;
use serde::Serialize;

use crate::core::manifest::ManifestModel;

/// A loaded mod: its manifest plus whether it is currently deployed.
///
/// Only the install and uninstall paths may flip `installed`; the registry
/// exposes the setter to the crate alone.
#[derive(Debug, Clone, Serialize)]
pub struct Mod {
    manifest: ManifestModel,
    installed: bool,
}

impl Mod {
    pub(crate) fn new(manifest: ManifestModel) -> Self {
        Self {
            manifest,
            installed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn version(&self) -> &Version {
        &self.manifest.version
    }

    pub fn manifest(&self) -> &ManifestModel {
        &self.manifest
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn is_library(&self) -> bool {
        self.manifest.is_library
    }

    pub(super) fn set_installed(&mut self, installed: bool) -> bool {
        let changed = self.installed != installed;
        self.installed = installed;
        changed
    }

    /// Whether this mod needs `other`, either by declaring a dependency on it
    /// or by shipping one of the same library files.
    pub fn references(&self, other: &Mod) -> bool {
        self.manifest.dependencies.iter().any(|d| d.id == other.id())
            || self
                .manifest
                .library_files
                .iter()
                .any(|lib| other.manifest.library_files.contains(lib))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModEventKind {
    Loaded,
    Installed,
    Uninstalled,
    Removed,
}

/// Payload broadcast to observers whenever a mod changes state.
#[derive(Debug, Clone, Serialize)]
pub struct ModEvent {
    pub id: String,
    pub kind: ModEventKind,
    pub at: DateTime<Utc>,
}

impl ModEvent {
    pub fn new(id: &str, kind: ModEventKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            at: Utc::now(),
        }
    }
}
