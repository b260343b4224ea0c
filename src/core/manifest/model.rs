use semver::{Version, VersionReq};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::core::error::{ModError, ModResult};

/// Mod-loading runtime a mod targets. Decides the directory layout and
/// whether late mod files are supported.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LoaderVariant {
    #[default]
    #[serde(rename = "QuestLoader", alias = "legacy")]
    Legacy,
    #[serde(rename = "Scotland2", alias = "modern")]
    Modern,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LoaderVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderVariant::Legacy => write!(f, "legacy"),
            LoaderVariant::Modern => write!(f, "modern"),
            LoaderVariant::Unknown => write!(f, "unknown"),
        }
    }
}

/// A typed, versioned dependency on another mod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dependency {
    pub id: String,
    #[serde(rename = "version", deserialize_with = "deserialize_range")]
    pub version_range: VersionReq,
    #[serde(rename = "downloadIfMissing", default)]
    pub download_url: Option<String>,
}

/// A file copied to an explicit absolute destination on the device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileCopy {
    /// Path of the file inside the mod archive.
    pub name: String,
    pub destination: String,
}

/// Immutable description of one installable unit, as read from `mod.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub author: String,
    pub version: Version,
    /// Application version the mod was built for. Advisory only.
    #[serde(default)]
    pub package_version: Option<String>,
    #[serde(rename = "modloader", default)]
    pub loader_variant: LoaderVariant,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub library_files: Vec<String>,
    #[serde(rename = "modFiles", default)]
    pub standard_mod_files: Vec<String>,
    #[serde(default)]
    pub late_mod_files: Vec<String>,
    #[serde(default)]
    pub file_copies: Vec<FileCopy>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub is_library: bool,
}

impl ManifestModel {
    /// Parse and validate a `mod.json` document.
    pub fn from_json(raw: &str) -> ModResult<Self> {
        let manifest: ManifestModel = serde_json::from_str(raw)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> ModResult<()> {
        if self.id.trim().is_empty() {
            return Err(ModError::InvalidManifest("mod id is empty".into()));
        }

        if let Some(copy) = self
            .file_copies
            .iter()
            .find(|c| !c.destination.starts_with('/'))
        {
            return Err(ModError::InvalidManifest(format!(
                "file copy {} has a relative destination {}",
                copy.name, copy.destination
            )));
        }

        let relative = self
            .library_files
            .iter()
            .chain(&self.standard_mod_files)
            .chain(&self.late_mod_files)
            .chain(self.file_copies.iter().map(|c| &c.name))
            .chain(self.cover_image.iter());
        let destinations = self.file_copies.iter().map(|c| &c.destination);
        if let Some(path) = relative.chain(destinations).find(|p| has_parent_component(p)) {
            return Err(ModError::InvalidManifest(format!(
                "mod {} lists path {} which leaves its directory through '..'",
                self.id, path
            )));
        }

        if self.loader_variant == LoaderVariant::Legacy && !self.late_mod_files.is_empty() {
            warn!(
                "Mod {} lists late mod files but targets the legacy loader; they will be ignored",
                self.id
            );
        }

        Ok(())
    }

    /// Whether the mod's advisory target version differs from `app_version`.
    pub fn targets_other_package(&self, app_version: &str) -> bool {
        self.package_version
            .as_deref()
            .is_some_and(|target| target != app_version)
    }
}

fn has_parent_component(path: &str) -> bool {
    path.split(['/', '\\']).any(|part| part == "..")
}

/// Parse a version range, accepting space-separated comparators
/// (`>=0.1.0 <0.2.0`) as well as the comma form.
pub fn parse_version_range(raw: &str) -> ModResult<VersionReq> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(VersionReq::STAR);
    }
    if trimmed.contains(',') {
        return Ok(VersionReq::parse(trimmed)?);
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in trimmed.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op.push_str(token);
            continue;
        }
        comparators.push(format!("{pending_op}{token}"));
        pending_op.clear();
    }
    if !pending_op.is_empty() {
        return Err(ModError::InvalidManifest(format!(
            "dangling operator in version range '{raw}'"
        )));
    }

    Ok(VersionReq::parse(&comparators.join(", "))?)
}

fn deserialize_range<'de, D>(deserializer: D) -> Result<VersionReq, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_version_range(&raw).map_err(serde::de::Error::custom)
}
