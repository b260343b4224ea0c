use tracing::debug;

use super::layout::LoaderLayout;
use crate::core::manifest::{LoaderVariant, ManifestModel};
use crate::core::registry::ModRegistry;
use crate::core::remote;

/// Everything needed to place one mod's files on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPlan {
    /// Parent directories of generic file copies that the layout does not
    /// already provide.
    pub directories: Vec<String>,
    /// `(source, destination)` device paths.
    pub copies: Vec<(String, String)>,
}

impl CopyPlan {
    pub fn destinations(&self) -> Vec<String> {
        self.copies.iter().map(|(_, dst)| dst.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}

/// A library file kept on the device because another mod still lists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedLibrary {
    pub path: String,
    pub used_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalPlan {
    pub deletions: Vec<String>,
    pub retained: Vec<RetainedLibrary>,
}

fn late_mods_dir<'a>(manifest: &ManifestModel, layout: &'a LoaderLayout) -> Option<&'a str> {
    match manifest.loader_variant {
        LoaderVariant::Modern => layout.late_mods.as_deref(),
        _ => None,
    }
}

/// Pair every categorized file with its destination.
///
/// Library and mod files keep their file name and land in the variant's
/// directories; generic copies go to their declared destination.
pub fn plan_install(manifest: &ManifestModel, storage_dir: &str, layout: &LoaderLayout) -> CopyPlan {
    let mut plan = CopyPlan::default();
    let source = |name: &str| remote::join(storage_dir, name);

    for lib in &manifest.library_files {
        debug!("Planning library file copy {}", lib);
        plan.copies
            .push((source(lib), remote::join(&layout.libs, remote::file_name(lib))));
    }

    for file in &manifest.standard_mod_files {
        debug!("Planning (early) mod file copy {}", file);
        plan.copies.push((
            source(file),
            remote::join(&layout.early_mods, remote::file_name(file)),
        ));
    }

    if let Some(late_dir) = late_mods_dir(manifest, layout) {
        for file in &manifest.late_mod_files {
            debug!("Planning late mod file copy {}", file);
            plan.copies
                .push((source(file), remote::join(late_dir, remote::file_name(file))));
        }
    }

    let guaranteed = [
        Some(layout.libs.as_str()),
        Some(layout.early_mods.as_str()),
        layout.late_mods.as_deref(),
    ];
    for copy in &manifest.file_copies {
        debug!("Planning file copy {} to {}", copy.name, copy.destination);
        if let Some(dir) = remote::parent(&copy.destination) {
            let known =
                guaranteed.contains(&Some(dir)) || plan.directories.iter().any(|d| d == dir);
            if !known {
                plan.directories.push(dir.to_string());
            }
        }
        plan.copies.push((source(&copy.name), copy.destination.clone()));
    }

    plan
}

/// Work out which files uninstalling `manifest` removes. Library files are
/// kept while any other installed mod still lists the same relative path.
pub fn plan_removal(
    manifest: &ManifestModel,
    layout: &LoaderLayout,
    registry: &ModRegistry,
) -> RemovalPlan {
    let mut plan = RemovalPlan::default();

    for file in &manifest.standard_mod_files {
        debug!("Planning removal of (early) mod file {}", file);
        plan.deletions
            .push(remote::join(&layout.early_mods, remote::file_name(file)));
    }

    if let Some(late_dir) = late_mods_dir(manifest, layout) {
        for file in &manifest.late_mod_files {
            debug!("Planning removal of late mod file {}", file);
            plan.deletions.push(remote::join(late_dir, remote::file_name(file)));
        }
    }

    for lib in &manifest.library_files {
        match registry.library_user(lib, &manifest.id) {
            Some(other) => {
                debug!("Other mod {} still needs lib file {}, keeping it", other.id(), lib);
                plan.retained.push(RetainedLibrary {
                    path: lib.clone(),
                    used_by: other.id().to_string(),
                });
            }
            None => {
                debug!("Planning removal of library file {}", lib);
                plan.deletions
                    .push(remote::join(&layout.libs, remote::file_name(lib)));
            }
        }
    }

    for copy in &manifest.file_copies {
        debug!("Planning removal of copied file {}", copy.destination);
        plan.deletions.push(copy.destination.clone());
    }

    plan
}
