use tracing::{debug, info, warn};

use super::ModManager;
use crate::core::deploy::plan_removal;
use crate::core::error::{ModError, ModResult};

impl ModManager {
    /// Remove a mod's deployed files. Library files another installed mod
    /// still lists stay in place.
    ///
    /// Uninstalling a non-library mod afterwards disables every library mod
    /// nothing installed references any more; their payloads are kept so a
    /// later install needs no download.
    pub async fn uninstall(&mut self, id: &str) -> ModResult<()> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| ModError::ModNotFound(id.to_string()))?;
        if !entry.is_installed() {
            debug!("Mod {} is already uninstalled. Not uninstalling", id);
            return Ok(());
        }
        let is_library = entry.is_library();

        self.undeploy(id).await?;

        if !is_library {
            self.clean_unused_libraries(true).await?;
        }
        Ok(())
    }

    /// Delete the deployed files of one mod and mark it uninstalled.
    pub(super) async fn undeploy(&mut self, id: &str) -> ModResult<()> {
        let manifest = match self.registry.get(id) {
            None => return Err(ModError::ModNotFound(id.to_string())),
            Some(entry) if !entry.is_installed() => return Ok(()),
            Some(entry) => entry.manifest().clone(),
        };

        info!("Uninstalling mod {} . . .", id);
        let layout = self.layout.for_variant(id, manifest.loader_variant)?;
        let plan = plan_removal(&manifest, layout, &self.registry);

        for kept in &plan.retained {
            info!(
                "Other mod {} still needs lib file {}, not removing",
                kept.used_by, kept.path
            );
        }

        if !plan.deletions.is_empty() {
            match self.remote.delete_files(&plan.deletions).await {
                Ok(()) => info!("Removed {} files for mod {}", plan.deletions.len(), id),
                Err(e) => warn!(
                    "Failed to delete some of the files to uninstall mod {}: {}. Were they removed outside of the installer?",
                    id, e
                ),
            }
        }

        self.registry.set_installed(id, false)
    }

    /// Uninstall installed library mods that no installed mod references,
    /// repeating until none are left. With `only_disable` false they are
    /// also deleted.
    pub async fn clean_unused_libraries(&mut self, only_disable: bool) -> ModResult<()> {
        loop {
            let unused = self.registry.unreferenced_libraries();
            if unused.is_empty() {
                return Ok(());
            }

            for id in unused {
                info!("Library {} is no longer used by any installed mod", id);
                self.undeploy(&id).await?;
                if !only_disable {
                    self.discard(&id).await?;
                }
            }
        }
    }
}
