use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use super::{ModManager, ResolutionStack};
use crate::core::deploy::plan_install;
use crate::core::error::{ModError, ModResult};
use crate::core::remote::READ_PERMISSION;

impl ModManager {
    /// Install a registered mod and, depth-first, everything it depends on.
    ///
    /// Does nothing if the mod is already installed. A failure leaves the
    /// mod uninstalled; files already copied are not rolled back.
    pub async fn install(&mut self, id: &str) -> ModResult<()> {
        let mut stack = ResolutionStack::default();
        self.install_with_stack(id, &mut stack).await
    }

    pub(super) fn install_with_stack<'a>(
        &'a mut self,
        id: &'a str,
        stack: &'a mut ResolutionStack,
    ) -> BoxFuture<'a, ModResult<()>> {
        Box::pin(async move {
            let manifest = match self.registry.get(id) {
                None => return Err(ModError::ModNotFound(id.to_string())),
                Some(entry) if entry.is_installed() => {
                    debug!("Mod {} is already installed. Not installing", id);
                    return Ok(());
                }
                Some(entry) => entry.manifest().clone(),
            };

            info!("Installing mod {}", id);
            let layout = self
                .layout
                .for_variant(id, manifest.loader_variant)?
                .clone();

            if let Some(app_version) = &self.package_version {
                if manifest.targets_other_package(app_version) {
                    warn!(
                        "Mod {} was built for version {} but the application is {}",
                        id,
                        manifest.package_version.as_deref().unwrap_or_default(),
                        app_version
                    );
                }
            }

            // Dependencies further down that point back at us are cycles.
            stack.push(id);
            for dependency in &manifest.dependencies {
                self.prepare_dependency(dependency, stack).await?;
            }

            let plan = plan_install(&manifest, &self.layout.storage_dir(id), &layout);
            if !plan.directories.is_empty() {
                self.remote.create_directories(&plan.directories).await?;
            }
            if !plan.is_empty() {
                self.remote.copy_files(&plan.copies).await?;
                self.remote
                    .chmod(&plan.destinations(), READ_PERMISSION)
                    .await?;
                info!("Copied {} files for mod {}", plan.copies.len(), id);
            }

            self.registry.set_installed(id, true)?;
            stack.pop(id);
            Ok(())
        })
    }
}
