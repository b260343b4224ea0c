use std::path::Path;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ModManager;
use crate::core::error::{ModError, ModResult};
use crate::core::manifest::{Dependency, ModArchive};

/// Mod ids currently being installed down one call chain, outermost first.
///
/// Owned by a single top-level install; never shared between attempts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionStack {
    ids: Vec<String>,
}

impl ResolutionStack {
    pub fn push(&mut self, id: &str) {
        self.ids.push(id.to_string());
    }

    /// Remove the innermost occurrence of `id`.
    pub fn pop(&mut self, id: &str) {
        if let Some(pos) = self.ids.iter().rposition(|i| i == id) {
            self.ids.remove(pos);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// If `id` is already on the stack, the chain from its first occurrence
    /// back around to `id`.
    pub fn cycle_through(&self, id: &str) -> Option<Vec<String>> {
        let start = self.ids.iter().position(|i| i == id)?;
        let mut chain = self.ids[start..].to_vec();
        chain.push(id.to_string());
        Some(chain)
    }
}

impl ModManager {
    /// Make sure `dependency` is registered, within range and installed.
    ///
    /// Reuses a compatible registered mod; otherwise downloads the
    /// dependency when it names a URL, superseding an incompatible version.
    pub(super) async fn prepare_dependency(
        &mut self,
        dependency: &Dependency,
        stack: &mut ResolutionStack,
    ) -> ModResult<()> {
        debug!(
            "Preparing dependency {} version {}",
            dependency.id, dependency.version_range
        );

        if let Some(chain) = stack.cycle_through(&dependency.id) {
            return Err(ModError::CyclicDependency { chain });
        }

        if let Some(existing) = self.registry.get(&dependency.id) {
            let version = existing.version().clone();
            if dependency.version_range.matches(&version) {
                debug!(
                    "Dependency {} is already loaded and within the version range",
                    dependency.id
                );
                if !existing.is_installed() {
                    info!("Installing dependency {} . . .", dependency.id);
                    self.install_with_stack(&dependency.id, stack).await?;
                }
                return Ok(());
            }

            if dependency.download_url.is_none() {
                return Err(ModError::UnsatisfiableVersion {
                    id: dependency.id.clone(),
                    required: dependency.version_range.to_string(),
                    actual: version.to_string(),
                    reason: "Upgrading was not possible as there was no download link provided"
                        .into(),
                });
            }

            warn!(
                "Dependency {} is loaded with an incompatible version ({} does not satisfy {}); attempting to upgrade it",
                dependency.id, version, dependency.version_range
            );
        }

        let url = dependency
            .download_url
            .clone()
            .ok_or_else(|| ModError::MissingDependency {
                id: dependency.id.clone(),
            })?;
        self.download_dependency(dependency, &url, stack).await
    }

    async fn download_dependency(
        &mut self,
        dependency: &Dependency,
        url: &str,
        stack: &mut ResolutionStack,
    ) -> ModResult<()> {
        let effective_url = match &self.mirror {
            Some(mirror) => mirror.resolve(url).await?,
            None => url.to_string(),
        };

        self.ensure_staging().await?;
        let archive_path = self.staging_dir.join(format!("{}.qmod", Uuid::new_v4()));

        info!("Downloading dependency {} . . .", dependency.id);
        let imported = self
            .fetch_verified(dependency, &effective_url, &archive_path)
            .await;
        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            debug!("Could not remove downloaded archive {:?}: {}", archive_path, e);
        }
        let id = imported?;

        self.install_with_stack(&id, stack).await
    }

    /// Fetch the archive and check it is the mod and version asked for
    /// before it is registered.
    async fn fetch_verified(
        &mut self,
        dependency: &Dependency,
        url: &str,
        archive_path: &Path,
    ) -> ModResult<String> {
        self.fetcher.fetch(url, archive_path, &dependency.id).await?;
        let archive = ModArchive::open(archive_path).await?;
        let downloaded = archive.manifest();

        if downloaded.id != dependency.id {
            return Err(ModError::IdentityMismatch {
                expected: dependency.id.clone(),
                actual: downloaded.id.clone(),
            });
        }

        if !dependency.version_range.matches(&downloaded.version) {
            return Err(ModError::UnsatisfiableVersion {
                id: dependency.id.clone(),
                required: dependency.version_range.to_string(),
                actual: downloaded.version.to_string(),
                reason: "The downloaded mod is not within the range stated in the dependency info"
                    .into(),
            });
        }

        self.import_archive(&archive).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::PrefixMirror;
    use crate::core::testing::{dependency, manifest, Fixture};
    use std::sync::Arc;

    #[test]
    fn cycle_chain_starts_at_first_occurrence() {
        let mut stack = ResolutionStack::default();
        stack.push("root");
        stack.push("A");
        stack.push("B");

        assert_eq!(
            stack.cycle_through("A").unwrap(),
            vec!["A".to_string(), "B".to_string(), "A".to_string()]
        );
        assert!(stack.cycle_through("C").is_none());

        stack.pop("B");
        assert!(!stack.contains("B"));
    }

    #[tokio::test]
    async fn compatible_registered_dependency_needs_no_download() {
        let mut fx = Fixture::new().await;
        fx.add(manifest("B", "1.2.0")).await;
        fx.manager.install("B").await.unwrap();
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("B", "^1.0.0", None)];
        fx.add(a).await;

        fx.manager.install("A").await.unwrap();

        assert!(fx.fetcher.fetched().is_empty());
        assert!(fx.manager.registry().get("A").unwrap().is_installed());
    }

    #[tokio::test]
    async fn uninstalled_compatible_dependency_is_installed_first() {
        let mut fx = Fixture::new().await;
        let mut b = manifest("B", "1.0.0");
        b.standard_mod_files = vec!["libb.so".into()];
        fx.add(b).await;
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("B", "^1.0.0", None)];
        fx.add(a).await;
        let mut events = fx.manager.subscribe();

        fx.manager.install("A").await.unwrap();

        assert_eq!(events.recv().await.unwrap().id, "B");
        assert_eq!(events.recv().await.unwrap().id, "A");
    }

    #[tokio::test]
    async fn incompatible_dependency_without_url_is_unsatisfiable() {
        let mut fx = Fixture::new().await;
        fx.add(manifest("B", "1.0.0")).await;
        fx.manager.install("B").await.unwrap();
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("B", "^2.0.0", None)];
        fx.add(a).await;

        let err = fx.manager.install("A").await.unwrap_err();

        assert!(matches!(
            &err,
            ModError::UnsatisfiableVersion { id, actual, .. } if id == "B" && actual == "1.0.0"
        ));
        let b = fx.manager.registry().get("B").unwrap();
        assert!(b.is_installed());
        assert_eq!(b.version().to_string(), "1.0.0");
        assert!(!fx.manager.registry().get("A").unwrap().is_installed());
    }

    #[tokio::test]
    async fn missing_dependency_without_url_fails() {
        let mut fx = Fixture::new().await;
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("ghost", "*", None)];
        fx.add(a).await;

        let err = fx.manager.install("A").await.unwrap_err();

        assert!(matches!(err, ModError::MissingDependency { id } if id == "ghost"));
        assert!(fx.fs.operations().is_empty());
    }

    #[tokio::test]
    async fn incompatible_dependency_is_upgraded_from_its_url() {
        let mut fx = Fixture::new().await;
        let mut old_b = manifest("B", "1.0.0");
        old_b.standard_mod_files = vec!["libb1.so".into()];
        fx.add(old_b).await;
        fx.manager.install("B").await.unwrap();

        let archive = fx.archive(
            serde_json::json!({"id": "B", "version": "2.0.0", "modFiles": ["libb2.so"]}),
            &[("libb2.so", b"two".as_slice())],
        );
        fx.fetcher.serve("https://example.com/b.qmod", archive);
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("B", "^2.0.0", Some("https://example.com/b.qmod"))];
        a.standard_mod_files = vec!["liba.so".into()];
        fx.add(a).await;

        fx.manager.install("A").await.unwrap();

        let registry = fx.manager.registry();
        assert_eq!(registry.get("B").unwrap().version().to_string(), "2.0.0");
        assert!(registry.get("B").unwrap().is_installed());
        assert!(registry.get("A").unwrap().is_installed());
        let mods_dir = &fx.manager.layout().legacy.early_mods;
        assert!(fx.exists(&format!("{mods_dir}/libb2.so")));
        assert!(!fx.exists(&format!("{mods_dir}/libb1.so")));
        assert!(fx.exists(&format!("{mods_dir}/liba.so")));
    }

    #[tokio::test]
    async fn missing_dependency_is_downloaded_through_mirror() {
        let mut fx = Fixture::new().await;
        fx.manager = fx.rebuild_manager().with_mirror(Arc::new(PrefixMirror::new(
            "https://github.com/",
            "https://mirror.example/",
        )));
        let archive = fx.archive(serde_json::json!({"id": "B", "version": "1.0.0"}), &[]);
        fx.fetcher.serve("https://mirror.example/b.qmod", archive);
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("B", "^1.0.0", Some("https://github.com/b.qmod"))];
        fx.add(a).await;

        fx.manager.install("A").await.unwrap();

        assert_eq!(
            fx.fetcher.fetched(),
            vec!["https://mirror.example/b.qmod".to_string()]
        );
        assert!(fx.manager.registry().get("B").unwrap().is_installed());
    }

    #[tokio::test]
    async fn downloaded_archive_with_wrong_id_is_rejected() {
        let mut fx = Fixture::new().await;
        let archive = fx.archive(serde_json::json!({"id": "C", "version": "1.0.0"}), &[]);
        fx.fetcher.serve("https://example.com/b.qmod", archive);
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("B", "*", Some("https://example.com/b.qmod"))];
        fx.add(a).await;

        let err = fx.manager.install("A").await.unwrap_err();

        assert!(matches!(
            err,
            ModError::IdentityMismatch { expected, actual } if expected == "B" && actual == "C"
        ));
        assert!(fx.manager.registry().get("C").is_none());
        assert!(fx.manager.registry().get("B").is_none());
        assert!(!fx.manager.registry().get("A").unwrap().is_installed());
    }

    #[tokio::test]
    async fn downloaded_archive_outside_range_is_rejected() {
        let mut fx = Fixture::new().await;
        let archive = fx.archive(serde_json::json!({"id": "B", "version": "1.5.0"}), &[]);
        fx.fetcher.serve("https://example.com/b.qmod", archive);
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("B", "^2.0.0", Some("https://example.com/b.qmod"))];
        fx.add(a).await;

        let err = fx.manager.install("A").await.unwrap_err();

        assert!(matches!(err, ModError::UnsatisfiableVersion { .. }));
        assert!(fx.manager.registry().get("B").is_none());
    }

    #[tokio::test]
    async fn failed_download_propagates_transport_error() {
        let mut fx = Fixture::new().await;
        let mut a = manifest("A", "1.0.0");
        a.dependencies = vec![dependency("B", "*", Some("https://example.com/missing.qmod"))];
        fx.add(a).await;

        let err = fx.manager.install("A").await.unwrap_err();

        assert!(matches!(err, ModError::DownloadFailed { status: 404, .. }));
        assert!(!err.is_policy());
    }
}
