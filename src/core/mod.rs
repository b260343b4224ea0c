// ─── ModBridge Core ───
// Dependency-aware installer for mods deployed to a device-side mod loader.
//
// Architecture:
//   core/
//     manifest/    mod.json model + archive reader
//     registry/    Known mods, installed flags, change events
//     deploy/      Loader directory layout + copy/removal planning
//     remote/      Device filesystem trait + local-directory device
//     downloader/  HTTP archive fetcher + download mirrors
//     installer/   Install, dependency resolution, uninstall, sweep
//     state/       Persisted settings + data directories

pub mod deploy;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod manifest;
pub mod registry;
pub mod remote;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
