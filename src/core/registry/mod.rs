pub mod model;

use std::collections::{HashMap, HashSet};

use tokio::sync::broadcast;
use tracing::debug;

pub use model::{Mod, ModEvent, ModEventKind};

use crate::core::error::{ModError, ModResult};
use crate::core::manifest::ManifestModel;

const EVENT_CAPACITY: usize = 64;

/// Single source of truth for which mods are known, keyed by mod id.
pub struct ModRegistry {
    mods: HashMap<String, Mod>,
    events: broadcast::Sender<ModEvent>,
}

impl Default for ModRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            mods: HashMap::new(),
            events,
        }
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ModEvent> {
        self.events.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<&Mod> {
        self.mods.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mods.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mod> {
        self.mods.values()
    }

    /// Register a manifest. An existing entry with the same id is replaced
    /// and returned; the new entry always starts uninstalled.
    pub(crate) fn insert(&mut self, manifest: ManifestModel) -> Option<Mod> {
        let id = manifest.id.clone();
        let previous = self.mods.insert(id.clone(), Mod::new(manifest));
        if let Some(old) = &previous {
            debug!("Replaced mod {} v{}", id, old.version());
        }
        self.emit(&id, ModEventKind::Loaded);
        previous
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Mod> {
        let removed = self.mods.remove(id);
        if removed.is_some() {
            self.emit(id, ModEventKind::Removed);
        }
        removed
    }

    /// Flip the installed flag, notifying observers only on an actual change.
    pub(crate) fn set_installed(&mut self, id: &str, installed: bool) -> ModResult<()> {
        let entry = self
            .mods
            .get_mut(id)
            .ok_or_else(|| ModError::ModNotFound(id.to_string()))?;

        if entry.set_installed(installed) {
            let kind = if installed {
                ModEventKind::Installed
            } else {
                ModEventKind::Uninstalled
            };
            self.emit(id, kind);
        }
        Ok(())
    }

    /// First installed mod other than `excluding` that lists `library` among
    /// its library files.
    pub fn library_user(&self, library: &str, excluding: &str) -> Option<&Mod> {
        self.mods.values().find(|m| {
            m.id() != excluding
                && m.is_installed()
                && m.manifest().library_files.iter().any(|l| l == library)
        })
    }

    /// Installed library mods that nothing installed still needs, sorted by id.
    ///
    /// A library is needed when an installed non-library mod references it,
    /// directly or through other needed libraries. Libraries that only
    /// reference each other are not needed.
    pub fn unreferenced_libraries(&self) -> Vec<String> {
        let installed: Vec<&Mod> = self.mods.values().filter(|m| m.is_installed()).collect();
        let mut needed: HashSet<&str> = installed
            .iter()
            .filter(|m| !m.is_library())
            .map(|m| m.id())
            .collect();

        loop {
            let newly_needed: Vec<&str> = installed
                .iter()
                .filter(|lib| lib.is_library() && !needed.contains(lib.id()))
                .filter(|lib| {
                    installed
                        .iter()
                        .any(|m| needed.contains(m.id()) && m.id() != lib.id() && m.references(lib))
                })
                .map(|lib| lib.id())
                .collect();
            if newly_needed.is_empty() {
                break;
            }
            needed.extend(newly_needed);
        }

        let mut unused: Vec<String> = installed
            .iter()
            .filter(|m| m.is_library() && !needed.contains(m.id()))
            .map(|m| m.id().to_string())
            .collect();
        unused.sort();
        unused
    }

    fn emit(&self, id: &str, kind: ModEventKind) {
        // No subscribers is not an error.
        let _ = self.events.send(ModEvent::new(id, kind));
    }
}
