pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{ErrorKind, ModError, ModResult};
pub use crate::core::installer::ModManager;
pub use crate::core::manifest::{ManifestModel, ModArchive};
pub use crate::core::registry::{ModEvent, ModEventKind, ModRegistry};
pub use crate::core::remote::{LocalDevice, RemoteFs};
pub use crate::core::state::Settings;

/// Install the structured logging subscriber. `RUST_LOG` overrides the
/// default filter. Calling it twice is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,modbridge_lib=debug")),
        )
        .try_init();

    tracing::debug!("ModBridge logging initialised");
}
