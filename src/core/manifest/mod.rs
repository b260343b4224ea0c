pub mod archive;
pub mod model;

pub use archive::{ModArchive, MANIFEST_FILE};
pub use model::{parse_version_range, Dependency, FileCopy, LoaderVariant, ManifestModel};
