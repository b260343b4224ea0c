use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installer core.
/// Every module returns `Result<T, ModError>`.
#[derive(Debug, Error)]
pub enum ModError {
    // ── Policy ──────────────────────────────────────────
    #[error("Recursive dependency detected: {}", chain.join(" depends on "))]
    CyclicDependency { chain: Vec<String> },

    #[error("Dependency {id} requires version {required}, but {actual} is available. {reason}")]
    UnsatisfiableVersion {
        id: String,
        required: String,
        actual: String,
        reason: String,
    },

    #[error("Dependency {id} is not installed, and the mod depending on it does not specify a download path if missing")]
    MissingDependency { id: String },

    #[error("Downloaded dependency had ID {actual}, whereas the dependency stated ID {expected}")]
    IdentityMismatch { expected: String, actual: String },

    #[error("Mod {id} targets an unknown mod loader and cannot be deployed")]
    UnsupportedLoaderVariant { id: String },

    // ── Transport ───────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Remote {operation} failed: {message}")]
    Remote { operation: String, message: String },

    // ── Content ─────────────────────────────────────────
    #[error("Invalid mod manifest: {0}")]
    InvalidManifest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Mod not found: {0}")]
    ModNotFound(String),
}

/// Broad category of a [`ModError`], used to decide how it is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected, user-facing refusal. The message is the whole story.
    Policy,
    /// Environment problem raised by a collaborator; show full detail.
    Transport,
    /// Malformed archive or manifest content.
    Content,
}

impl ModError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModError::CyclicDependency { .. }
            | ModError::UnsatisfiableVersion { .. }
            | ModError::MissingDependency { .. }
            | ModError::IdentityMismatch { .. }
            | ModError::UnsupportedLoaderVariant { .. } => ErrorKind::Policy,
            ModError::Io { .. }
            | ModError::Http(_)
            | ModError::DownloadFailed { .. }
            | ModError::Remote { .. } => ErrorKind::Transport,
            ModError::InvalidManifest(_)
            | ModError::Json(_)
            | ModError::Zip(_)
            | ModError::InvalidVersion(_)
            | ModError::ModNotFound(_) => ErrorKind::Content,
        }
    }

    pub fn is_policy(&self) -> bool {
        self.kind() == ErrorKind::Policy
    }

    pub(crate) fn remote(operation: &str, message: impl Into<String>) -> Self {
        ModError::Remote {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type ModResult<T> = Result<T, ModError>;

impl From<std::io::Error> for ModError {
    fn from(source: std::io::Error) -> Self {
        ModError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// Front-ends receive errors as plain strings.
impl serde::Serialize for ModError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
