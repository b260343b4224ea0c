use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::ModResult;

/// Substitutes a download URL with an alternate endpoint before fetching.
#[async_trait]
pub trait MirrorResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> ModResult<String>;
}

/// Rewrites URLs starting with `from` to start with `to` instead.
/// URLs outside `from` are passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrefixMirror {
    pub from: String,
    pub to: String,
}

impl PrefixMirror {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn rewrite(&self, url: &str) -> String {
        match url.strip_prefix(&self.from) {
            Some(rest) => format!("{}{}", self.to, rest),
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl MirrorResolver for PrefixMirror {
    async fn resolve(&self, url: &str) -> ModResult<String> {
        let mirrored = self.rewrite(url);
        if mirrored != url {
            debug!("Using mirror {} for {}", mirrored, url);
        }
        Ok(mirrored)
    }
}
