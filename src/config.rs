//! Indexer configuration.
//!
//! Groups the runtime-tunable knobs that don't affect on-disk layout (cache root,
//! the injected width function, the human-readable cache-directory prefix) behind
//! a builder, in the style this crate's disk-buffer ancestor used for
//! `DiskBufferConfig`: a `from_path`-style entry point returning a builder, with
//! `with_*` setters and a `build()` that fills in defaults.

use std::path::PathBuf;
use std::sync::Arc;

use crate::width::DefaultWidthFn;

/// A width function: given a decoded line (no trailing EOL), returns a
/// non-negative display width.
pub type WidthFn = Arc<dyn Fn(&str) -> u32 + Send + Sync>;

/// Configuration for an [`crate::Indexer`].
#[derive(Clone)]
pub struct IndexerConfig {
    pub(crate) cache_root: PathBuf,
    pub(crate) width_fn: WidthFn,
    pub(crate) cache_prefix: Option<String>,
}

impl IndexerConfig {
    /// Starts a builder, defaulting the cache root to the OS-appropriate cache
    /// directory (falling back to a `.scrollback-index-cache` directory beside the
    /// current directory if none can be determined).
    pub fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder {
            cache_root: None,
            width_fn: None,
            cache_prefix: None,
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig::builder().build()
    }
}

/// Builder for [`IndexerConfig`].
pub struct IndexerConfigBuilder {
    cache_root: Option<PathBuf>,
    width_fn: Option<WidthFn>,
    cache_prefix: Option<String>,
}

impl IndexerConfigBuilder {
    /// Overrides the cache root directory under which one subdirectory per log
    /// identity is created. Defaults to the platform cache location.
    pub fn cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Overrides the width function used to measure each decoded line. Defaults
    /// to [`DefaultWidthFn`] (ASCII fast path + Unicode East-Asian-width fallback).
    pub fn width_fn<F>(mut self, width_fn: F) -> Self
    where
        F: Fn(&str) -> u32 + Send + Sync + 'static,
    {
        self.width_fn = Some(Arc::new(width_fn));
        self
    }

    /// Sets the human-readable prefix prepended to the identity-derived cache
    /// directory name, purely for debuggability (e.g. the log's basename).
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> IndexerConfig {
        let default_width_fn: WidthFn = {
            let default = DefaultWidthFn::new();
            Arc::new(move |line: &str| default.width(line))
        };

        IndexerConfig {
            cache_root: self.cache_root.unwrap_or_else(default_cache_root),
            width_fn: self.width_fn.unwrap_or(default_width_fn),
            cache_prefix: self.cache_prefix,
        }
    }
}

fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("scrollback-index"))
        .unwrap_or_else(|| PathBuf::from(".scrollback-index-cache"))
}
