//! Sublinear scrollback indexing for large, append-only, line-oriented text logs.
//!
//! An [`Indexer`] watches a single log file, incrementally maintaining a small
//! on-disk cache of byte offsets, per-line display widths, and periodic
//! per-width row-count summaries. That cache turns "how many rows does this log
//! take up wrapped at width `w`" and "what line does display row `r` fall on"
//! from O(lines) scans into O(lines / `S`) lookups, so a terminal scrollback
//! viewer can jump around a multi-gigabyte log without re-reading it.
//!
//! ```text
//! Indexer           owns the open log file + LineIndex, handles update/append
//!   └── LineIndex    three Arrays: positions, widths, summaries
//!         └── Array  a typed, memory-mapped, growable on-disk vector
//!   └── WidthView    a read-only row-addressable view at one fixed width
//! ```

#[macro_use]
extern crate tracing;

mod array;
mod config;
mod error;
mod identity;
mod indexer;
mod line_index;
mod width;
mod width_view;

/// Number of lines per precomputed summary block.
pub const S: usize = 1000;
/// Largest terminal width the summary table precomputes row counts for; wider
/// requests are clamped down to this.
pub const W_MAX: u32 = 512;

pub use array::{Array, Scalar};
pub use config::{IndexerConfig, IndexerConfigBuilder, WidthFn};
pub use error::{Error, Result};
pub use indexer::Indexer;
pub use line_index::LineIndex;
pub use width::DefaultWidthFn;
pub use width_view::WidthView;
