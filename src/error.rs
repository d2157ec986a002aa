//! Crate-wide error type.
//!
//! One variant per failure mode, in the style of the disk-buffer error enums this crate
//! grew out of: each surfaced cause carries a `source`, and display messages are meant to
//! read naturally in a log line.

use std::io;
use std::path::PathBuf;

use snafu::Snafu;

/// Errors produced by [`crate::Array`], [`crate::LineIndex`], [`crate::Indexer`], and
/// [`crate::WidthView`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// An index or display row fell outside the valid extent for the operation.
    #[snafu(display("index {index} out of range (len {len})"))]
    OutOfRange { index: i64, len: usize },

    /// A value did not fit the array's declared element type.
    #[snafu(display("value does not fit the declared element type"))]
    TypeMismatch,

    /// The scalar type requested for an [`crate::Array`] is not one of the recognized
    /// fixed-width types.
    ///
    /// Unreachable from safe code: `Array<T>` is only constructible for `T: Scalar`, and
    /// `Scalar` is sealed over the fixed set of recognized types. Kept for parity with
    /// other bindings of this design that can't enforce the constraint at compile time.
    #[snafu(display("unsupported element type"))]
    Unsupported,

    /// A general I/O error occurred opening, reading, writing, or flushing a file.
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io { path: PathBuf, source: io::Error },

    /// An on-disk index sidecar could not be parsed or was internally inconsistent.
    #[snafu(display("corrupt index at {}: {reason}", path.display()))]
    CorruptIndex { path: PathBuf, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
