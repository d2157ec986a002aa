//! File-identity-keyed cache directory naming.
//!
//! Cache directories are named from the log file's OS-reported identity (device +
//! inode on POSIX, volume serial + file index on Windows), never from its path, so
//! renames preserve a cache and rotations (which swap in a fresh inode under the
//! same path) invalidate one. See SPEC_FULL.md §6 "Subdirectory naming" and §9
//! "Cache-directory identity".

use std::fs::File;
use std::path::{Path, PathBuf};

use snafu::ResultExt;

use crate::error::{IoSnafu, Result};

/// A unique-enough identity for a log file, used to key its cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    #[cfg(unix)]
    device: u64,
    #[cfg(unix)]
    inode: u64,
    #[cfg(windows)]
    volume_serial: u32,
    #[cfg(windows)]
    file_index: u64,
}

impl FileIdentity {
    pub fn of(file: &File) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let meta = file.metadata().context(IoSnafu {
                path: PathBuf::from("<fd>"),
            })?;
            Ok(Self {
                device: meta.dev(),
                inode: meta.ino(),
            })
        }
        #[cfg(windows)]
        {
            // `file_index`/`volume_serial_number` require a handle opened with the
            // metadata the OS tracks for hard-link/rotation identity; `std`
            // exposes both directly on `Metadata` on this platform.
            use std::os::windows::fs::MetadataExt;
            let meta = file.metadata().context(IoSnafu {
                path: PathBuf::from("<fd>"),
            })?;
            Ok(Self {
                volume_serial: meta.volume_serial_number().unwrap_or(0),
                file_index: meta.file_index().unwrap_or(0),
            })
        }
        #[cfg(not(any(unix, windows)))]
        {
            compile_error!("scrollback_index requires a unix or windows target for file identity");
        }
    }

    /// The directory component derived purely from identity (no human-readable
    /// prefix). Stable across renames, distinct across rotations.
    fn key(&self) -> String {
        #[cfg(unix)]
        {
            format!("{}_{}", self.device, self.inode)
        }
        #[cfg(windows)]
        {
            let high = (self.file_index >> 32) as u32;
            let low = (self.file_index & 0xFFFF_FFFF) as u32;
            format!("{}_{}_{}", self.volume_serial, high, low)
        }
    }

    /// Builds the cache subdirectory for this identity under `root`, optionally
    /// prefixed with a human-readable label (e.g. the log's basename) purely for
    /// debuggability; the identity suffix is always present so unrelated files
    /// never collide.
    pub fn cache_dir(&self, root: &Path, readable_prefix: Option<&str>) -> PathBuf {
        let name = match readable_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}_{}", self.key()),
            _ => self.key(),
        };
        root.join(name)
    }
}
