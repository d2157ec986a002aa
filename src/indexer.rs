//! `Indexer`: owns an open log file, reconciles its persistent cache, incrementally
//! consumes newly appended bytes, and exposes line access plus a [`WidthView`]
//! factory.
//!
//! Mirrors `logloglog.py`'s `LogLogLog`: the cache-validation rules (V1-V4), the
//! truncation-detection/rebuild path in `update`, and the position save/restore
//! discipline around random line reads.

use std::fs::{File, OpenOptions};
use std::io;
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use snafu::ResultExt;

use crate::config::IndexerConfig;
use crate::error::{CorruptIndexSnafu, IoSnafu, OutOfRangeSnafu, Result};
use crate::identity::FileIdentity;
use crate::line_index::LineIndex;
use crate::width_view::WidthView;
use crate::S;

const POSITIONS_FILE: &str = "positions.dat";
const WIDTHS_FILE: &str = "widths.dat";
const SUMMARIES_FILE: &str = "summaries.dat";
const FILE_SIZE_FILE: &str = "file_size.dat";

/// Owns an open log file and its persistent scrollback index.
pub struct Indexer {
    path: PathBuf,
    file: Option<File>,
    cache_dir: PathBuf,
    file_size_path: PathBuf,
    line_index: LineIndex,
    /// Byte offset just past the last successfully indexed line.
    last_position: u64,
    config: IndexerConfig,
}

impl Indexer {
    /// Opens `path`, reconciling its on-disk cache and eagerly performing the
    /// initial [`Indexer::update`] (per SPEC_FULL §9, deferred indexing is out of
    /// scope: `open` always streams whatever is new).
    pub fn open(path: impl AsRef<Path>, config: IndexerConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::info!(path = %path.display(), "opening indexer");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .context(IoSnafu { path: path.clone() })?;

        let identity = FileIdentity::of(&file)?;
        let readable_prefix = path.file_name().and_then(|n| n.to_str());
        let prefix = config.cache_prefix.as_deref().or(readable_prefix);
        let cache_dir = identity.cache_dir(&config.cache_root, prefix);
        let file_size_path = cache_dir.join(FILE_SIZE_FILE);

        let (line_index, last_position) = match Self::try_load_cache(&cache_dir, &path, &file_size_path)? {
            Some(loaded) => loaded,
            None => {
                tracing::info!(cache_dir = %cache_dir.display(), "creating new index");
                Self::wipe_cache_dir(&cache_dir)?;
                (LineIndex::open(&cache_dir, true)?, 0)
            }
        };

        let mut indexer = Indexer {
            path,
            file: Some(file),
            cache_dir,
            file_size_path,
            line_index,
            last_position,
            config,
        };
        indexer.update()?;
        Ok(indexer)
    }

    /// Attempts to load and validate an existing cache directory. Returns `None`
    /// if any of V1-V4 fails, signaling the caller should wipe and rebuild.
    fn try_load_cache(
        cache_dir: &Path,
        log_path: &Path,
        file_size_path: &Path,
    ) -> Result<Option<(LineIndex, u64)>> {
        // V1: all four sidecar files exist.
        let all_exist = [POSITIONS_FILE, WIDTHS_FILE, SUMMARIES_FILE]
            .iter()
            .all(|name| cache_dir.join(name).exists())
            && file_size_path.exists();
        if !all_exist {
            tracing::debug!(cache_dir = %cache_dir.display(), "cache incomplete");
            return Ok(None);
        }

        // V2: the index opens cleanly (positions/widths length parity is an
        // invariant of `LineIndex` itself, enforced by every `append_line` call).
        let mut line_index = match LineIndex::open(cache_dir, false) {
            Ok(li) => li,
            Err(err) => {
                tracing::warn!(%err, "failed to open existing index, rebuilding");
                return Ok(None);
            }
        };

        let n = line_index.len();

        // V3: the last indexed line is still readable from the log.
        let last_position = if n > 0 {
            let last_pos = line_index.position((n - 1) as i64)?;
            match read_line_at(log_path, last_pos)? {
                Some((_, end)) => end,
                None => {
                    tracing::warn!("last indexed line no longer readable, rebuilding");
                    line_index.close().ok();
                    return Ok(None);
                }
            }
        } else {
            0
        };

        // V4: the log hasn't shrunk below the recorded witness.
        let cached_size = load_file_size(file_size_path)?;
        let current_size = std::fs::metadata(log_path)
            .context(IoSnafu {
                path: log_path.to_path_buf(),
            })?
            .len();
        match cached_size {
            Some(cached_size) if current_size >= cached_size => {}
            _ => {
                tracing::warn!(?cached_size, current_size, "log truncated below witness, rebuilding");
                line_index.close().ok();
                return Ok(None);
            }
        }

        Ok(Some((line_index, last_position)))
    }

    /// Borrows the open log file, failing with an `Io` error if `close` has
    /// already been called.
    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "indexer is closed"))
            .context(IoSnafu {
                path: self.path.clone(),
            })
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "indexer is closed"))
            .context(IoSnafu {
                path: self.path.clone(),
            })
    }

    fn wipe_cache_dir(cache_dir: &Path) -> Result<()> {
        if cache_dir.exists() {
            std::fs::remove_dir_all(cache_dir).context(IoSnafu {
                path: cache_dir.to_path_buf(),
            })?;
        }
        std::fs::create_dir_all(cache_dir).context(IoSnafu {
            path: cache_dir.to_path_buf(),
        })?;
        Ok(())
    }

    fn rebuild(&mut self) -> Result<()> {
        self.line_index.close()?;
        Self::wipe_cache_dir(&self.cache_dir)?;
        self.line_index = LineIndex::open(&self.cache_dir, true)?;
        self.last_position = 0;
        Ok(())
    }

    /// Streams any bytes appended to the log since the last call, appending a
    /// `(position, width)` entry to the line index for each newly completed line.
    /// Detects truncation/rotation (current size < `last_position`) and rebuilds
    /// from scratch before streaming.
    pub fn update(&mut self) -> Result<()> {
        let observed_size = self
            .file()?
            .metadata()
            .context(IoSnafu {
                path: self.path.clone(),
            })?
            .len();

        if observed_size < self.last_position {
            tracing::info!(
                observed_size,
                last_position = self.last_position,
                "log truncated or rotated, rebuilding index"
            );
            self.rebuild()?;
        }

        let mut reader = BufReader::new(self.file()?.try_clone().context(IoSnafu {
            path: self.path.clone(),
        })?);
        reader
            .seek(SeekFrom::Start(self.last_position))
            .context(IoSnafu {
                path: self.path.clone(),
            })?;

        let mut pos = self.last_position;
        let mut buf = Vec::new();
        let mut processed: u64 = 0;

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf).context(IoSnafu {
                path: self.path.clone(),
            })?;
            if n == 0 {
                break;
            }
            let line_start = pos;
            pos += n as u64;

            let text = decode_line(&buf);
            let width = (self.config.width_fn)(&text);
            self.line_index.append_line(line_start, width)?;

            processed += 1;
            if processed % S as u64 == 0 {
                tracing::debug!(processed, "indexing progress");
            }
        }

        self.last_position = pos;

        let final_size = self
            .file()?
            .metadata()
            .context(IoSnafu {
                path: self.path.clone(),
            })?
            .len();
        save_file_size(&self.file_size_path, final_size)?;

        tracing::debug!(total_lines = self.line_index.len(), "update complete");
        Ok(())
    }

    /// Appends `line` to the log (a trailing `\n` is added) and to the index.
    pub fn append(&mut self, line: &str) -> Result<()> {
        let prev_size = self
            .file()?
            .metadata()
            .context(IoSnafu {
                path: self.path.clone(),
            })?
            .len();

        let path = self.path.clone();
        let file = self.file_mut()?;
        file.seek(SeekFrom::End(0)).context(IoSnafu { path: path.clone() })?;
        file.write_all(line.as_bytes()).context(IoSnafu { path: path.clone() })?;
        file.write_all(b"\n").context(IoSnafu { path: path.clone() })?;
        file.flush().context(IoSnafu { path: path.clone() })?;

        let width = (self.config.width_fn)(line);
        self.line_index.append_line(prev_size, width)?;
        self.last_position = prev_size + line.len() as u64 + 1;

        let current_size = self
            .file()?
            .metadata()
            .context(IoSnafu {
                path: self.path.clone(),
            })?
            .len();
        save_file_size(&self.file_size_path, current_size)?;

        Ok(())
    }

    /// Number of indexed lines, `N`.
    pub fn len(&self) -> usize {
        self.line_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded contents of logical line `i` (EOL stripped), applying negative-index
    /// wraparound. Reopens the log by path for the single read so the caller's
    /// in-progress `update()` cursor, if any, is never disturbed.
    pub fn line(&self, i: i64) -> Result<String> {
        let n = self.line_index.len();
        let idx = if i < 0 { i + n as i64 } else { i };
        if idx < 0 || idx as usize >= n {
            return OutOfRangeSnafu { index: i, len: n }.fail();
        }

        let pos = self.line_index.position(idx)?;
        match read_line_at(&self.path, pos)? {
            Some((raw, _)) => Ok(decode_line(&raw)),
            None => CorruptIndexSnafu {
                path: self.cache_dir.clone(),
                reason: format!("line {idx} at recorded position {pos} is no longer readable"),
            }
            .fail(),
        }
    }

    pub(crate) fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Builds a [`WidthView`] over this indexer at terminal width `w`.
    pub fn width(&self, w: u32) -> Result<WidthView<'_>> {
        WidthView::new(self, w)
    }

    /// Closes the index and the log handle. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.line_index.close()?;
        self.file = None;
        Ok(())
    }
}

impl Drop for Indexer {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(path = %self.path.display(), %err, "failed to close indexer cleanly");
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let mut content = raw;
    if content.last() == Some(&b'\n') {
        content = &content[..content.len() - 1];
    }
    if content.last() == Some(&b'\r') {
        content = &content[..content.len() - 1];
    }
    String::from_utf8_lossy(content).into_owned()
}

/// Reads one line starting at `pos` from a fresh, independent open of `path`,
/// returning the raw bytes (including any trailing EOL) and the byte offset just
/// past them. `Ok(None)` means there was nothing to read at `pos` (EOF).
fn read_line_at(path: &Path, pos: u64) -> Result<Option<(Vec<u8>, u64)>> {
    let mut file = File::open(path).context(IoSnafu {
        path: path.to_path_buf(),
    })?;
    file.seek(SeekFrom::Start(pos)).context(IoSnafu {
        path: path.to_path_buf(),
    })?;

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).context(IoSnafu {
        path: path.to_path_buf(),
    })?;

    if n == 0 {
        Ok(None)
    } else {
        let end = pos + buf.len() as u64;
        Ok(Some((buf, end)))
    }
}

fn save_file_size(path: &Path, size: u64) -> Result<()> {
    std::fs::write(path, size.to_string()).context(IoSnafu {
        path: path.to_path_buf(),
    })
}

fn load_file_size(path: &Path) -> Result<Option<u64>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).context(IoSnafu {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn open_indexer(log_path: &Path, cache_root: &Path) -> Indexer {
        let config = IndexerConfig::builder().cache_root(cache_root).build();
        Indexer::open(log_path, config).unwrap()
    }

    #[test]
    fn s1_three_plain_lines() {
        let dir = TempDir::new("indexer").unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "Line 1\nLine 2\nLine 3\n").unwrap();

        let indexer = open_indexer(&log_path, &dir.path().join("cache"));
        assert_eq!(indexer.len(), 3);
        assert_eq!(indexer.line(0).unwrap(), "Line 1");
        assert_eq!(indexer.line(1).unwrap(), "Line 2");
        assert_eq!(indexer.line(2).unwrap(), "Line 3");
        assert_eq!(indexer.line_index().total_rows(80).unwrap(), 3);
        assert_eq!(indexer.line_index().line_for_row(1, 80).unwrap(), (1, 0));
    }

    #[test]
    fn s4_truncation_then_reopen() {
        let dir = TempDir::new("indexer").unwrap();
        let log_path = dir.path().join("app.log");
        let cache_root = dir.path().join("cache");
        std::fs::write(
            &log_path,
            "Old line 1\nOld line 2\nOld line 3\nOld line 4\n",
        )
        .unwrap();

        {
            let mut indexer = open_indexer(&log_path, &cache_root);
            assert_eq!(indexer.len(), 4);
            indexer.close().unwrap();
        }

        std::fs::write(&log_path, "New line 1\nNew line 2\n").unwrap();

        let indexer = open_indexer(&log_path, &cache_root);
        assert_eq!(indexer.len(), 2);
        assert_eq!(indexer.line(0).unwrap(), "New line 1");
        assert_eq!(indexer.line(1).unwrap(), "New line 2");
    }

    #[test]
    fn s5_append_grows_the_index() {
        let dir = TempDir::new("indexer").unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "Initial line\n").unwrap();

        let mut indexer = open_indexer(&log_path, &dir.path().join("cache"));
        indexer.append("Second line").unwrap();
        indexer.append("Third line").unwrap();

        assert_eq!(indexer.len(), 3);
        assert_eq!(indexer.line(0).unwrap(), "Initial line");
        assert_eq!(indexer.line(1).unwrap(), "Second line");
        assert_eq!(indexer.line(2).unwrap(), "Third line");

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.ends_with("Third line\n"));
    }

    #[test]
    fn p9_update_twice_is_a_no_op() {
        let dir = TempDir::new("indexer").unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "a\nb\nc\n").unwrap();

        let mut indexer = open_indexer(&log_path, &dir.path().join("cache"));
        let before_size = std::fs::read_to_string(&indexer.file_size_path).unwrap();
        indexer.update().unwrap();
        let after_size = std::fs::read_to_string(&indexer.file_size_path).unwrap();

        assert_eq!(indexer.len(), 3);
        assert_eq!(before_size, after_size);
    }

    #[test]
    fn p6_persistence_across_reopen() {
        let dir = TempDir::new("indexer").unwrap();
        let log_path = dir.path().join("app.log");
        let cache_root = dir.path().join("cache");
        let content: String = (0..50).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&log_path, content).unwrap();

        let n_before;
        {
            let mut indexer = open_indexer(&log_path, &cache_root);
            n_before = indexer.len();
            indexer.append("one more line").unwrap();
            indexer.close().unwrap();
        }

        let indexer = open_indexer(&log_path, &cache_root);
        assert_eq!(indexer.len(), n_before + 1);
        for w in [1u32, 40, 80, 200] {
            assert!(indexer.line_index().total_rows(w).unwrap() >= indexer.len() as u64);
        }
    }

    #[test]
    fn b1_empty_log() {
        let dir = TempDir::new("indexer").unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "").unwrap();

        let indexer = open_indexer(&log_path, &dir.path().join("cache"));
        assert_eq!(indexer.len(), 0);
        assert!(indexer.line(0).is_err());
        assert_eq!(indexer.line_index().total_rows(80).unwrap(), 0);
    }

    #[test]
    fn b2_single_empty_line() {
        let dir = TempDir::new("indexer").unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "\n").unwrap();

        let indexer = open_indexer(&log_path, &dir.path().join("cache"));
        assert_eq!(indexer.len(), 1);
        assert_eq!(indexer.line_index().width(0).unwrap(), 0);
        assert_eq!(indexer.line_index().total_rows(80).unwrap(), 1);
    }
}
