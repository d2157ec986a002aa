//! `LineIndex`: three [`Array`]s (byte positions, display widths, and a per-width
//! summary table) plus the display-row arithmetic over them.
//!
//! This mirrors `line_index.py` in the indexer this crate is based on: the same
//! constants (`S`, `W_MAX`), the same summary-boundary check on append, and the
//! same three query algorithms (`total_rows`, `row_for_line`, `line_for_row`).

use std::path::Path;

use snafu::ResultExt;

use crate::array::Array;
use crate::error::{IoSnafu, OutOfRangeSnafu, Result};
use crate::{S, W_MAX};

/// `max(1, ceil(width / w))` — a line of display width `width` occupies this many
/// rows at terminal width `w`. An empty line still occupies one row.
fn rows_at(width: u32, w: u32) -> u64 {
    if width == 0 {
        1
    } else {
        (u64::from(width) + u64::from(w) - 1) / u64::from(w)
    }
}

fn summary_offset(block: usize, w: u32) -> i64 {
    (block * W_MAX as usize + (w as usize - 1)) as i64
}

/// Byte positions, display widths, and periodic summaries for a single log's lines.
pub struct LineIndex {
    positions: Array<u64>,
    widths: Array<u16>,
    summaries: Array<u32>,
}

impl LineIndex {
    /// Opens (or creates) the three sidecar arrays under `dir`.
    pub fn open(dir: impl AsRef<Path>, create: bool) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).context(IoSnafu {
            path: dir.to_path_buf(),
        })?;

        let positions = Array::open(dir.join("positions.dat"), create)?;
        let widths = Array::open(dir.join("widths.dat"), create)?;
        let summaries = Array::open(dir.join("summaries.dat"), create)?;

        Ok(Self {
            positions,
            widths,
            summaries,
        })
    }

    /// Number of indexed lines, `N`.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_index(&self, i: i64) -> Result<usize> {
        if i < 0 || i as usize >= self.len() {
            return OutOfRangeSnafu {
                index: i,
                len: self.len(),
            }
            .fail();
        }
        Ok(i as usize)
    }

    /// Byte offset of line `i`. Does not apply negative-index wraparound — a
    /// negative `i` is simply out of range, matching the original's
    /// `get_line_position`.
    pub fn position(&self, i: i64) -> Result<u64> {
        let idx = self.check_index(i)?;
        self.positions.get(idx as i64)
    }

    /// Display width of line `i` (already clamped to `u16::MAX` at append time).
    pub fn width(&self, i: i64) -> Result<u16> {
        let idx = self.check_index(i)?;
        self.widths.get(idx as i64)
    }

    /// Appends a new line at byte offset `pos` with raw display width `width`
    /// (clamped to 65535 for storage). Builds a summary row if this append closes
    /// a block of `S` lines. `pos` must be strictly greater than the previous
    /// line's position.
    pub fn append_line(&mut self, pos: u64, width: u32) -> Result<()> {
        let capped = width.min(u32::from(u16::MAX)) as u16;
        self.positions.append(pos)?;
        self.widths.append(capped)?;

        let n = self.len();
        if n % S == 0 {
            self.build_summary(n)?;
        }
        Ok(())
    }

    /// Computes and appends the summary row for the block of `S` lines that was
    /// just closed by reaching `n` total lines.
    fn build_summary(&mut self, n: usize) -> Result<()> {
        let block = n / S - 1;
        let start = block * S;
        let end = start + S;

        let mut row = Vec::with_capacity(W_MAX as usize);
        for w in 1..=W_MAX {
            let mut total = 0u64;
            for i in start..end {
                let width = u32::from(self.widths.get(i as i64)?);
                total += rows_at(width, w);
            }
            row.push(total as u32);
        }
        self.summaries.extend(row)?;
        tracing::debug!(block, start, end, "built summary row");
        Ok(())
    }

    /// Total display rows across all `N` lines at width `w`. Returns 0 for `w == 0`
    /// (no display possible at zero width), per the original's `get_total_display_rows`.
    pub fn total_rows(&self, w: u32) -> Result<u64> {
        if w == 0 {
            return Ok(0);
        }
        let w = w.min(W_MAX);
        let n = self.len();
        let completed = n / S;

        let mut total = 0u64;
        for block in 0..completed {
            total += u64::from(self.summaries.get(summary_offset(block, w))?);
        }
        for i in (completed * S)..n {
            let width = u32::from(self.widths.get(i as i64)?);
            total += rows_at(width, w);
        }
        Ok(total)
    }

    /// Display row at which line `i` begins, at width `w`.
    pub fn row_for_line(&self, i: i64, w: u32) -> Result<u64> {
        let idx = self.check_index(i)?;
        if w == 0 {
            return Ok(0);
        }
        let w = w.min(W_MAX);
        let block = idx / S;

        let mut total = 0u64;
        for b in 0..block {
            total += u64::from(self.summaries.get(summary_offset(b, w))?);
        }
        for j in (block * S)..idx {
            let width = u32::from(self.widths.get(j as i64)?);
            total += rows_at(width, w);
        }
        Ok(total)
    }

    /// Finds the `(line, row_offset_within_line)` pair that display row `r`
    /// belongs to, at width `w`. `w == 0` always raises `OutOfRange`: there is no
    /// valid display row at zero width.
    pub fn line_for_row(&self, r: u64, w: u32) -> Result<(usize, u64)> {
        if w == 0 {
            return OutOfRangeSnafu {
                index: r as i64,
                len: self.len(),
            }
            .fail();
        }
        let w = w.min(W_MAX);
        let n = self.len();
        let completed = n / S;

        let mut acc = 0u64;
        let mut cursor = completed * S;
        for block in 0..completed {
            let rows = u64::from(self.summaries.get(summary_offset(block, w))?);
            if acc + rows > r {
                cursor = block * S;
                break;
            }
            acc += rows;
        }

        for i in cursor..n {
            let width = u32::from(self.widths.get(i as i64)?);
            let rows = rows_at(width, w);
            if acc + rows > r {
                return Ok((i, r - acc));
            }
            acc += rows;
        }

        OutOfRangeSnafu {
            index: r as i64,
            len: n,
        }
        .fail()
    }

    /// Closes all three backing arrays.
    pub fn close(&mut self) -> Result<()> {
        self.positions.close()?;
        self.widths.close()?;
        self.summaries.close()?;
        Ok(())
    }

    /// Number of completed summary blocks (exposed for cache validation).
    pub(crate) fn summary_len(&self) -> usize {
        self.summaries.len()
    }
}
