//! `WidthView`: a read-only, row-addressable view of an [`Indexer`] at a single
//! fixed terminal width.
//!
//! Grounded on `logview.py`'s `LogView`: a thin wrapper that forwards row
//! arithmetic to the line index and slices the underlying line text into the
//! `w`-wide chunk a given row actually displays.

use crate::error::{OutOfRangeSnafu, Result};
use crate::indexer::Indexer;

/// A view of a log's lines wrapped to a fixed display width `w`.
///
/// Borrows the [`Indexer`] it was built from; rebuild a new `WidthView` (cheap:
/// just a width clamp and a `total_rows` lookup) whenever `w` changes.
pub struct WidthView<'a> {
    indexer: &'a Indexer,
    w: u32,
    total_rows: u64,
}

impl<'a> WidthView<'a> {
    pub(crate) fn new(indexer: &'a Indexer, w: u32) -> Result<Self> {
        let total_rows = indexer.line_index().total_rows(w)?;
        Ok(Self { indexer, w, total_rows })
    }

    /// Terminal width this view wraps at.
    pub fn width(&self) -> u32 {
        self.w
    }

    /// Total number of display rows across the whole log at this width.
    pub fn len(&self) -> u64 {
        self.total_rows
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows == 0
    }

    /// The logical line and in-line row offset that display row `r` belongs to.
    /// Applies negative-index wraparound against [`WidthView::len`].
    pub fn line_at(&self, r: i64) -> Result<(usize, u64)> {
        let r = self.resolve_row(r)?;
        self.indexer.line_index().line_for_row(r, self.w)
    }

    /// The display row at which logical line `i` begins.
    pub fn row_for(&self, i: i64) -> Result<u64> {
        self.indexer.line_index().row_for_line(i, self.w)
    }

    /// The text displayed at row `r`: the `w`-wide chunk of the owning line's text
    /// that falls at this row's offset within it. A row past the true end of its
    /// line's wrapped content (wrapping decisions combined with multi-byte display
    /// widths can disagree with a naive byte slice) returns an empty string rather
    /// than erroring, matching SPEC_FULL.md §9's resolution of this edge case.
    pub fn get(&self, r: i64) -> Result<String> {
        let r = self.resolve_row(r)?;
        let (line_idx, offset) = self.indexer.line_index().line_for_row(r, self.w)?;
        let text = self.indexer.line(line_idx as i64)?;

        let w = self.w as usize;
        let start_unit = offset as usize * w;
        let units: Vec<char> = text.chars().collect();
        if start_unit >= units.len() {
            return Ok(String::new());
        }
        let end_unit = (start_unit + w).min(units.len());
        Ok(units[start_unit..end_unit].iter().collect())
    }

    fn resolve_row(&self, r: i64) -> Result<u64> {
        let resolved = if r < 0 { r + self.total_rows as i64 } else { r };
        if resolved < 0 || resolved as u64 >= self.total_rows {
            return OutOfRangeSnafu {
                index: r,
                len: self.total_rows as usize,
            }
            .fail();
        }
        Ok(resolved as u64)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::IndexerConfig;
    use crate::indexer::Indexer;
    use tempdir::TempDir;

    fn open(log_path: &std::path::Path, cache_root: &std::path::Path) -> Indexer {
        let config = IndexerConfig::builder().cache_root(cache_root).build();
        Indexer::open(log_path, config).unwrap()
    }

    #[test]
    fn s2_wrapping_at_width_10() {
        let dir = TempDir::new("width_view").unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "0123456789abcde\nshort\n").unwrap();

        let indexer = open(&log_path, &dir.path().join("cache"));
        let view = indexer.width(10).unwrap();

        assert_eq!(view.len(), 2 + 1);
        assert_eq!(view.row_for(0).unwrap(), 0);
        assert_eq!(view.row_for(1).unwrap(), 2);

        assert_eq!(view.get(0).unwrap(), "0123456789");
        assert_eq!(view.get(1).unwrap(), "abcde");
        assert_eq!(view.get(2).unwrap(), "short");
    }

    #[test]
    fn negative_row_wraps() {
        let dir = TempDir::new("width_view").unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "alpha\nbeta\ngamma\n").unwrap();

        let indexer = open(&log_path, &dir.path().join("cache"));
        let view = indexer.width(80).unwrap();

        assert_eq!(view.get(-1).unwrap(), view.get(view.len() as i64 - 1).unwrap());
        assert!(view.get(-(view.len() as i64) - 1).is_err());
    }

    #[test]
    fn empty_log_has_no_rows() {
        let dir = TempDir::new("width_view").unwrap();
        let log_path = dir.path().join("app.log");
        std::fs::write(&log_path, "").unwrap();

        let indexer = open(&log_path, &dir.path().join("cache"));
        let view = indexer.width(80).unwrap();
        assert_eq!(view.len(), 0);
        assert!(view.get(0).is_err());
    }
}
