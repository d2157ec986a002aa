//! The default display-width function.
//!
//! ASCII fast path (byte length) plus a Unicode-aware fallback via `unicode-width`
//! for anything outside the ASCII range, with a small bounded memoization layer —
//! the same shape as the original's `@lru_cache`-wrapped `default_get_width`, since
//! the same line is frequently re-measured across resizes.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use unicode_width::UnicodeWidthStr;

const MEMO_CAPACITY: usize = 100_000;

/// Computes the display width of a single decoded line, without memoization.
fn compute_width(line: &str) -> u32 {
    if line.is_ascii() {
        return line.len() as u32;
    }
    // `UnicodeWidthStr::width` is East-Asian-width aware; negative/None widths
    // (control characters) are floored at 0, matching the original's
    // `max(0, width if width is not None else len(line))`.
    line.width() as u32
}

/// A memoizing default width function, matching the injected `width_fn` contract
/// in SPEC_FULL.md §4.3: given a decoded line (no trailing EOL), returns a
/// non-negative display width.
pub struct DefaultWidthFn {
    cache: Mutex<LruCache<String, u32>>,
}

impl DefaultWidthFn {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(MEMO_CAPACITY).unwrap())),
        }
    }

    pub fn width(&self, line: &str) -> u32 {
        let mut cache = self.cache.lock().expect("width cache poisoned");
        if let Some(&w) = cache.get(line) {
            return w;
        }
        let w = compute_width(line);
        cache.put(line.to_owned(), w);
        w
    }
}

impl Default for DefaultWidthFn {
    fn default() -> Self {
        Self::new()
    }
}
