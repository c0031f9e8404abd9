#![forbid(unsafe_code)]

//! Scroll detection over hashed line signatures.
//!
//! # Algorithm
//!
//! Each row of the previous and current snapshot is reduced to a
//! [`LineHash`]. For a region `[top, bottom)` of height `h`, candidate shifts
//! `s` in `1..h` are tried smallest first:
//!
//! - **up by s**: `old[top + i + s] == new[top + i]` for `i in 0..h - s`
//! - **down by s**: `old[top + i] == new[top + i + s]` for `i in 0..h - s`
//!
//! A candidate qualifies when at least 80% of its `h - s` comparisons match.
//! All upward candidates are tried before any downward one. The tolerance
//! lets a few dirty rows (a freshly appended log line, a blinking status
//! cell) through without losing the scroll.
//!
//! Hash equality is taken as content equality. The hash is a fast DJB2-style
//! digest, not a security primitive; the raw rows stay reachable through
//! [`BufferView::line_content`] if an exact compare is ever needed.

use std::fmt;
use std::ops::Range;

use crate::view::BufferView;

/// Minimum match share for a candidate shift, as a fraction `NUM / DEN`.
const MATCH_NUM: usize = 4;
const MATCH_DEN: usize = 5;

/// Opaque digest of one rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineHash(u64);

impl LineHash {
    /// Raw digest value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// DJB2-style rolling hash over the rendered bytes of one line.
#[inline]
pub fn hash_line(content: &[u8]) -> LineHash {
    let mut h: u64 = 5381;
    for &b in content {
        h = h.wrapping_mul(33) ^ u64::from(b);
    }
    LineHash(h)
}

/// Hash the rows in `rows` of `view`, reusing `scratch` for rendering.
///
/// Rows beyond the view's height hash as empty lines.
pub fn hash_rows<V: BufferView + ?Sized>(
    view: &V,
    rows: Range<u16>,
    scratch: &mut Vec<u8>,
) -> Vec<LineHash> {
    let mut hashes = Vec::with_capacity(rows.len());
    for y in rows {
        scratch.clear();
        view.line_content(y, scratch);
        hashes.push(hash_line(scratch));
    }
    hashes
}

/// Direction content moves on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    /// Content moves toward the top; new rows appear at the bottom.
    Up,
    /// Content moves toward the bottom; new rows appear at the top.
    Down,
}

impl ScrollDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pure vertical shift of the rows in `[top, bottom)`.
///
/// Invariant: `top < bottom` and `0 < lines < bottom - top`. The
/// `bottom <= height` half of the invariant depends on the terminal and is
/// checked with [`fits`](Self::fits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScrollOperation {
    top: u16,
    bottom: u16,
    lines: u16,
    direction: ScrollDirection,
}

impl ScrollOperation {
    /// Validate and build an operation. `None` when the invariant fails.
    #[must_use]
    pub fn new(top: u16, bottom: u16, lines: u16, direction: ScrollDirection) -> Option<Self> {
        if top >= bottom || lines == 0 || lines >= bottom - top {
            return None;
        }
        Some(Self {
            top,
            bottom,
            lines,
            direction,
        })
    }

    /// First row of the region.
    #[inline]
    pub const fn top(&self) -> u16 {
        self.top
    }

    /// One past the last row of the region.
    #[inline]
    pub const fn bottom(&self) -> u16 {
        self.bottom
    }

    /// Rows shifted.
    #[inline]
    pub const fn lines(&self) -> u16 {
        self.lines
    }

    #[inline]
    pub const fn direction(&self) -> ScrollDirection {
        self.direction
    }

    #[inline]
    pub const fn region_height(&self) -> u16 {
        self.bottom - self.top
    }

    /// Rows whose content survives the shift.
    #[inline]
    pub const fn lines_preserved(&self) -> u16 {
        self.region_height() - self.lines
    }

    /// Whether the region lies inside a screen of `height` rows.
    #[inline]
    pub const fn fits(&self, height: u16) -> bool {
        self.bottom <= height
    }

    /// Rows left blank by the shift, which the caller must repaint.
    pub fn exposed_rows(&self) -> Range<u16> {
        match self.direction {
            ScrollDirection::Up => self.bottom - self.lines..self.bottom,
            ScrollDirection::Down => self.top..self.top + self.lines,
        }
    }

    /// `(destination, source)` row pairs for every preserved row.
    pub fn preserved_rows(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        let lines = self.lines;
        let direction = self.direction;
        (0..self.lines_preserved()).map(move |i| match direction {
            ScrollDirection::Up => (self.top + i, self.top + i + lines),
            ScrollDirection::Down => (self.top + i + lines, self.top + i),
        })
    }

    /// Same shift with the region moved down by `offset` rows.
    #[must_use]
    pub fn offset(self, offset: u16) -> Option<Self> {
        Self::new(
            self.top.checked_add(offset)?,
            self.bottom.checked_add(offset)?,
            self.lines,
            self.direction,
        )
    }
}

#[inline]
fn shift_matches(
    old: &[LineHash],
    new: &[LineHash],
    top: usize,
    height: usize,
    s: usize,
    direction: ScrollDirection,
) -> bool {
    let compared = height - s;
    let matched = (0..compared)
        .filter(|&i| match direction {
            ScrollDirection::Up => old[top + i + s] == new[top + i],
            ScrollDirection::Down => old[top + i] == new[top + i + s],
        })
        .count();
    matched * MATCH_DEN >= compared * MATCH_NUM
}

/// Find the smallest vertical shift that explains `new` in terms of `old`
/// inside `[top, bottom)`.
///
/// Returns `None` for regions shorter than two rows, out-of-range bounds,
/// or when no shift clears the 80% match threshold.
pub fn detect_scroll_operation(
    old: &[LineHash],
    new: &[LineHash],
    top: u16,
    bottom: u16,
) -> Option<ScrollOperation> {
    let end = bottom as usize;
    if top >= bottom || end > old.len() || end > new.len() {
        return None;
    }
    let height = (bottom - top) as usize;
    if height < 2 {
        return None;
    }
    let start = top as usize;

    for direction in [ScrollDirection::Up, ScrollDirection::Down] {
        if let Some(s) =
            (1..height).find(|&s| shift_matches(old, new, start, height, s, direction))
        {
            return ScrollOperation::new(top, bottom, s as u16, direction);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes(lines: &[&str]) -> Vec<LineHash> {
        lines.iter().map(|l| hash_line(l.as_bytes())).collect()
    }

    #[test]
    fn hash_is_deterministic_and_discriminating() {
        assert_eq!(hash_line(b"hello"), hash_line(b"hello"));
        assert_ne!(hash_line(b"hello"), hash_line(b"hellp"));
        assert_ne!(hash_line(b"ab"), hash_line(b"ba"));
        assert_eq!(hash_line(b"").get(), 5381);
    }

    #[test]
    fn detects_scroll_up_by_two() {
        let old = hashes(&["A", "B", "C", "D", "E", "F"]);
        let new = hashes(&["C", "D", "E", "F", "X", "Y"]);
        let op = detect_scroll_operation(&old, &new, 0, 6).unwrap();
        assert_eq!(op.direction(), ScrollDirection::Up);
        assert_eq!(op.lines(), 2);
        assert_eq!((op.top(), op.bottom()), (0, 6));
    }

    #[test]
    fn detects_scroll_down_by_one() {
        let old = hashes(&["A", "B", "C", "D", "E"]);
        let new = hashes(&["N", "A", "B", "C", "D"]);
        let op = detect_scroll_operation(&old, &new, 0, 5).unwrap();
        assert_eq!(op.direction(), ScrollDirection::Down);
        assert_eq!(op.lines(), 1);
    }

    #[test]
    fn detects_inside_sub_region() {
        let old = hashes(&["hdr", "1", "2", "3", "4", "5", "ftr"]);
        let new = hashes(&["hdr", "2", "3", "4", "5", "6", "ftr"]);
        let op = detect_scroll_operation(&old, &new, 1, 6).unwrap();
        assert_eq!((op.top(), op.bottom(), op.lines()), (1, 6, 1));
        assert_eq!(op.direction(), ScrollDirection::Up);
    }

    #[test]
    fn tolerates_one_dirty_line_in_five() {
        // Shift up by 1 with one of five compared rows changed: 4/5 = 80%.
        let old = hashes(&["a", "b", "c", "d", "e", "f"]);
        let new = hashes(&["b", "c", "DIRTY", "e", "f", "g"]);
        let op = detect_scroll_operation(&old, &new, 0, 6).unwrap();
        assert_eq!(op.lines(), 1);
        assert_eq!(op.direction(), ScrollDirection::Up);
    }

    #[test]
    fn below_threshold_is_rejected() {
        // Two dirty rows out of five compared (60%) for the only real shift.
        let old = hashes(&["a", "b", "c", "d", "e", "f"]);
        let new = hashes(&["b", "X", "d", "Y", "f", "g"]);
        assert!(detect_scroll_operation(&old, &new, 0, 6).is_none());
    }

    #[test]
    fn upward_candidates_win_over_downward() {
        // Period-two content matches both up-by-2 and down-by-2.
        let old = hashes(&["a", "b", "a", "b", "a", "b"]);
        let new = hashes(&["a", "b", "a", "b", "a", "b"]);
        let op = detect_scroll_operation(&old, &new, 0, 6).unwrap();
        assert_eq!(op.direction(), ScrollDirection::Up);
        assert_eq!(op.lines(), 2);
    }

    #[test]
    fn short_regions_never_match() {
        let old = hashes(&["a", "b"]);
        let new = hashes(&["b", "a"]);
        assert!(detect_scroll_operation(&old, &new, 0, 1).is_none());
        assert!(detect_scroll_operation(&old, &new, 1, 2).is_none());
    }

    #[test]
    fn invalid_bounds_return_none() {
        let old = hashes(&["a", "b", "c"]);
        let new = hashes(&["b", "c", "d"]);
        assert!(detect_scroll_operation(&old, &new, 2, 2).is_none());
        assert!(detect_scroll_operation(&old, &new, 3, 1).is_none());
        assert!(detect_scroll_operation(&old, &new, 0, 4).is_none());
    }

    #[test]
    fn unrelated_content_has_no_scroll() {
        let old = hashes(&["a", "b", "c", "d"]);
        let new = hashes(&["w", "x", "y", "z"]);
        assert!(detect_scroll_operation(&old, &new, 0, 4).is_none());
    }

    #[test]
    fn operation_invariants() {
        assert!(ScrollOperation::new(5, 5, 1, ScrollDirection::Up).is_none());
        assert!(ScrollOperation::new(0, 10, 0, ScrollDirection::Up).is_none());
        assert!(ScrollOperation::new(0, 10, 10, ScrollDirection::Up).is_none());
        let op = ScrollOperation::new(0, 10, 9, ScrollDirection::Down).unwrap();
        assert_eq!(op.lines_preserved(), 1);
        assert!(op.fits(10));
        assert!(!op.fits(9));
    }

    #[test]
    fn exposed_rows_by_direction() {
        let up = ScrollOperation::new(5, 20, 3, ScrollDirection::Up).unwrap();
        assert_eq!(up.exposed_rows(), 17..20);
        let down = ScrollOperation::new(5, 20, 2, ScrollDirection::Down).unwrap();
        assert_eq!(down.exposed_rows(), 5..7);
    }

    #[test]
    fn preserved_rows_pair_destination_with_source() {
        let up = ScrollOperation::new(2, 6, 1, ScrollDirection::Up).unwrap();
        let pairs: Vec<_> = up.preserved_rows().collect();
        assert_eq!(pairs, vec![(2, 3), (3, 4), (4, 5)]);

        let down = ScrollOperation::new(2, 6, 1, ScrollDirection::Down).unwrap();
        let pairs: Vec<_> = down.preserved_rows().collect();
        assert_eq!(pairs, vec![(3, 2), (4, 3), (5, 4)]);
    }

    #[test]
    fn offset_moves_region() {
        let op = ScrollOperation::new(0, 4, 1, ScrollDirection::Up).unwrap();
        let moved = op.offset(3).unwrap();
        assert_eq!((moved.top(), moved.bottom()), (3, 7));
        assert!(op.offset(u16::MAX).is_none());
    }
}
