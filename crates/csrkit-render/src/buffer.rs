#![forbid(unsafe_code)]

//! Owned cell buffer.
//!
//! `Buffer` is a row-major 2D grid of [`Cell`]s. It is the reference
//! [`BufferView`] implementation: renderers with their own storage implement
//! the trait directly, tests and benchmarks use this type.
//!
//! # Line content
//!
//! [`BufferView::line_content`] renders a row as the bytes a presenter would
//! write for it: characters interleaved with SGR changes. Each rendered row
//! starts and ends in the default SGR state, so rows can be written to a
//! terminal in any order.

use crate::ansi;
use crate::cell::Cell;
use crate::view::BufferView;

/// A 2D grid of terminal cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Buffer {
    /// Create a buffer filled with default cells.
    pub fn new(width: u16, height: u16) -> Self {
        let size = width as usize * height as usize;
        Self {
            width,
            height,
            cells: vec![Cell::default(); size],
        }
    }

    /// Build a buffer with one row per string, truncated to `width`.
    ///
    /// Rows beyond the given lines stay blank.
    pub fn from_lines(width: u16, height: u16, lines: &[&str]) -> Self {
        let mut buf = Self::new(width, height);
        for (y, line) in lines.iter().enumerate().take(height as usize) {
            buf.put_str(0, y as u16, line, Cell::default());
        }
        buf
    }

    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Get a reference to the cell at `(x, y)`.
    #[inline]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// Set the cell at `(x, y)`. Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = cell;
        }
    }

    /// Write `text` starting at `(x, y)`, one char per cell, using the style
    /// of `template`. Clipped at the right edge.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, template: Cell) {
        for (offset, ch) in text.chars().enumerate() {
            let Some(cx) = x.checked_add(offset as u16) else {
                break;
            };
            if cx >= self.width {
                break;
            }
            self.set(cx, y, Cell { ch, ..template });
        }
    }

    /// Cells of row `y`. Empty slice when out of bounds.
    pub fn row_cells(&self, y: u16) -> &[Cell] {
        if y >= self.height {
            return &[];
        }
        let start = y as usize * self.width as usize;
        &self.cells[start..start + self.width as usize]
    }

    /// Replace row `y` with a copy of row `src` from `other`.
    ///
    /// Both buffers must share the same width; mismatched or out-of-range
    /// rows are left untouched.
    pub fn copy_row_from(&mut self, y: u16, other: &Buffer, src: u16) {
        if self.width != other.width || y >= self.height || src >= other.height {
            return;
        }
        let w = self.width as usize;
        let dst = y as usize * w;
        let from = src as usize * w;
        self.cells[dst..dst + w].copy_from_slice(&other.cells[from..from + w]);
    }

    /// Reset every cell to default.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// All cells in row-major order.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Row text with trailing spaces trimmed.
    pub fn row_text(&self, y: u16) -> String {
        let s: String = self.row_cells(y).iter().map(|c| c.ch).collect();
        s.trim_end().to_string()
    }
}

impl BufferView for Buffer {
    #[inline]
    fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    fn cell(&self, x: u16, y: u16) -> Option<Cell> {
        self.get(x, y).copied()
    }

    fn line_content(&self, y: u16, out: &mut Vec<u8>) {
        let default = Cell::default();
        let mut current = default;
        let mut utf8 = [0u8; 4];
        // Writes into a Vec cannot fail.
        for cell in self.row_cells(y) {
            if !cell.same_style(&current) {
                let _ = ansi::sgr_reset(out);
                let _ = ansi::sgr_flags(out, cell.flags);
                if cell.fg != default.fg {
                    let _ = ansi::sgr_fg(out, cell.fg);
                }
                if cell.bg != default.bg {
                    let _ = ansi::sgr_bg(out, cell.bg);
                }
                current = *cell;
            }
            out.extend_from_slice(cell.ch.encode_utf8(&mut utf8).as_bytes());
        }
        if !current.same_style(&default) {
            let _ = ansi::sgr_reset(out);
        }
    }
}
